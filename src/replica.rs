// design notes: a Prepare or Commit that finds the peer behind is answered
// with a signed negative acknowledgement and reissued by the caller until the
// peer catches up; transport loss is never retried at this layer. Commit
// attestations are stored into the slot named by their prepare sequence
// number, and a slot becomes externally visible only once its certificate
// covers the whole synchronous group.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use borsh::{BorshDeserialize, BorshSerialize};
use tokio::{
    sync::{mpsc, watch},
    time::sleep,
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    crypto::{digest, Digest, Signature, Signer, Verifier},
    message::{
        ClientRequest, CommitLogEntry, CommitReply, Message, MessageKind, PrepareLogEntry,
        PrepareReply, ReplicaId, ReplicateReply, SeqNum, ViewNum, CLIENT,
    },
    net::{ClientEnd, Rpc, RpcReply, Service},
    persist::Persister,
};

const RETRY_BASE: Duration = Duration::from_millis(10);
const RETRY_MAX: Duration = Duration::from_millis(320);

pub struct Replica {
    id: ReplicaId,
    peers: Vec<ClientEnd>,
    synchronous_group: BTreeSet<ReplicaId>,
    signer: Signer,
    verifiers: HashMap<ReplicaId, Verifier>,
    persister: Arc<Persister>,
    state: Mutex<State>,
    // bumped on every certificate insertion and execution advance; execution
    // barriers re-check their predicate on every change
    certified: watch::Sender<u64>,
    shutdown: CancellationToken,
}

#[derive(Debug, Clone, BorshSerialize, BorshDeserialize)]
struct State {
    view: ViewNum,
    prepare_seq_num: SeqNum,
    execute_seq_num: SeqNum,
    prepare_log: Vec<PrepareLogEntry>,
    commit_log: Vec<CommitLogEntry>,
}

/// Point-in-time copy of a replica's replicated state, for inspection and
/// invariant checking.
#[derive(Debug, Clone)]
pub struct LogSnapshot {
    pub view: ViewNum,
    pub prepare_seq_num: SeqNum,
    pub execute_seq_num: SeqNum,
    pub prepare_log: Vec<PrepareLogEntry>,
    pub commit_log: Vec<CommitLogEntry>,
}

impl Replica {
    /// `peers` is indexed by replica id and includes the reserved client
    /// slot; the synchronous group is every index except `CLIENT`. State
    /// saved in `persister` by a previous incarnation is restored.
    pub fn new(
        peers: Vec<ClientEnd>,
        id: ReplicaId,
        persister: Arc<Persister>,
        signer: Signer,
        verifiers: HashMap<ReplicaId, Verifier>,
    ) -> crate::Result<Arc<Self>> {
        let synchronous_group = (0..peers.len() as ReplicaId)
            .filter(|&peer| peer != CLIENT)
            .collect();
        let saved = persister.load();
        let state = if saved.is_empty() {
            State {
                view: 1,
                prepare_seq_num: 0,
                execute_seq_num: 0,
                prepare_log: Vec::new(),
                commit_log: Vec::new(),
            }
        } else {
            borsh::from_slice(&saved)?
        };
        Ok(Arc::new(Self {
            id,
            peers,
            synchronous_group,
            signer,
            verifiers,
            persister,
            state: Mutex::new(state),
            certified: watch::channel(0).0,
            shutdown: CancellationToken::new(),
        }))
    }

    /// Current view and whether this replica leads it.
    pub fn view_state(&self) -> (ViewNum, bool) {
        let state = self.state.lock().unwrap();
        (state.view, state.view == self.id as ViewNum)
    }

    pub fn snapshot(&self) -> LogSnapshot {
        let state = self.state.lock().unwrap();
        LogSnapshot {
            view: state.view,
            prepare_seq_num: state.prepare_seq_num,
            execute_seq_num: state.execute_seq_num,
            prepare_log: state.prepare_log.clone(),
            commit_log: state.commit_log.clone(),
        }
    }

    /// After this no operation is guaranteed; parked handlers unblock with an
    /// error the fabric turns into a lost reply.
    pub fn kill(&self) {
        self.shutdown.cancel();
    }

    pub fn killed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Client entry point. Anyone but the current leader refuses; the leader
    /// assigns the next sequence number, fans the proposal out, and replies
    /// once every other group member has positively acknowledged.
    pub async fn replicate(&self, request: ClientRequest) -> crate::Result<ReplicateReply> {
        let rejected = ReplicateReply {
            is_leader: false,
            success: false,
        };
        if self.killed() {
            return Ok(rejected);
        }
        let entry = {
            let mut state = self.state.lock().unwrap();
            if state.view != self.id as ViewNum {
                debug!(id = self.id, view = state.view, "not the leader");
                return Ok(rejected);
            }
            state.prepare_seq_num += 1;
            let msg_digest = digest(&request)?;
            let msg = Message {
                kind: MessageKind::Prepare,
                msg_digest,
                signature: self.signer.sign(&msg_digest)?,
                prepare_seq_num: state.prepare_seq_num,
                view: state.view,
                client_timestamp: request.timestamp,
                server_id: self.id,
            };
            let entry = PrepareLogEntry {
                request: request.clone(),
                msg: msg.clone(),
            };
            state.prepare_log.push(entry.clone());
            let mut certificate = BTreeMap::new();
            certificate.insert(self.id, msg);
            state.commit_log.push(CommitLogEntry {
                request,
                certificate,
            });
            self.persist(&state)?;
            entry
        };
        self.fan_out_prepare(&entry).await?;
        let mut state = self.state.lock().unwrap();
        state.execute_seq_num += 1;
        self.persist(&state)?;
        debug!(
            id = self.id,
            executed = state.execute_seq_num,
            "request replicated"
        );
        Ok(ReplicateReply {
            is_leader: true,
            success: true,
        })
    }

    /// Leader entry point on a follower. The reply always carries the
    /// follower's own digest of the request and its signature over that
    /// digest, so the caller can tell it saw the same bytes.
    pub async fn prepare(&self, entry: PrepareLogEntry) -> crate::Result<PrepareReply> {
        let msg_digest = digest(&entry.request)?;
        let signature = self.signer.sign(&msg_digest)?;
        let rejected = PrepareReply {
            msg_digest,
            signature: signature.clone(),
            success: false,
        };
        if self.killed() {
            return Ok(rejected);
        }
        let commit_msg = {
            let mut state = self.state.lock().unwrap();
            let next_in_sequence = entry.msg.prepare_seq_num == state.prepare_seq_num + 1;
            let digest_matches = entry.msg.msg_digest == msg_digest;
            let leader_signed =
                self.verified(entry.msg.server_id, &msg_digest, &entry.msg.signature);
            if !(next_in_sequence && digest_matches && leader_signed) {
                debug!(
                    id = self.id,
                    seq = entry.msg.prepare_seq_num,
                    expected = state.prepare_seq_num + 1,
                    digest_matches,
                    leader_signed,
                    "rejecting prepare"
                );
                return Ok(rejected);
            }
            state.prepare_seq_num += 1;
            state.prepare_log.push(entry.clone());
            let msg = Message {
                kind: MessageKind::Commit,
                msg_digest,
                signature: signature.clone(),
                prepare_seq_num: state.prepare_seq_num,
                view: state.view,
                client_timestamp: entry.request.timestamp,
                server_id: self.id,
            };
            // the slot may already be materialized by an earlier delivery;
            // never append twice
            if (state.commit_log.len() as SeqNum) < state.prepare_seq_num {
                let leader = state.view as ReplicaId;
                let mut certificate = BTreeMap::new();
                certificate.insert(leader, entry.msg.clone());
                certificate.insert(self.id, msg.clone());
                state.commit_log.push(CommitLogEntry {
                    request: entry.request.clone(),
                    certificate,
                });
            }
            self.persist(&state)?;
            msg
        };
        self.fan_out_commit(&commit_msg).await?;
        self.await_certificate().await?;
        Ok(PrepareReply {
            msg_digest,
            signature,
            success: true,
        })
    }

    /// Follower attestation for a slot. Stored only if the sender's signature
    /// checks out and the slot is materialized locally; otherwise the signed
    /// negative reply tells the sender to try again later.
    pub fn commit(&self, msg: Message) -> crate::Result<CommitReply> {
        let msg_digest = msg.msg_digest;
        let signature = self.signer.sign(&msg_digest)?;
        let mut success = false;
        if !self.killed()
            && msg.prepare_seq_num > 0
            && self.verified(msg.server_id, &msg_digest, &msg.signature)
        {
            let slot = (msg.prepare_seq_num - 1) as usize;
            let sender = msg.server_id;
            let mut state = self.state.lock().unwrap();
            if let Some(entry) = state.commit_log.get_mut(slot) {
                entry.certificate.insert(sender, msg);
                self.persist(&state)?;
                success = true;
                debug!(id = self.id, from = sender, slot, "commit recorded");
            }
        }
        if success {
            self.certified.send_modify(|version| *version += 1);
        }
        Ok(CommitReply {
            msg_digest,
            signature,
            success,
        })
    }

    /// Blocks until the slot at the execution frontier holds a unanimous
    /// certificate, then advances the frontier. Concurrent callers advance
    /// one slot each, in order.
    async fn await_certificate(&self) -> crate::Result<()> {
        let mut certified = self.certified.subscribe();
        loop {
            let executed = {
                let mut state = self.state.lock().unwrap();
                let slot = state.execute_seq_num as usize;
                match state.commit_log.get(slot) {
                    Some(entry)
                        if entry.certificate.len() == self.synchronous_group.len() =>
                    {
                        state.execute_seq_num += 1;
                        self.persist(&state)?;
                        debug!(id = self.id, executed = state.execute_seq_num, "slot executed");
                        true
                    }
                    _ => false,
                }
            };
            if executed {
                self.certified.send_modify(|version| *version += 1);
                return Ok(());
            }
            tokio::select! {
                _ = self.shutdown.cancelled() => crate::bail!("replica {} shut down", self.id),
                changed = certified.changed() => {
                    changed.map_err(|_| crate::err!("certificate watch closed"))?
                }
            }
        }
    }

    async fn fan_out_prepare(&self, entry: &PrepareLogEntry) -> crate::Result<()> {
        let others = self.group_others();
        if others.is_empty() {
            return Ok(());
        }
        let (ack, acks) = mpsc::channel(others.len());
        for peer in others.iter().copied() {
            debug!(
                from = self.id,
                to = peer,
                seq = entry.msg.prepare_seq_num,
                "issuing prepare"
            );
            tokio::spawn(issue_prepare(
                self.peers[peer as usize].clone(),
                self.verifier(peer)?,
                entry.clone(),
                ack.clone(),
            ));
        }
        self.collect_acks(acks, ack, others.len()).await
    }

    async fn fan_out_commit(&self, msg: &Message) -> crate::Result<()> {
        let others = self.group_others();
        if others.is_empty() {
            return Ok(());
        }
        let (ack, acks) = mpsc::channel(others.len());
        for peer in others.iter().copied() {
            debug!(
                from = self.id,
                to = peer,
                seq = msg.prepare_seq_num,
                "issuing commit"
            );
            tokio::spawn(issue_commit(
                self.peers[peer as usize].clone(),
                self.verifier(peer)?,
                msg.clone(),
                ack.clone(),
            ));
        }
        self.collect_acks(acks, ack, others.len()).await
    }

    /// One token per positively acknowledged peer. Peers lost to the network
    /// never produce a token, so this may park until shutdown; `_keep_open`
    /// pins the channel so a missing token reads as silence, not closure.
    async fn collect_acks(
        &self,
        mut acks: mpsc::Receiver<()>,
        _keep_open: mpsc::Sender<()>,
        expected: usize,
    ) -> crate::Result<()> {
        for _ in 0..expected {
            tokio::select! {
                _ = self.shutdown.cancelled() => crate::bail!("replica {} shut down", self.id),
                ack = acks.recv() => {
                    ack.ok_or_else(|| crate::err!("acknowledgement channel closed"))?
                }
            }
        }
        Ok(())
    }

    fn group_others(&self) -> Vec<ReplicaId> {
        self.synchronous_group
            .iter()
            .copied()
            .filter(|&peer| peer != self.id)
            .collect()
    }

    fn verifier(&self, id: ReplicaId) -> crate::Result<Verifier> {
        self.verifiers
            .get(&id)
            .cloned()
            .ok_or_else(|| crate::err!("no public key for replica {id}"))
    }

    fn verified(&self, id: ReplicaId, digest: &Digest, signature: &Signature) -> bool {
        self.verifiers
            .get(&id)
            .map(|verifier| verifier.verify(digest, signature))
            .unwrap_or(false)
    }

    fn persist(&self, state: &State) -> crate::Result<()> {
        self.persister.save(borsh::to_vec(state)?);
        Ok(())
    }
}

#[async_trait]
impl Service for Replica {
    async fn handle(&self, rpc: Rpc) -> crate::Result<RpcReply> {
        Ok(match rpc {
            Rpc::Replicate(request) => self.replicate(request).await?.into(),
            Rpc::Prepare(entry) => self.prepare(entry).await?.into(),
            Rpc::Commit(msg) => self.commit(msg)?.into(),
        })
    }
}

/// Reissues until the peer accepts. Transport loss and unauthenticated
/// replies abandon the exchange silently; only an authenticated negative
/// acknowledgement (the peer is not caught up yet) triggers another round.
async fn issue_prepare(
    end: ClientEnd,
    verifier: Verifier,
    entry: PrepareLogEntry,
    ack: mpsc::Sender<()>,
) {
    let mut backoff = RETRY_BASE;
    loop {
        let Some(RpcReply::Prepare(reply)) = end.call(Rpc::Prepare(entry.clone())).await else {
            return;
        };
        if reply.msg_digest != entry.msg.msg_digest
            || !verifier.verify(&reply.msg_digest, &reply.signature)
        {
            return;
        }
        if reply.success {
            let _ = ack.send(()).await;
            return;
        }
        debug!(
            to = end.peer(),
            seq = entry.msg.prepare_seq_num,
            "reissuing prepare"
        );
        sleep(backoff).await;
        backoff = (backoff * 2).min(RETRY_MAX);
    }
}

async fn issue_commit(end: ClientEnd, verifier: Verifier, msg: Message, ack: mpsc::Sender<()>) {
    let mut backoff = RETRY_BASE;
    loop {
        let Some(RpcReply::Commit(reply)) = end.call(Rpc::Commit(msg.clone())).await else {
            return;
        };
        if reply.msg_digest != msg.msg_digest
            || !verifier.verify(&reply.msg_digest, &reply.signature)
        {
            return;
        }
        if reply.success {
            let _ = ack.send(()).await;
            return;
        }
        debug!(to = end.peer(), seq = msg.prepare_seq_num, "reissuing commit");
        sleep(backoff).await;
        backoff = (backoff * 2).min(RETRY_MAX);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::OnceLock;

    use super::*;
    use crate::{crypto, net::Network};

    fn keys() -> &'static Vec<(Signer, Verifier)> {
        static KEYS: OnceLock<Vec<(Signer, Verifier)>> = OnceLock::new();
        KEYS.get_or_init(|| {
            (0..4)
                .map(|_| crypto::generate_keys(512).expect("key generation"))
                .collect()
        })
    }

    fn make_replica(net: &Network, n: usize, id: ReplicaId) -> Arc<Replica> {
        let peers = (0..n as ReplicaId).map(|to| net.end(id, to)).collect();
        let verifiers = (1..n as ReplicaId)
            .map(|peer| (peer, keys()[peer as usize].1.clone()))
            .collect();
        Replica::new(
            peers,
            id,
            Arc::new(Persister::default()),
            keys()[id as usize].0.clone(),
            verifiers,
        )
        .unwrap()
    }

    fn request(timestamp: u64) -> ClientRequest {
        ClientRequest {
            op: format!("op-{timestamp}").into_bytes(),
            timestamp,
        }
    }

    fn prepare_entry(seq: SeqNum, request: ClientRequest, leader: ReplicaId) -> PrepareLogEntry {
        let msg_digest = digest(&request).unwrap();
        PrepareLogEntry {
            msg: Message {
                kind: MessageKind::Prepare,
                msg_digest,
                signature: keys()[leader as usize].0.sign(&msg_digest).unwrap(),
                prepare_seq_num: seq,
                view: 1,
                client_timestamp: request.timestamp,
                server_id: leader,
            },
            request,
        }
    }

    fn commit_message(seq: SeqNum, request: &ClientRequest, sender: ReplicaId) -> Message {
        let msg_digest = digest(request).unwrap();
        Message {
            kind: MessageKind::Commit,
            msg_digest,
            signature: keys()[sender as usize].0.sign(&msg_digest).unwrap(),
            prepare_seq_num: seq,
            view: 1,
            client_timestamp: request.timestamp,
            server_id: sender,
        }
    }

    #[tokio::test]
    async fn non_leader_refuses_replicate() {
        let net = Network::new();
        let replica = make_replica(&net, 4, 2);
        let reply = replica.replicate(request(1)).await.unwrap();
        assert!(!reply.is_leader);
        assert!(!reply.success);
        let snapshot = replica.snapshot();
        assert_eq!(snapshot.prepare_seq_num, 0);
        assert!(snapshot.prepare_log.is_empty());
        assert!(snapshot.commit_log.is_empty());
    }

    #[tokio::test]
    async fn single_member_group_executes_without_rpc() {
        let net = Network::new();
        let replica = make_replica(&net, 2, 1);
        let reply = replica.replicate(request(1)).await.unwrap();
        assert!(reply.is_leader);
        assert!(reply.success);
        let snapshot = replica.snapshot();
        assert_eq!(snapshot.prepare_log.len(), 1);
        assert_eq!(snapshot.execute_seq_num, 1);
        let certified: Vec<_> = snapshot.commit_log[0].certificate.keys().copied().collect();
        assert_eq!(certified, vec![1]);
        assert_eq!(net.rpc_count(1), 0);
    }

    #[tokio::test]
    async fn out_of_sequence_prepare_rejected_with_signed_reply() {
        let net = Network::new();
        let replica = make_replica(&net, 4, 2);
        let reply = replica.prepare(prepare_entry(2, request(1), 1)).await.unwrap();
        assert!(!reply.success);
        // the reply is still attested, so the leader can authenticate the nack
        assert!(keys()[2].1.verify(&reply.msg_digest, &reply.signature));
        assert!(replica.snapshot().prepare_log.is_empty());
    }

    /// Positively acknowledges every commit, standing in for a peer whose
    /// slot is already materialized.
    struct CommitAcker;

    #[async_trait]
    impl Service for CommitAcker {
        async fn handle(&self, rpc: Rpc) -> crate::Result<RpcReply> {
            let Rpc::Commit(msg) = rpc else {
                crate::bail!("unexpected rpc")
            };
            Ok(CommitReply {
                msg_digest: msg.msg_digest,
                signature: keys()[1].0.sign(&msg.msg_digest)?,
                success: true,
            }
            .into())
        }
    }

    #[tokio::test]
    async fn reordered_prepare_accepted_on_reissue() {
        // delivery order 2, 1, 2: the early arrival bounces, and once the
        // first slot lands the reissued one goes through
        let net = Network::new();
        net.add_server(1, Arc::new(CommitAcker));
        let replica = make_replica(&net, 3, 2);

        let early = replica.prepare(prepare_entry(2, request(2), 1)).await.unwrap();
        assert!(!early.success);
        assert!(replica.snapshot().prepare_log.is_empty());

        let first = replica.prepare(prepare_entry(1, request(1), 1)).await.unwrap();
        assert!(first.success);

        let reissued = replica.prepare(prepare_entry(2, request(2), 1)).await.unwrap();
        assert!(reissued.success);

        let snapshot = replica.snapshot();
        assert_eq!(snapshot.prepare_log.len(), 2);
        assert_eq!(snapshot.prepare_log[0].msg.prepare_seq_num, 1);
        assert_eq!(snapshot.prepare_log[1].msg.prepare_seq_num, 2);
        assert_eq!(snapshot.prepare_log[0].request, request(1));
        assert_eq!(snapshot.prepare_log[1].request, request(2));
        assert_eq!(snapshot.execute_seq_num, 2);
    }

    #[tokio::test]
    async fn mismatched_digest_prepare_rejected() {
        let net = Network::new();
        let replica = make_replica(&net, 4, 2);
        let mut entry = prepare_entry(1, request(1), 1);
        entry.msg.msg_digest = digest(&request(2)).unwrap();
        let reply = replica.prepare(entry).await.unwrap();
        assert!(!reply.success);
        assert!(replica.snapshot().prepare_log.is_empty());
    }

    #[tokio::test]
    async fn forged_leader_signature_rejected() {
        let net = Network::new();
        let replica = make_replica(&net, 4, 2);
        let mut entry = prepare_entry(1, request(1), 1);
        entry.msg.signature = entry.msg.signature.corrupt();
        let reply = replica.prepare(entry).await.unwrap();
        assert!(!reply.success);
        assert!(replica.snapshot().prepare_log.is_empty());
    }

    #[tokio::test]
    async fn duplicate_prepare_appends_exactly_once() {
        // the fan-out goes nowhere on an empty network, so the first delivery
        // parks after logging; the second must bounce off the sequence check
        let net = Network::new();
        let replica = make_replica(&net, 4, 2);
        let entry = prepare_entry(1, request(1), 1);
        tokio::spawn({
            let replica = replica.clone();
            let entry = entry.clone();
            async move {
                let _ = replica.prepare(entry).await;
            }
        });
        sleep(Duration::from_millis(100)).await;

        let reply = replica.prepare(entry).await.unwrap();
        assert!(!reply.success);
        let snapshot = replica.snapshot();
        assert_eq!(snapshot.prepare_log.len(), 1);
        assert_eq!(snapshot.prepare_seq_num, 1);
        assert_eq!(snapshot.commit_log.len(), 1);
        assert_eq!(snapshot.commit_log[0].certificate.len(), 2);
        assert_eq!(snapshot.execute_seq_num, 0);
        replica.kill();
    }

    #[tokio::test]
    async fn commit_for_unmaterialized_slot_nacked() {
        let net = Network::new();
        let replica = make_replica(&net, 4, 2);
        let msg = commit_message(1, &request(1), 3);
        let reply = replica.commit(msg.clone()).unwrap();
        assert!(!reply.success);
        assert_eq!(reply.msg_digest, msg.msg_digest);
        assert!(keys()[2].1.verify(&reply.msg_digest, &reply.signature));
    }

    #[tokio::test]
    async fn duplicate_commit_is_idempotent() {
        let net = Network::new();
        // group of one: the slot materializes without any network traffic
        let peers = (0..2).map(|to| net.end(1, to)).collect();
        let verifiers = (1..4)
            .map(|peer| (peer, keys()[peer as usize].1.clone()))
            .collect();
        let replica = Replica::new(
            peers,
            1,
            Arc::new(Persister::default()),
            keys()[1].0.clone(),
            verifiers,
        )
        .unwrap();
        let request = request(1);
        assert!(replica.replicate(request.clone()).await.unwrap().success);

        let msg = commit_message(1, &request, 3);
        assert!(replica.commit(msg.clone()).unwrap().success);
        assert_eq!(replica.snapshot().commit_log[0].certificate.len(), 2);
        assert!(replica.commit(msg).unwrap().success);
        assert_eq!(replica.snapshot().commit_log[0].certificate.len(), 2);
    }

    #[tokio::test]
    async fn tampered_commit_rejected() {
        let net = Network::new();
        let peers = (0..2).map(|to| net.end(1, to)).collect();
        let verifiers = (1..4)
            .map(|peer| (peer, keys()[peer as usize].1.clone()))
            .collect();
        let replica = Replica::new(
            peers,
            1,
            Arc::new(Persister::default()),
            keys()[1].0.clone(),
            verifiers,
        )
        .unwrap();
        let request = request(1);
        assert!(replica.replicate(request.clone()).await.unwrap().success);

        let mut msg = commit_message(1, &request, 3);
        msg.signature = msg.signature.corrupt();
        assert!(!replica.commit(msg).unwrap().success);
        assert_eq!(replica.snapshot().commit_log[0].certificate.len(), 1);

        // a signer outside the public-key directory cannot attest either
        let mut unknown = commit_message(1, &request, 3);
        unknown.server_id = 9;
        assert!(!replica.commit(unknown).unwrap().success);
        assert_eq!(replica.snapshot().commit_log[0].certificate.len(), 1);
    }

    #[tokio::test]
    async fn state_survives_restart() {
        let net = Network::new();
        let persister = Arc::new(Persister::default());
        let verifiers: HashMap<_, _> = (1..4)
            .map(|peer| (peer, keys()[peer as usize].1.clone()))
            .collect();
        let peers: Vec<_> = (0..2).map(|to| net.end(1, to)).collect();
        let replica = Replica::new(
            peers.clone(),
            1,
            persister.clone(),
            keys()[1].0.clone(),
            verifiers.clone(),
        )
        .unwrap();
        assert!(replica.replicate(request(1)).await.unwrap().success);
        assert!(replica.replicate(request(2)).await.unwrap().success);
        let before = replica.snapshot();
        replica.kill();

        let restarted =
            Replica::new(peers, 1, persister, keys()[1].0.clone(), verifiers).unwrap();
        let after = restarted.snapshot();
        assert_eq!(after.view, before.view);
        assert_eq!(after.prepare_seq_num, before.prepare_seq_num);
        assert_eq!(after.execute_seq_num, before.execute_seq_num);
        assert_eq!(after.prepare_log, before.prepare_log);
        assert_eq!(after.commit_log, before.commit_log);
    }
}
