use std::{
    sync::atomic::{AtomicU64, Ordering::SeqCst},
    time::Duration,
};

use tokio::time::timeout;
use tracing::debug;

use crate::{
    message::{ClientRequest, ReplicaId, ReplicateReply},
    net::{ClientEnd, Rpc, RpcReply},
};

/// Driver that injects requests into the replica group. Timestamps are
/// monotonic per instance and ride along as the request's ordering tag.
pub struct Client {
    peers: Vec<ClientEnd>,
    pub retry_interval: Duration,
    timestamp: AtomicU64,
}

impl Client {
    pub fn new(peers: Vec<ClientEnd>, retry_interval: Duration) -> Self {
        Self {
            peers,
            retry_interval,
            timestamp: AtomicU64::new(0),
        }
    }

    fn next_request(&self, op: Vec<u8>) -> ClientRequest {
        ClientRequest {
            op,
            timestamp: self.timestamp.fetch_add(1, SeqCst) + 1,
        }
    }

    /// Single-shot injection at a chosen replica; no retry, no redirection.
    pub async fn submit_to(&self, id: ReplicaId, op: Vec<u8>) -> Option<ReplicateReply> {
        let request = self.next_request(op);
        match self.peers[id as usize].call(Rpc::Replicate(request)).await {
            Some(RpcReply::Replicate(reply)) => Some(reply),
            _ => None,
        }
    }

    /// Drive one request to completion: sweep the replicas until one of them
    /// is the leader and confirms replication. The core does not deduplicate
    /// client requests, so an attempt abandoned to a lost reply may occupy a
    /// second slot; the ordering tag makes such duplicates recognizable.
    pub async fn propose(&self, op: Vec<u8>) -> crate::Result<()> {
        let request = self.next_request(op);
        loop {
            for id in 1..self.peers.len() as ReplicaId {
                let attempt = self.peers[id as usize].call(Rpc::Replicate(request.clone()));
                match timeout(self.retry_interval, attempt).await {
                    Ok(Some(RpcReply::Replicate(reply))) if reply.is_leader && reply.success => {
                        return Ok(())
                    }
                    Ok(_) => {}
                    Err(_) => debug!(
                        to = id,
                        timestamp = request.timestamp,
                        "proposal attempt timed out"
                    ),
                }
            }
        }
    }
}
