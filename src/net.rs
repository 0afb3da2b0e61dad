//! In-process request/reply RPC fabric.
//!
//! The fabric is unordered and lossy by configuration: `call` resolves to
//! `None` whenever the destination is cut off, the request is dropped, or the
//! reply is discarded, and callers cannot tell the cases apart. Handlers run
//! as their own task per invocation, so a slow or parked handler never stalls
//! unrelated traffic.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use derive_more::From;
use rand::{rngs::StdRng, Rng, SeedableRng};
use tokio::time::sleep;
use tracing::warn;

use crate::message::{
    ClientRequest, CommitReply, Message, PrepareLogEntry, PrepareReply, ReplicaId, ReplicateReply,
};

#[derive(Debug, Clone, From)]
pub enum Rpc {
    Replicate(ClientRequest),
    Prepare(PrepareLogEntry),
    Commit(Message),
}

#[derive(Debug, Clone, From)]
pub enum RpcReply {
    Replicate(ReplicateReply),
    Prepare(PrepareReply),
    Commit(CommitReply),
}

#[async_trait]
pub trait Service: Send + Sync + 'static {
    async fn handle(&self, rpc: Rpc) -> crate::Result<RpcReply>;
}

#[derive(Clone)]
pub struct Network(Arc<Mutex<Inner>>);

struct Inner {
    reliable: bool,
    long_delays: bool,
    long_reordering: bool,
    servers: HashMap<ReplicaId, Arc<dyn Service>>,
    cut: HashSet<(ReplicaId, ReplicaId)>,
    rpc_count: HashMap<ReplicaId, u64>,
    rng: StdRng,
}

impl Network {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(Inner {
            reliable: true,
            long_delays: false,
            long_reordering: false,
            servers: Default::default(),
            cut: Default::default(),
            rpc_count: Default::default(),
            rng: StdRng::from_entropy(),
        })))
    }

    pub fn add_server(&self, id: ReplicaId, server: Arc<dyn Service>) {
        self.0.lock().unwrap().servers.insert(id, server);
    }

    pub fn remove_server(&self, id: ReplicaId) {
        self.0.lock().unwrap().servers.remove(&id);
    }

    /// Enable or cut the directed link `from -> to`. Links start enabled.
    pub fn enable(&self, from: ReplicaId, to: ReplicaId, enabled: bool) {
        let mut inner = self.0.lock().unwrap();
        if enabled {
            inner.cut.remove(&(from, to));
        } else {
            inner.cut.insert((from, to));
        }
    }

    pub fn set_reliable(&self, reliable: bool) {
        self.0.lock().unwrap().reliable = reliable;
    }

    pub fn set_long_delays(&self, long_delays: bool) {
        self.0.lock().unwrap().long_delays = long_delays;
    }

    pub fn set_long_reordering(&self, long_reordering: bool) {
        self.0.lock().unwrap().long_reordering = long_reordering;
    }

    /// Number of RPCs delivered to `id`'s handler so far.
    pub fn rpc_count(&self, id: ReplicaId) -> u64 {
        *self.0.lock().unwrap().rpc_count.get(&id).unwrap_or(&0)
    }

    pub fn end(&self, from: ReplicaId, to: ReplicaId) -> ClientEnd {
        ClientEnd {
            net: self.clone(),
            from,
            to,
        }
    }
}

impl Default for Network {
    fn default() -> Self {
        Self::new()
    }
}

enum Delivery {
    Unreachable(Duration),
    Dropped(Duration),
    Handle {
        delay: Duration,
        drop_reply: bool,
        reorder: Option<Duration>,
        server: Arc<dyn Service>,
    },
}

/// One endpoint's view of the link to a single peer.
#[derive(Clone)]
pub struct ClientEnd {
    net: Network,
    from: ReplicaId,
    to: ReplicaId,
}

impl ClientEnd {
    pub fn peer(&self) -> ReplicaId {
        self.to
    }

    /// Issue one RPC. `None` means the request or the reply was lost; no
    /// retransmission happens at this layer.
    pub async fn call(&self, rpc: Rpc) -> Option<RpcReply> {
        let delivery = {
            let mut inner = self.net.0.lock().unwrap();
            let enabled = !inner.cut.contains(&(self.from, self.to));
            match inner.servers.get(&self.to).cloned() {
                Some(server) if enabled => {
                    if !inner.reliable && inner.rng.gen_ratio(1, 10) {
                        Delivery::Dropped(Duration::from_millis(inner.rng.gen_range(0..27)))
                    } else {
                        let delay = if inner.reliable {
                            Duration::ZERO
                        } else {
                            Duration::from_millis(inner.rng.gen_range(0..27))
                        };
                        let drop_reply = !inner.reliable && inner.rng.gen_ratio(1, 10);
                        let reorder = inner.long_reordering.then(|| {
                            Duration::from_millis(200 + inner.rng.gen_range(0..2000))
                        });
                        *inner.rpc_count.entry(self.to).or_default() += 1;
                        Delivery::Handle {
                            delay,
                            drop_reply,
                            reorder,
                            server,
                        }
                    }
                }
                _ => {
                    let millis = if inner.long_delays {
                        inner.rng.gen_range(0..7000)
                    } else {
                        inner.rng.gen_range(0..100)
                    };
                    Delivery::Unreachable(Duration::from_millis(millis))
                }
            }
        };
        match delivery {
            Delivery::Unreachable(delay) | Delivery::Dropped(delay) => {
                sleep(delay).await;
                None
            }
            Delivery::Handle {
                delay,
                drop_reply,
                reorder,
                server,
            } => {
                sleep(delay).await;
                let reply = match server.handle(rpc).await {
                    Ok(reply) => reply,
                    Err(err) => {
                        warn!(to = self.to, %err, "rpc handler failed");
                        return None;
                    }
                };
                if drop_reply {
                    return None;
                }
                // a server replaced or cut off mid-call cannot get its reply out
                {
                    let inner = self.net.0.lock().unwrap();
                    let same_instance = inner
                        .servers
                        .get(&self.to)
                        .map(|current| Arc::ptr_eq(current, &server))
                        .unwrap_or(false);
                    if !same_instance || inner.cut.contains(&(self.from, self.to)) {
                        return None;
                    }
                }
                if let Some(delay) = reorder {
                    sleep(delay).await;
                }
                Some(reply)
            }
        }
    }
}
