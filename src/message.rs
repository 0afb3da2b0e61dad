use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};

use crate::crypto::{Digest, Signature};

pub type ReplicaId = u8;
pub type SeqNum = u64;
pub type ViewNum = u64;

/// Index reserved for the client driver; never part of the synchronous group.
pub const CLIENT: ReplicaId = 0;

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct ClientRequest {
    pub op: Vec<u8>,
    /// Monotonic per-client ordering tag; opaque to the replication core.
    pub timestamp: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum MessageKind {
    Replicate,
    Prepare,
    Commit,
    Reply,
}

/// Wire-level attestation. `msg_digest` covers the canonical serialization of
/// the originating `ClientRequest`; `signature` is `server_id`'s signature
/// over that digest.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Message {
    pub kind: MessageKind,
    pub msg_digest: Digest,
    pub signature: Signature,
    pub prepare_seq_num: SeqNum,
    pub view: ViewNum,
    pub client_timestamp: u64,
    pub server_id: ReplicaId,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct PrepareLogEntry {
    pub request: ClientRequest,
    /// The leader's signed PREPARE proposing this entry's position.
    pub msg: Message,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct CommitLogEntry {
    pub request: ClientRequest,
    /// Per-slot certificate: every synchronous-group member's signed
    /// attestation, keyed by replica id. Unanimity gates execution.
    pub certificate: BTreeMap<ReplicaId, Message>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicateReply {
    pub is_leader: bool,
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrepareReply {
    pub msg_digest: Digest,
    pub signature: Signature,
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReply {
    pub msg_digest: Digest,
    pub signature: Signature,
    pub success: bool,
}
