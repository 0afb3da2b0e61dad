pub mod client;
pub mod crypto;
pub mod message;
pub mod net;
pub mod persist;
pub mod replica;

pub use anyhow::{anyhow as err, bail, Error, Result};

pub use crate::client::Client;
pub use crate::message::{ReplicaId, CLIENT};
pub use crate::net::{ClientEnd, Network};
pub use crate::persist::Persister;
pub use crate::replica::Replica;
