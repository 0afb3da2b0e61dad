use std::sync::Mutex;

/// Opaque durable blob store, one per replica. Stands in for a disk-backed
/// log: a replica handed a persister with saved state resumes from it, which
/// lets a harness crash and restart replicas without losing the log.
#[derive(Debug, Default)]
pub struct Persister {
    state: Mutex<Vec<u8>>,
}

impl Persister {
    pub fn save(&self, data: Vec<u8>) {
        *self.state.lock().unwrap() = data;
    }

    /// Last saved blob; empty if nothing was ever saved.
    pub fn load(&self) -> Vec<u8> {
        self.state.lock().unwrap().clone()
    }

    pub fn size(&self) -> usize {
        self.state.lock().unwrap().len()
    }
}
