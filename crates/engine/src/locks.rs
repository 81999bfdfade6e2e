use std::collections::HashSet;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::EngineError;

/// Per-node critical sections.
///
/// At most one [`NodeGuard`] exists per node name; guards for different
/// nodes never wait on each other beyond the short table lock.
pub struct NodeLocks {
    busy: Mutex<HashSet<String>>,
    released: Condvar,
    timeout: Duration,
}

pub struct NodeGuard<'a> {
    locks: &'a NodeLocks,
    node: String,
}

impl NodeLocks {
    pub fn new(timeout: Duration) -> Self {
        Self {
            busy: Mutex::new(HashSet::new()),
            released: Condvar::new(),
            timeout,
        }
    }

    /// Wait up to the configured timeout for exclusive access to `node`.
    pub fn acquire(&self, node: &str) -> Result<NodeGuard<'_>, EngineError> {
        let deadline = Instant::now() + self.timeout;
        let mut busy = self.busy.lock();
        while busy.contains(node) {
            if self.released.wait_until(&mut busy, deadline).timed_out() && busy.contains(node) {
                tracing::warn!(node, timeout_ms = self.timeout.as_millis() as u64, "node lock timed out");
                return Err(EngineError::ConcurrencyFailure(format!(
                    "node '{node}' is busy"
                )));
            }
        }
        busy.insert(node.to_string());
        Ok(NodeGuard {
            locks: self,
            node: node.to_string(),
        })
    }

    pub fn is_held(&self, node: &str) -> bool {
        self.busy.lock().contains(node)
    }
}

impl Drop for NodeGuard<'_> {
    fn drop(&mut self) {
        self.locks.busy.lock().remove(&self.node);
        self.locks.released.notify_all();
    }
}
