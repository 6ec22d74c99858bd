use crate::types::PendingCall;
use std::collections::HashMap;

/// In-flight kill() calls keyed by thread id.
///
/// A thread runs one syscall at a time, so a second entry for the same tid
/// before its exit replaces the first.
#[derive(Debug, Default)]
pub struct PendingCalls {
    calls: HashMap<u32, PendingCall>,
}

impl PendingCalls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_entry(&mut self, tid: u32, target_pid: i64, signal: i64) {
        self.calls.insert(tid, PendingCall { target_pid, signal });
    }

    /// Remove and return the entry for `tid`. `None` means the entry happened
    /// before tracing started.
    pub fn take_exit(&mut self, tid: u32) -> Option<PendingCall> {
        self.calls.remove(&tid)
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}
