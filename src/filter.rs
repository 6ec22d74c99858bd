//! Which kill() calls get reported.
//!
//! The name filter runs as soon as the caller's comm is known, so it drops
//! entry and exit lines alike. Pid filters need the target pid from the entry
//! line and only run once a call has been correlated.

use crate::types::{CompletedCall, Task};
use anyhow::{Result, bail};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Filter {
    #[default]
    All,
    /// Case-sensitive, unanchored substring of the caller's comm
    Name(String),
    CallerPid(u32),
    TargetPid(i64),
}

impl Filter {
    /// Build a filter from the command-line options; at most one may be set.
    pub fn from_options(
        name: Option<String>,
        target_pid: Option<i64>,
        caller_pid: Option<u32>,
    ) -> Result<Self> {
        match (name, target_pid, caller_pid) {
            (None, None, None) => Ok(Filter::All),
            (Some(name), None, None) => Ok(Filter::Name(name)),
            (None, Some(pid), None) => Ok(Filter::TargetPid(pid)),
            (None, None, Some(pid)) => Ok(Filter::CallerPid(pid)),
            _ => bail!("use only one of --name, --pid or --caller-pid"),
        }
    }

    pub fn admits_task(&self, task: &Task<'_>) -> bool {
        match self {
            Filter::Name(name) => task.comm.contains(name.as_str()),
            _ => true,
        }
    }

    pub fn admits_call(&self, call: &CompletedCall) -> bool {
        match self {
            Filter::All | Filter::Name(_) => true,
            Filter::CallerPid(pid) => call.caller_pid == *pid,
            Filter::TargetPid(pid) => call.target_pid == *pid,
        }
    }

    /// Short description for the startup banner, e.g. ` for PID 181`
    pub fn describe(&self) -> String {
        match self {
            Filter::All => String::new(),
            Filter::Name(name) => format!(" for name {}", name),
            Filter::CallerPid(pid) => format!(" from PID {}", pid),
            Filter::TargetPid(pid) => format!(" for PID {}", pid),
        }
    }
}
