/// Caller identity taken from the first token of a trace line (`<comm>-<tid>`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Task<'a> {
    pub comm: &'a str,
    pub tid: u32,
}

/// A `sys_kill(pid: .., sig: ..)` entry line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryEvent<'a> {
    pub task: Task<'a>,
    pub timestamp: &'a str,
    pub target_pid: i64,
    pub signal: i64,
}

/// A `sys_kill -> <ret>` exit line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitEvent<'a> {
    pub task: Task<'a>,
    pub timestamp: &'a str,
    pub return_value: &'a str,
}

impl ExitEvent<'_> {
    /// Success/failure only: 0 stays 0, anything else becomes -1.
    pub fn return_code(&self) -> i32 {
        match crate::parser::parse_return_value(self.return_value) {
            Some(0) => 0,
            _ => -1,
        }
    }
}

/// What the line classifier made of one raw trace line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent<'a> {
    Comment,
    LostEvents(&'a str),
    Entry(EntryEvent<'a>),
    Exit(ExitEvent<'a>),
    Unrecognized,
}

/// In-flight kill() for one thread, waiting for its exit line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingCall {
    pub target_pid: i64,
    pub signal: i64,
}

/// A correlated kill() ready to be filtered and printed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedCall {
    pub time: String,
    pub comm: String,
    pub caller_pid: u32,
    pub target_pid: i64,
    pub signal: i64,
    pub return_code: i32,
}

impl CompletedCall {
    pub fn from_exit(exit: &ExitEvent<'_>, pending: PendingCall) -> Self {
        Self {
            time: exit.timestamp.trim_end_matches(':').to_string(),
            comm: exit.task.comm.to_string(),
            caller_pid: exit.task.tid,
            target_pid: pending.target_pid,
            signal: pending.signal,
            return_code: exit.return_code(),
        }
    }
}
