//! Control of the kernel's ftrace interface for the kill() tracepoints.
//!
//! A [`Session`] owns everything it engages: the exclusivity lock, kernel-side
//! filters and the enabled events. [`Session::end`] tears them down and warns
//! about each step that fails; dropping a session without ending it (an error
//! or panic path) does the same teardown silently.

use crate::filter::Filter;
use crate::parser::detect_column_offset;
use log::{debug, warn};
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Candidate tracefs mount points, in order of preference
pub const TRACING_DIRS: &[&str] = &["/sys/kernel/debug/tracing", "/sys/kernel/tracing"];

/// Shared by every ftrace-based tool of this family; at most one may run.
pub const LOCK_PATH: &str = "/var/tmp/.ftrace-lock";

pub const ENTER_EVENT: &str = "sys_enter_kill";
pub const EXIT_EVENT: &str = "sys_exit_kill";

#[derive(Error, Debug)]
pub enum TraceError {
    #[error(
        "accessing tracing. Root user? Kernel has FTRACE?\n    debugfs mounted? (mount -t debugfs debugfs /sys/kernel/debug)"
    )]
    Unavailable,

    #[error("ftrace may be in use by PID {owner} {}", .path.display())]
    LockHeld { owner: String, path: PathBuf },

    #[error("unable to write {}: {source}", .path.display())]
    LockWrite { path: PathBuf, source: io::Error },

    #[error("setting filter \"{expr}\" on {event} (PID exist?): {source}")]
    Filter {
        event: &'static str,
        expr: String,
        source: io::Error,
    },

    #[error("enabling {event} tracepoint: {source}")]
    Enable {
        event: &'static str,
        source: io::Error,
    },

    #[error("{action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        source: io::Error,
    },
}

/// A tracefs directory (normally one of [`TRACING_DIRS`])
#[derive(Debug, Clone)]
pub struct Tracefs {
    root: PathBuf,
}

impl Tracefs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Find the first mounted tracefs
    pub fn locate() -> Result<Self, TraceError> {
        TRACING_DIRS
            .iter()
            .map(Path::new)
            .find(|dir| dir.join("trace").exists())
            .map(Self::new)
            .ok_or(TraceError::Unavailable)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn event_file(&self, event: &str, file: &str) -> PathBuf {
        self.root
            .join("events/syscalls")
            .join(event)
            .join(file)
    }

    /// Write a control file; it must already exist.
    fn write_control(path: &Path, contents: &str) -> io::Result<()> {
        let mut file = OpenOptions::new().write(true).truncate(true).open(path)?;
        file.write_all(contents.as_bytes())
    }
}

/// Exclusivity marker holding the owner's pid
#[derive(Debug)]
pub struct FtraceLock {
    path: Option<PathBuf>,
}

impl FtraceLock {
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self, TraceError> {
        let path = path.into();
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let owner = fs::read_to_string(&path)
                    .map(|s| s.trim().to_string())
                    .unwrap_or_else(|_| "?".to_string());
                return Err(TraceError::LockHeld { owner, path });
            }
            Err(source) => return Err(TraceError::LockWrite { path, source }),
        };

        if let Err(source) = writeln!(file, "{}", std::process::id()) {
            let _ = fs::remove_file(&path);
            return Err(TraceError::LockWrite { path, source });
        }

        debug!("acquired {}", path.display());
        Ok(Self { path: Some(path) })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn release(mut self) -> io::Result<()> {
        match self.path.take() {
            Some(path) => fs::remove_file(path),
            None => Ok(()),
        }
    }
}

impl Drop for FtraceLock {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            let _ = fs::remove_file(path);
        }
    }
}

/// Kernel-side filter expressions to install for a user filter
fn kernel_filters(filter: &Filter) -> Vec<(&'static str, String)> {
    match filter {
        Filter::TargetPid(pid) => vec![(ENTER_EVENT, format!("pid == {}", pid))],
        Filter::CallerPid(pid) => vec![
            (ENTER_EVENT, format!("common_pid == {}", pid)),
            (EXIT_EVENT, format!("common_pid == {}", pid)),
        ],
        Filter::All | Filter::Name(_) => Vec::new(),
    }
}

/// Engaged kill() tracing
#[derive(Debug)]
pub struct Session {
    tracefs: Tracefs,
    lock: Option<FtraceLock>,
    filtered: Vec<&'static str>,
    enabled: Vec<&'static str>,
    ended: bool,
}

impl Session {
    /// Install kernel filters and enable the entry and exit tracepoints.
    ///
    /// On failure everything engaged so far is torn down quietly before the
    /// error is returned.
    pub fn start(tracefs: Tracefs, lock: FtraceLock, filter: &Filter) -> Result<Self, TraceError> {
        let mut session = Session {
            tracefs,
            lock: Some(lock),
            filtered: Vec::new(),
            enabled: Vec::new(),
            ended: false,
        };

        let current_tracer = session.tracefs.root.join("current_tracer");
        Tracefs::write_control(&current_tracer, "nop").map_err(|source| TraceError::Io {
            action: "resetting",
            path: current_tracer,
            source,
        })?;

        for (event, expr) in kernel_filters(filter) {
            session.filtered.push(event);
            let path = session.tracefs.event_file(event, "filter");
            Tracefs::write_control(&path, &expr)
                .map_err(|source| TraceError::Filter { event, expr, source })?;
        }

        for event in [ENTER_EVENT, EXIT_EVENT] {
            session.enabled.push(event);
            let path = session.tracefs.event_file(event, "enable");
            Tracefs::write_control(&path, "1")
                .map_err(|source| TraceError::Enable { event, source })?;
        }

        Ok(session)
    }

    fn trace_path(&self) -> PathBuf {
        self.tracefs.root.join("trace")
    }

    /// Column offset of the current trace header
    pub fn column_offset(&self) -> Result<usize, TraceError> {
        Ok(detect_column_offset(&self.read_buffer()?))
    }

    /// Snapshot of the trace buffer; invalid UTF-8 is replaced, not rejected.
    pub fn read_buffer(&self) -> Result<String, TraceError> {
        let path = self.trace_path();
        let bytes = fs::read(&path).map_err(|source| TraceError::Io {
            action: "reading",
            path,
            source,
        })?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Empty the trace buffer
    pub fn clear_buffer(&self) -> Result<(), TraceError> {
        let path = self.trace_path();
        Tracefs::write_control(&path, "").map_err(|source| TraceError::Io {
            action: "clearing",
            path,
            source,
        })
    }

    /// Consuming, never-ending view of new trace lines
    pub fn open_pipe(&self) -> Result<File, TraceError> {
        let path = self.tracefs.root.join("trace_pipe");
        File::open(&path).map_err(|source| TraceError::Io {
            action: "opening",
            path,
            source,
        })
    }

    /// Disable tracing and release the lock, warning about failed steps.
    pub fn end(mut self) {
        self.teardown(false);
    }

    fn teardown(&mut self, quiet: bool) {
        if self.ended {
            return;
        }
        self.ended = true;

        let report = |what: String, result: io::Result<()>| {
            if let Err(e) = result {
                if !quiet {
                    warn!("WARNING: command failed \"{}\": {}", what, e);
                }
            }
        };

        for event in self.enabled.drain(..) {
            let path = self.tracefs.event_file(event, "enable");
            report(
                format!("echo 0 > {}", path.display()),
                Tracefs::write_control(&path, "0"),
            );
        }

        for event in self.filtered.drain(..) {
            let path = self.tracefs.event_file(event, "filter");
            report(
                format!("echo 0 > {}", path.display()),
                Tracefs::write_control(&path, "0"),
            );
        }

        let trace = self.tracefs.root.join("trace");
        report(
            format!("echo > {}", trace.display()),
            Tracefs::write_control(&trace, ""),
        );

        if let Some(lock) = self.lock.take() {
            let what = lock
                .path()
                .map(|p| format!("rm {}", p.display()))
                .unwrap_or_default();
            report(what, lock.release());
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.teardown(true);
    }
}
