use crate::database::Database;
use crate::filter::Filter;
use crate::format::RecordFormatter;
use crate::parser;
use crate::pending::PendingCalls;
use crate::types::{CompletedCall, TraceEvent};
use anyhow::{Context, Result};
use crossbeam::channel::{self, Receiver};
use log::{debug, warn};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::thread;

/// Per-run settings fixed before the first line is read
#[derive(Debug, Clone, Default)]
pub struct StreamSettings {
    pub offset: usize,
    pub filter: Filter,
    pub formatter: RecordFormatter,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessStats {
    pub total_lines: usize,
    pub entries: usize,
    pub reported: usize,
    pub filtered: usize,
    pub orphaned_exits: usize,
    pub lost_event_notices: usize,
}

/// What one line did to the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    Ignored,
    LostEvents,
    Pending,
    Filtered,
    Orphaned,
    Completed(CompletedCall),
}

/// Classify one line and update `pending`; returns the call to print, if any.
pub fn process_line(
    line: &str,
    settings: &StreamSettings,
    pending: &mut PendingCalls,
) -> LineOutcome {
    match parser::classify(line, settings.offset) {
        TraceEvent::Comment | TraceEvent::Unrecognized => LineOutcome::Ignored,
        TraceEvent::LostEvents(_) => LineOutcome::LostEvents,
        TraceEvent::Entry(entry) => {
            if !settings.filter.admits_task(&entry.task) {
                return LineOutcome::Filtered;
            }
            pending.record_entry(entry.task.tid, entry.target_pid, entry.signal);
            LineOutcome::Pending
        }
        TraceEvent::Exit(exit) => {
            if !settings.filter.admits_task(&exit.task) {
                return LineOutcome::Filtered;
            }
            let Some(call) = pending.take_exit(exit.task.tid) else {
                return LineOutcome::Orphaned;
            };
            let completed = CompletedCall::from_exit(&exit, call);
            if settings.filter.admits_call(&completed) {
                LineOutcome::Completed(completed)
            } else {
                LineOutcome::Filtered
            }
        }
    }
}

/// Drive a line source to completion, writing one row per reported call.
///
/// Every row is flushed as soon as it is written, so stopping the source
/// early never leaves a partial row behind.
pub fn process_lines<I, W>(
    lines: I,
    settings: &StreamSettings,
    out: &mut W,
    database: Option<&Database>,
) -> Result<ProcessStats>
where
    I: IntoIterator<Item = io::Result<String>>,
    W: Write,
{
    let mut pending = PendingCalls::new();
    let mut stats = ProcessStats::default();

    for line_result in lines {
        let line = line_result.context("Failed to read trace line")?;
        stats.total_lines += 1;

        match process_line(&line, settings, &mut pending) {
            LineOutcome::Ignored => {}
            LineOutcome::LostEvents => {
                stats.lost_event_notices += 1;
                warn!("WARNING: {}", line.trim());
            }
            LineOutcome::Pending => stats.entries += 1,
            LineOutcome::Filtered => stats.filtered += 1,
            LineOutcome::Orphaned => stats.orphaned_exits += 1,
            LineOutcome::Completed(call) => {
                writeln!(out, "{}", settings.formatter.row(&call))
                    .context("Failed to write output")?;
                out.flush().context("Failed to flush output")?;
                if let Some(db) = database {
                    db.append_call(&call)?;
                }
                stats.reported += 1;
            }
        }
    }

    debug!(
        "{} lines, {} entries, {} reported, {} filtered, {} orphaned exits, {} still pending",
        stats.total_lines,
        stats.entries,
        stats.reported,
        stats.filtered,
        stats.orphaned_exits,
        pending.len()
    );

    Ok(stats)
}

/// Lines from an unbounded source that end when `stop` fires
pub struct LiveLines {
    lines: Receiver<io::Result<String>>,
    stop: Receiver<()>,
}

impl LiveLines {
    pub fn new(lines: Receiver<io::Result<String>>, stop: Receiver<()>) -> Self {
        Self { lines, stop }
    }
}

impl Iterator for LiveLines {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        channel::select! {
            recv(self.stop) -> _ => None,
            recv(self.lines) -> line => line.ok(),
        }
    }
}

/// Read `source` line by line on a background thread.
///
/// Bytes that are not UTF-8 are replaced rather than rejected. The channel
/// closes at end of input or after forwarding the first read error.
pub fn spawn_reader<R>(source: R) -> Receiver<io::Result<String>>
where
    R: Read + Send + 'static,
{
    let (sender, receiver) = channel::unbounded();

    thread::spawn(move || {
        let mut reader = BufReader::new(source);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf)
                        .trim_end_matches(['\n', '\r'])
                        .to_string();
                    if sender.send(Ok(line)).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    let _ = sender.send(Err(e));
                    break;
                }
            }
        }
    });

    receiver
}
