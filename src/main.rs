use killsnoop::database::Database;
use killsnoop::filter::Filter;
use killsnoop::format::RecordFormatter;
use killsnoop::processor::{self, LiveLines, StreamSettings};
use killsnoop::tracefs::{FtraceLock, LOCK_PATH, Session, Tracefs};

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam::channel::{self, Receiver, RecvTimeoutError};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, warn};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

const ONE_SECOND: Duration = Duration::from_secs(1);

#[derive(Parser, Debug)]
#[command(name = "killsnoop")]
#[command(about = "Trace kill() syscalls: who signals whom, and with what result", long_about = None)]
#[command(after_help = "Examples:
  killsnoop              # watch kill()s live (unbuffered)
  killsnoop -d 1         # trace 1 sec (buffered)
  killsnoop -p 181       # trace kill()s issued to PID 181 only
  killsnoop -n bash -s   # kill()s from bash, with signal names")]
struct Args {
    /// Trace for this many seconds, using the kernel buffer
    #[arg(short, long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    duration: Option<u64>,

    /// Only show kill()s issued by processes whose name contains this
    #[arg(short, long, conflicts_with_all = ["pid", "caller_pid"])]
    name: Option<String>,

    /// Only show kill()s sent to this PID
    #[arg(short, long, allow_negative_numbers = true, conflicts_with = "caller_pid")]
    pid: Option<i64>,

    /// Only show kill()s issued by this PID
    #[arg(short = 'P', long, value_name = "PID")]
    caller_pid: Option<u32>,

    /// Include a timestamp column
    #[arg(short, long)]
    time: bool,

    /// Show symbolic signal names
    #[arg(short, long)]
    symbolic: bool,

    /// Also record reported calls in this DuckDB database (replaced if present)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

/// Sleep for the capture window, showing progress; returns early on Ctrl-C.
fn wait_for_capture(seconds: u64, stop: &Receiver<()>) -> Result<()> {
    let progress = ProgressBar::new(seconds);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len}s capturing")?
            .progress_chars("#>-"),
    );

    for _ in 0..seconds {
        match stop.recv_timeout(ONE_SECOND) {
            Ok(()) => {
                progress.abandon_with_message("interrupted");
                return Ok(());
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => thread::sleep(ONE_SECOND),
        }
        progress.inc(1);
    }

    progress.finish_and_clear();
    Ok(())
}

fn open_database(path: &Path) -> Result<Database> {
    if path.exists() {
        std::fs::remove_file(path).context("Failed to delete existing database")?;
    }
    Database::init(path.to_str().context("Database path is not valid UTF-8")?)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp(None)
        .init();

    let args = Args::parse();

    let filter = Filter::from_options(args.name.clone(), args.pid, args.caller_pid)?;
    let formatter = RecordFormatter::new(args.time, args.symbolic);

    let (stop_tx, stop_rx) = channel::bounded(1);
    ctrlc::set_handler(move || {
        let _ = stop_tx.try_send(());
    })
    .context("Failed to install Ctrl-C handler")?;

    match args.duration {
        Some(seconds) => eprintln!(
            "Tracing kill()s{} for {} seconds (buffered)...",
            filter.describe(),
            seconds
        ),
        None => eprintln!("Tracing kill()s{}. Ctrl-C to end.", filter.describe()),
    }

    let tracefs = Tracefs::locate()?;
    debug!("using tracefs at {}", tracefs.root().display());
    let lock = FtraceLock::acquire(LOCK_PATH)?;
    let session = Session::start(tracefs, lock, &filter)?;

    let database = args.output.as_deref().map(open_database).transpose()?;

    let settings = StreamSettings {
        offset: session.column_offset()?,
        filter,
        formatter,
    };
    debug!("column offset {}", settings.offset);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "{}", settings.formatter.header())?;
    out.flush()?;

    if let Err(e) = session.clear_buffer() {
        warn!("WARNING: {}", e);
    }

    let stats = match args.duration {
        Some(seconds) => {
            wait_for_capture(seconds, &stop_rx)?;
            let text = session.read_buffer()?;
            processor::process_lines(
                text.lines().map(|line| Ok(line.to_string())),
                &settings,
                &mut out,
                database.as_ref(),
            )?
        }
        None => {
            let lines = processor::spawn_reader(session.open_pipe()?);
            processor::process_lines(
                LiveLines::new(lines, stop_rx),
                &settings,
                &mut out,
                database.as_ref(),
            )?
        }
    };
    drop(out);

    eprintln!("\nEnding tracing...");
    session.end();

    debug!("{:?}", stats);
    if let (Some(db), Some(path)) = (&database, &args.output) {
        eprintln!("Database:     {} ({} calls)", path.display(), db.count_calls()?);
    }

    Ok(())
}
