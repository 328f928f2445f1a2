//! termblocks replay tool
//!
//! Feeds a recorded session transcript through the segmentation engine
//! and prints the blocks it reconstructs. Useful for tuning prompt and
//! error patterns against captures from a new device dialect.
//!
//! # Transcript format
//!
//! One event per line:
//!
//! ```text
//! # comment
//! > display version        user input (Enter appended)
//! < VRP (R) software       device output (newline appended)
//! !                        silence: let the fallback timer fire
//! ```

use std::cell::Cell;
use std::env;
use std::fs;
use std::rc::Rc;
use std::time::Instant;

use anyhow::Context;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use termblocks::history::HistoryStrategy;
use termblocks::{BlockStatus, CursorLine, EngineConfig, MarkerStore, SessionEngine};

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_version() {
    eprintln!("termblocks {}", VERSION);
}

fn print_help() {
    eprintln!("termblocks {} - command block segmentation replay tool", VERSION);
    eprintln!();
    eprintln!("Usage: termblocks [OPTIONS] <TRANSCRIPT>");
    eprintln!();
    eprintln!("Transcript lines:");
    eprintln!("  > text                User input (Enter appended)");
    eprintln!("  < text                Device output (newline appended)");
    eprintln!("  !                     Silence long enough for the fallback timer");
    eprintln!("  # text                Comment, ignored");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -d, --debug           Verbose engine logging");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
}

/// Cursor-line capability backed by a simple newline counter
struct ReplayCursor(Rc<Cell<u64>>);

impl CursorLine for ReplayCursor {
    fn current_line(&self) -> u64 {
        self.0.get()
    }
}

fn main() -> anyhow::Result<()> {
    let mut debug = false;
    let mut transcript: Option<String> = None;

    for arg in env::args().skip(1) {
        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                return Ok(());
            }
            "-v" | "--version" => {
                print_version();
                return Ok(());
            }
            "-d" | "--debug" => debug = true,
            other if !other.starts_with('-') => transcript = Some(other.to_string()),
            other => {
                eprintln!("Unknown option: {}", other);
                print_help();
                std::process::exit(1);
            }
        }
    }

    let level = if debug { Level::DEBUG } else { Level::WARN };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    let Some(path) = transcript else {
        print_help();
        std::process::exit(1);
    };

    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read transcript {}", path))?;

    let config = EngineConfig::load();
    let mut store = MarkerStore::new(config.marker_ceiling);
    let line = Rc::new(Cell::new(0u64));
    let mut engine = SessionEngine::new("replay", &config, Box::new(ReplayCursor(line.clone())));

    for (lineno, event) in content.lines().enumerate() {
        let now = Instant::now();
        match event.split_at_checked(2) {
            Some(("> ", text)) => {
                let mut input = text.as_bytes().to_vec();
                input.push(b'\r');
                engine.process_input_at(&input, &mut store, now);
            }
            Some(("< ", text)) => {
                let mut output = text.as_bytes().to_vec();
                output.push(b'\n');
                feed_output(&mut engine, &mut store, &line, &output, now);
            }
            _ if event.starts_with('!') => {
                // Pretend the fallback window elapsed in silence
                engine.tick_at(&mut store, now + config.fallback_delay());
            }
            _ if event.is_empty() || event.starts_with('#') => {}
            _ => eprintln!("line {}: unrecognized event, skipped", lineno + 1),
        }
    }

    // A transcript ending mid-capture still converges
    engine.tick_at(&mut store, Instant::now() + config.fallback_delay());

    print_blocks(&store);
    print_history(&store, &config);
    Ok(())
}

/// Deliver output to the engine, advancing the fake cursor line
fn feed_output(
    engine: &mut SessionEngine,
    store: &mut MarkerStore,
    line: &Rc<Cell<u64>>,
    output: &[u8],
    now: Instant,
) {
    let newlines = output.iter().filter(|&&b| b == b'\n').count() as u64;
    line.set(line.get() + newlines);

    let (events, auto_response) = engine.process_output_at(output, store, now);
    for event in &events {
        tracing::debug!(?event, "engine event");
    }
    if auto_response.is_some() {
        println!("  (pagination answered automatically)");
    }
}

fn print_blocks(store: &MarkerStore) {
    println!();
    println!("  ID  STATUS   LINES        COMMAND");
    for marker in store.markers("replay") {
        let status = match marker.status {
            BlockStatus::Running => "running",
            BlockStatus::Success => "success",
            BlockStatus::Error => "error",
        };
        let lines = match marker.end_line {
            Some(end) => format!("{}-{}", marker.start_line, end),
            None => format!("{}-", marker.start_line),
        };
        println!(
            "  {:>2}  {:<8} {:<12} {}",
            marker.id, status, lines, marker.command
        );
    }
}

fn print_history(store: &MarkerStore, config: &EngineConfig) {
    let history = store.command_history("replay", HistoryStrategy::Combined, config.history_limit);
    if history.is_empty() {
        return;
    }
    println!();
    println!("  Suggested history:");
    for command in history {
        println!("    {}", command);
    }
}
