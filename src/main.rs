//! Proctor Sentinel CLI
//!
//! Integrity monitoring and environment lockdown for proctored interviews.

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use proctor_sentinel::{
    collector::{InputCollector, SessionInput},
    config::{Config, Sensitivity},
    host::{NoopHost, NoopSpeech, SessionObserver},
    ledger::WarningEvent,
    store::{is_blocked, JsonFileStore},
    ProctorSession, PROCTORING_NOTICE, VERSION,
};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "proctor-sentinel")]
#[command(version = VERSION)]
#[command(about = "Integrity monitoring and lockdown for proctored interviews", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a recorded session (JSON lines of session inputs) through the core
    Replay {
        /// Recorded inputs, one JSON object per line
        #[arg(long, short)]
        input: PathBuf,

        /// Candidate access identifier
        #[arg(long)]
        access_id: String,

        /// Detection sensitivity (low, medium, high)
        #[arg(long)]
        sensitivity: Option<String>,

        /// Strikes allowed before termination (1-10)
        #[arg(long)]
        max_warnings: Option<u32>,

        /// Write the ledger here instead of the data directory
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Serve the browser relay (requires the server feature)
    Serve {
        /// Candidate access identifier
        #[arg(long)]
        access_id: String,

        /// Port to listen on
        #[arg(long, default_value = "7420")]
        port: u16,
    },

    /// Check whether a candidate is blocked
    Check {
        access_id: String,
    },

    /// Show configuration
    Config,

    /// Display the candidate monitoring notice
    Notice,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Replay {
            input,
            access_id,
            sensitivity,
            max_warnings,
            export,
        } => cmd_replay(input, &access_id, sensitivity, max_warnings, export),
        Commands::Serve { access_id, port } => cmd_serve(&access_id, port),
        Commands::Check { access_id } => cmd_check(&access_id),
        Commands::Config => cmd_config(),
        Commands::Notice => {
            println!("{PROCTORING_NOTICE}");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

/// Prints controller notifications as they happen.
struct ConsoleObserver;

impl SessionObserver for ConsoleObserver {
    fn on_warning(&mut self, vision_strikes: u32) {
        println!("  vision warning #{vision_strikes}");
    }

    fn on_violation(&mut self, violation: &WarningEvent) {
        println!(
            "[{}] {}: {}",
            violation.timestamp.format("%H:%M:%S%.3f"),
            violation.kind,
            violation.message
        );
    }

    fn on_terminate(&mut self) {
        println!("Session terminated.");
    }
}

fn load_config(sensitivity: Option<String>, max_warnings: Option<u32>) -> anyhow::Result<Config> {
    let mut config = Config::load().unwrap_or_default();
    if let Some(s) = sensitivity {
        config.sensitivity =
            Sensitivity::parse(&s).with_context(|| format!("unknown sensitivity '{s}'"))?;
    }
    if let Some(max) = max_warnings {
        config.max_warnings = max;
    }
    Ok(config.validated())
}

fn cmd_replay(
    input: PathBuf,
    access_id: &str,
    sensitivity: Option<String>,
    max_warnings: Option<u32>,
    export: Option<PathBuf>,
) -> anyhow::Result<()> {
    let config = load_config(sensitivity, max_warnings)?;
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }

    let store = JsonFileStore::open(config.store_path()).context("opening store")?;
    let file =
        std::fs::File::open(&input).with_context(|| format!("opening {}", input.display()))?;

    println!("Proctor Sentinel v{VERSION}");
    println!("  Sensitivity: {}", config.sensitivity);
    println!("  Max warnings: {}", config.max_warnings);
    println!("  Grace period: {}ms", config.grace_ms);
    println!();

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("setting Ctrl+C handler")?;

    let mut session = ProctorSession::new(
        access_id,
        &config,
        Box::new(NoopHost),
        Box::new(NoopSpeech),
        Box::new(store),
        Box::new(ConsoleObserver),
    );
    session.start();

    // Reader thread feeds the collector; this thread owns the session.
    let mut collector = InputCollector::new();
    collector.start()?;
    let sender = collector.sender();
    let reader = std::thread::spawn(move || -> anyhow::Result<usize> {
        let mut count = 0;
        for (n, line) in std::io::BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let parsed: SessionInput = serde_json::from_str(&line)
                .with_context(|| format!("line {}: invalid session input", n + 1))?;
            // Replay is not latency-bound; wait out backpressure.
            while let Err(e) = sender.send(parsed.clone()) {
                if e != proctor_sentinel::CollectorError::Backpressure {
                    return Err(e.into());
                }
                std::thread::sleep(Duration::from_millis(1));
            }
            count += 1;
        }
        Ok(count)
    });

    let receiver = collector.receiver().clone();
    let mut last_at = None;
    while running.load(Ordering::SeqCst) {
        match receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(input) => {
                last_at = Some(input.at);
                session.apply(&input);
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                if reader.is_finished() && receiver.is_empty() {
                    break;
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        }
    }
    collector.stop();

    match reader.join() {
        Ok(Ok(count)) => println!("\nReplayed {count} inputs"),
        Ok(Err(e)) => eprintln!("Warning: replay stopped early: {e:#}"),
        Err(_) => eprintln!("Warning: reader thread panicked"),
    }

    // Let pending deadlines (grace period, locked-message delay) run out.
    if let Some(at) = last_at {
        let settle = config.termination_delay_ms + config.grace_ms;
        session.poll(at + chrono::Duration::milliseconds(settle as i64));
    }

    println!("\n{}", session.ledger().summary());
    println!("Session confidence: {:.1}", session.session_confidence());

    let export_path = export.unwrap_or_else(|| {
        config.data_path.join(format!(
            "ledger_{}_{}.json",
            access_id,
            Utc::now().format("%Y%m%d_%H%M%S")
        ))
    });
    session
        .ledger()
        .save(&export_path)
        .with_context(|| format!("writing {}", export_path.display()))?;
    println!("Exported ledger to {export_path:?}");

    Ok(())
}

#[cfg(feature = "server")]
fn cmd_serve(access_id: &str, port: u16) -> anyhow::Result<()> {
    use proctor_sentinel::server::{run, ServerConfig};

    let config = Config::load().unwrap_or_default().validated();
    config.ensure_directories()?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let (addr, shutdown_tx) = run(ServerConfig::new(port, access_id, config)).await?;
        println!("Relay listening on http://{addr}");
        println!("Press Ctrl+C to stop");
        tokio::signal::ctrl_c().await?;
        let _ = shutdown_tx.send(());
        Ok::<(), anyhow::Error>(())
    })
}

#[cfg(not(feature = "server"))]
fn cmd_serve(_access_id: &str, _port: u16) -> anyhow::Result<()> {
    anyhow::bail!("serve requires the server feature (rebuild with --features server)")
}

fn cmd_check(access_id: &str) -> anyhow::Result<()> {
    let config = Config::load().unwrap_or_default();
    let store = JsonFileStore::open(config.store_path())?;
    if is_blocked(&store, access_id)? {
        println!("{access_id}: blocked");
    } else {
        println!("{access_id}: not blocked");
    }
    println!("Blocked candidates on record: {}", store.blocked_ids().len());
    Ok(())
}

fn cmd_config() -> anyhow::Result<()> {
    let config = Config::load().unwrap_or_default();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
