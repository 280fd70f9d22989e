mod backend;
mod cli;
mod color;
mod config;
mod controller;
mod error;
mod ramp;
mod report;
mod scheduling;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use std::time::Duration;
use tokio::signal::unix::{Signal, SignalKind, signal};
use tracing::{Level as TraceLevel, info};
use tracing_subscriber::FmtSubscriber;

use cli::Opts;
use controller::StateController;
use scheduling::minute_of_day;

fn init_logging() -> Result<()> {
    let log_level = match std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

struct Termination {
    sigint: Signal,
    sigterm: Signal,
}

impl Termination {
    fn new() -> Result<Self> {
        Ok(Self {
            sigint: signal(SignalKind::interrupt()).context("setup SIGINT handler")?,
            sigterm: signal(SignalKind::terminate()).context("setup SIGTERM handler")?,
        })
    }

    async fn recv(&mut self) {
        tokio::select! {
            _ = self.sigint.recv() => {}
            _ = self.sigterm.recv() => {}
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Bare `cotemp` lists the current state.
    let bare = std::env::args_os().len() <= 1;
    let opts = Opts::parse();
    init_logging()?;

    let profiles =
        config::load_profiles(config::PROFILES).context("invalid built-in profile table")?;
    if opts.profiles {
        print!("{}", report::format_profiles(&profiles));
        return Ok(());
    }
    let mode = opts.mode(&profiles)?;

    let backend = backend::connect(opts.backend)?;
    let mut controller = StateController::new(backend, profiles, mode, opts.selection())?;

    if opts.list || bare {
        let reports = controller.report()?;
        if opts.json {
            println!("{}", report::format_json(&reports)?);
        } else {
            print!("{}", report::format_text(&reports));
        }
        return Ok(());
    }

    let mut termination = Termination::new()?;
    let interval = Duration::from_secs(opts.interval);
    info!("starting in {mode:?} mode");

    loop {
        let now = Local::now();
        let applied = controller.run_cycle(minute_of_day(&now))?;
        info!(
            "applied {}K, brightness {:.2}",
            applied.temperature, applied.brightness
        );

        if opts.oneshot {
            if controller.backend().restores_on_exit() {
                info!("compositor reverts gamma on exit, holding until terminated");
                termination.recv().await;
            }
            break;
        }

        tokio::select! {
            _ = termination.recv() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    info!("exiting with {:?}, releasing display", controller.state());
    Ok(())
}
