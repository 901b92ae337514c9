//! Run a setup file to completion.

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use rivulet_config::OperatorRegistry;
use rivulet_engine::{
    Command, EngineContext, EngineHandle, MixmodeRequest, RunReport, RunState, ShutdownFlag,
};
use tracing::{info, warn};

use super::common::{format_time, load_setup};

const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Args)]
pub struct RunArgs {
    /// Setup file (TOML)
    #[arg(value_name = "SETUP")]
    setup: PathBuf,

    /// Read control commands from stdin until `exit`
    #[arg(short, long)]
    interactive: bool,

    /// Mixmode: auto, simple, normal or multithreaded
    #[arg(long, value_parser = clap::value_parser!(MixmodeRequest))]
    mixmode: Option<MixmodeRequest>,

    /// Frames per cycle
    #[arg(long)]
    buffersize: Option<usize>,

    /// Restart from the beginning at the end
    #[arg(long = "loop")]
    looping: bool,

    /// Processing length in seconds
    #[arg(long)]
    length: Option<f64>,

    /// Hide the progress bar
    #[arg(long)]
    no_progress: bool,
}

/// Feeds stdin lines to the engine. EOF counts as `exit`.
fn spawn_command_reader(handle: EngineHandle) {
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match line.parse::<Command>() {
                Ok(command) => {
                    if handle.send(command).is_err() {
                        return;
                    }
                }
                Err(err) => eprintln!("{err}"),
            }
        }
        let _ = handle.send(Command::Exit);
    });
}

fn progress_bar(length: Option<u64>) -> ProgressBar {
    match length {
        Some(frames) => {
            let pb = ProgressBar::new(frames);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("##-"),
            );
            pb
        }
        None => {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner} [{elapsed_precise}] {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            pb
        }
    }
}

/// Polls the handle until `done` is raised.
fn spawn_progress(handle: EngineHandle, length: Option<u64>, done: Arc<AtomicBool>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let pb = progress_bar(length);
        while !done.load(Ordering::Acquire) {
            let frames = handle.position_frames();
            match length {
                Some(total) => pb.set_position(frames.min(total)),
                None => pb.tick(),
            }
            pb.set_message(format!(
                "{} {:?}",
                format_time(handle.current_position()),
                handle.state()
            ));
            thread::sleep(PROGRESS_INTERVAL);
        }
        pb.finish_and_clear();
    })
}

fn print_report(report: &RunReport) {
    println!(
        "{:?} after {} cycles, {} frames ({} mode, {:?})",
        report.state, report.cycles, report.frames, report.mixmode, report.cause
    );
    if let Some(error) = &report.error {
        println!("  last error: {error}");
    }
}

pub fn run(args: RunArgs) -> anyhow::Result<()> {
    let registry = OperatorRegistry::new();
    let mut file = load_setup(&args.setup, &registry)?;

    if let Some(mixmode) = args.mixmode {
        file.engine.mixmode = mixmode;
    }
    if let Some(buffersize) = args.buffersize {
        file.engine.buffersize = buffersize;
    }
    if args.looping {
        file.engine.looping = true;
    }
    if args.length.is_some() {
        file.engine.length = args.length;
    }
    if args.interactive {
        file.engine.interactive = true;
    }

    let shutdown = ShutdownFlag::new();
    let flag = shutdown.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nStopping...");
        flag.request();
    })
    .context("installing Ctrl-C handler")?;

    let name = args
        .setup
        .file_stem()
        .map_or_else(|| "rivulet".to_string(), |s| s.to_string_lossy().into_owned());
    let interactive = file.engine.interactive;
    let ctx = EngineContext::new(&name).with_shutdown(shutdown);
    let mut engine = file
        .into_engine(&registry, ctx)
        .with_context(|| format!("building {}", args.setup.display()))?;

    info!(
        "running '{}' in {} mode, {} chains",
        name,
        engine.mixmode(),
        engine.chain_count()
    );
    if interactive {
        println!("Interactive: type commands (e.g. `start`, `c-select 0`, `exit`).");
        spawn_command_reader(engine.handle());
    }

    let done = Arc::new(AtomicBool::new(false));
    let progress = (!args.no_progress)
        .then(|| spawn_progress(engine.handle(), engine.length_frames(), Arc::clone(&done)));

    let result = engine.run_to_completion();
    done.store(true, Ordering::Release);
    if let Some(progress) = progress {
        let _ = progress.join();
    }
    // Outputs were flushed when the run stopped; dropping closes them.
    drop(engine);

    let report = result.context("engine failed")?;
    print_report(&report);
    if report.state == RunState::Failed {
        warn!("run failed");
        anyhow::bail!(
            "run failed: {}",
            report.error.as_deref().unwrap_or("an output stopped accepting audio")
        );
    }
    Ok(())
}
