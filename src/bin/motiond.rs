//! motiond - motion tracking daemon
//!
//! This daemon:
//! 1. Loads configuration (MOTION_CONFIG file + MOTION_* overrides)
//! 2. Pulls frames from the configured source
//! 3. Detects, tracks and confirms moving objects
//! 4. Optionally sends confirmed snapshots to recognition
//! 5. Writes every view to the output directory, if one is set

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use motion_kernel::{
    open_source, DirectorySink, DisplaySink, MotionPipeline, MotiondConfig, NullSink, RunLimits,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Frame source (stub://scene, /dev/video0, image file or directory).
    #[arg(long)]
    source: Option<String>,
    /// Folder receiving frame.png, delta.png, found_objects.png, ...
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// Stop after this many cycles.
    #[arg(long)]
    max_cycles: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = MotiondConfig::load()?;
    if let Some(source) = args.source {
        cfg.source.url = source;
    }
    if let Some(dir) = args.output_dir {
        cfg.display.output_dir = Some(dir);
    }
    cfg.validate()?;

    let mut pipeline = MotionPipeline::from_config(&cfg)?;
    let mut source = open_source(&cfg.source)?;
    source.connect()?;

    let mut sink: Box<dyn DisplaySink> = match &cfg.display.output_dir {
        Some(dir) => {
            log::info!("writing views to {}", dir.display());
            Box::new(DirectorySink::new(dir)?)
        }
        None => Box::new(NullSink),
    };

    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        handler_stop.store(true, Ordering::SeqCst);
    })
    .expect("error setting Ctrl-C handler");

    log::info!(
        "motiond running. source={} fps={} tolerance={} min_area={}",
        cfg.source.url,
        cfg.source.target_fps,
        cfg.tracker.movement_tolerance,
        cfg.tracker.min_object_area
    );

    let limits = RunLimits {
        max_cycles: args.max_cycles,
        target_fps: cfg.source.target_fps,
    };
    let summary = pipeline.run(source.as_mut(), sink.as_mut(), &stop, &limits)?;

    log::info!(
        "motiond stopped after {} cycles ({} skipped, {} confirmed, {} discarded)",
        summary.cycles,
        summary.skipped,
        summary.confirmed,
        summary.discarded
    );
    Ok(())
}
