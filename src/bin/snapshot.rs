//! snapshot - capture a single frame from the configured source

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use motion_kernel::{open_source, MotiondConfig};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Frame source; defaults to the configured one.
    #[arg(long)]
    source: Option<String>,
    /// Output file. Defaults to image_<unix seconds>.png.
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = MotiondConfig::load()?;
    if let Some(source) = args.source {
        cfg.source.url = source;
    }

    let mut source = open_source(&cfg.source)?;
    source.connect()?;
    let frame = source.next_frame()?;

    let path = match args.out {
        Some(path) => path,
        None => {
            let secs = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default();
            PathBuf::from(format!("image_{}.png", secs))
        }
    };
    frame
        .save(&path)
        .with_context(|| format!("write {}", path.display()))?;
    log::info!(
        "captured {}x{} frame from {} to {}",
        frame.width(),
        frame.height(),
        cfg.source.url,
        path.display()
    );
    Ok(())
}
