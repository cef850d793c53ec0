//! recognize - run the configured recognition service on one image
//!
//! Prints every returned concept with its confidence. Exits with an error when
//! the service answers with a non-success status.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;

use motion_kernel::{MotiondConfig, RecognitionSettings};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Image to recognize.
    image: PathBuf,
    /// Use the offline stub service instead of the configured one.
    #[arg(long)]
    stub: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let settings = if args.stub {
        RecognitionSettings {
            api_url: "stub://labels".to_string(),
            ..RecognitionSettings::default()
        }
    } else {
        let cfg = MotiondConfig::load()?;
        RecognitionSettings {
            enabled: true,
            ..cfg.recognition
        }
    };
    settings.validate()?;
    let mut service = settings.build_service()?;

    let image = image::open(&args.image)
        .with_context(|| format!("open {}", args.image.display()))?
        .to_rgb8();
    log::info!(
        "submitting {} ({}x{}) to {}",
        args.image.display(),
        image.width(),
        image.height(),
        service.name()
    );

    let prediction = service.predict(&image)?;
    if !prediction.is_success() {
        return Err(anyhow!(
            "recognition failed: status {} ({})",
            prediction.status_code,
            prediction.status_description
        ));
    }
    for concept in &prediction.concepts {
        println!("{:<24} {:.3}", concept.name, concept.confidence);
    }
    Ok(())
}
