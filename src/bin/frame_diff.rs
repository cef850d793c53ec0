//! frame_diff - compare two still images the way the tracker does
//!
//! Writes the intermediate images of the differencing chain into an output
//! folder so thresholds and blur sizes can be tuned by eye:
//! colour deltas, grayscale delta, binary masks at several thresholds,
//! blurred deltas at several kernel sizes and the detected regions.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use image::{imageops, GrayImage, Luma, Rgb, RgbImage};
use imageproc::contrast::{threshold, ThresholdType};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use std::fs;
use std::path::{Path, PathBuf};

use motion_kernel::detect::motion::{absolute_difference, dilate_mask, external_regions};
use motion_kernel::detect::{DEFAULT_DILATE_ITERATIONS, DEFAULT_THRESHOLD};
use motion_kernel::frame::kernel_sigma;

const THRESHOLDS: [u8; 4] = [5, 25, 45, 65];
const BLUR_KERNELS: [u32; 4] = [11, 21, 31, 41];
const REGION_SHADE: Luma<u8> = Luma([200]);

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// First image (the "before" frame).
    first: PathBuf,
    /// Second image (the "after" frame).
    second: PathBuf,
    /// Output folder.
    #[arg(long, default_value = "frame_diff_out")]
    out: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let first = load(&args.first)?;
    let second = load(&args.second)?;
    if first.dimensions() != second.dimensions() {
        return Err(anyhow!(
            "images differ in size: {}x{} vs {}x{}",
            first.width(),
            first.height(),
            second.width(),
            second.height()
        ));
    }
    fs::create_dir_all(&args.out)
        .with_context(|| format!("create output folder {}", args.out.display()))?;
    let out = args.out.as_path();

    save_rgb(out, "delta_1_2", &saturating_sub(&first, &second))?;
    save_rgb(out, "delta_2_1", &saturating_sub(&second, &first))?;
    save_rgb(out, "delta_abs", &colour_abs_diff(&first, &second))?;

    let gray1 = imageops::grayscale(&first);
    let gray2 = imageops::grayscale(&second);
    let gray_delta = absolute_difference(&gray1, &gray2);
    save_gray(out, "gray_delta_abs", &gray_delta)?;

    for t in THRESHOLDS {
        let mask = threshold(&gray_delta, t, ThresholdType::Binary);
        save_gray(out, &format!("threshold_{}", t), &mask)?;
    }

    for k in BLUR_KERNELS {
        let sigma = kernel_sigma(k);
        let blurred = absolute_difference(
            &imageops::blur(&gray1, sigma),
            &imageops::blur(&gray2, sigma),
        );
        save_gray(out, &format!("blur_diff_{}", k), &blurred)?;
    }

    let blurred = absolute_difference(
        &imageops::blur(&gray1, kernel_sigma(BLUR_KERNELS[0])),
        &imageops::blur(&gray2, kernel_sigma(BLUR_KERNELS[0])),
    );
    let mask = dilate_mask(
        &threshold(&blurred, DEFAULT_THRESHOLD, ThresholdType::Binary),
        DEFAULT_DILATE_ITERATIONS,
    );
    let regions = external_regions(&mask);
    let mut boxes = mask.clone();
    for region in &regions {
        let b = region.bbox;
        draw_hollow_rect_mut(
            &mut boxes,
            Rect::at(b.x as i32, b.y as i32).of_size(b.width.max(1), b.height.max(1)),
            REGION_SHADE,
        );
    }
    save_gray(out, "regions", &boxes)?;

    println!("{} regions (blur {}, threshold {}):", regions.len(), BLUR_KERNELS[0], DEFAULT_THRESHOLD);
    for region in &regions {
        println!("  {} area={:.0}", region.bbox, region.area);
    }
    log::info!("wrote diff images to {}", out.display());
    Ok(())
}

fn load(path: &Path) -> Result<RgbImage> {
    Ok(image::open(path)
        .with_context(|| format!("open {}", path.display()))?
        .to_rgb8())
}

fn saturating_sub(a: &RgbImage, b: &RgbImage) -> RgbImage {
    RgbImage::from_fn(a.width(), a.height(), |x, y| {
        let (pa, pb) = (a.get_pixel(x, y).0, b.get_pixel(x, y).0);
        Rgb([
            pa[0].saturating_sub(pb[0]),
            pa[1].saturating_sub(pb[1]),
            pa[2].saturating_sub(pb[2]),
        ])
    })
}

fn colour_abs_diff(a: &RgbImage, b: &RgbImage) -> RgbImage {
    RgbImage::from_fn(a.width(), a.height(), |x, y| {
        let (pa, pb) = (a.get_pixel(x, y).0, b.get_pixel(x, y).0);
        Rgb([
            pa[0].abs_diff(pb[0]),
            pa[1].abs_diff(pb[1]),
            pa[2].abs_diff(pb[2]),
        ])
    })
}

fn save_rgb(dir: &Path, name: &str, image: &RgbImage) -> Result<()> {
    let path = dir.join(format!("{}.png", name));
    image
        .save(&path)
        .with_context(|| format!("write {}", path.display()))
}

fn save_gray(dir: &Path, name: &str, image: &GrayImage) -> Result<()> {
    let path = dir.join(format!("{}.png", name));
    image
        .save(&path)
        .with_context(|| format!("write {}", path.display()))
}
