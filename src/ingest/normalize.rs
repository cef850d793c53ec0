use anyhow::{anyhow, Result};
use image::RgbImage;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PixelFormat {
    Rgb24,
    Nv12,
}

impl PixelFormat {
    pub(crate) fn from_fourcc(fourcc: &[u8; 4]) -> Result<Self> {
        match fourcc {
            b"RGB3" => Ok(Self::Rgb24),
            b"NV12" => Ok(Self::Nv12),
            other => Err(anyhow!(
                "unsupported capture pixel format {}",
                String::from_utf8_lossy(other)
            )),
        }
    }
}

/// Convert a captured buffer into an owned RGB image.
pub(crate) fn to_rgb_image(
    pixels: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
) -> Result<RgbImage> {
    let rgb = match format {
        PixelFormat::Rgb24 => {
            let expected = width
                .checked_mul(height)
                .and_then(|v| v.checked_mul(3))
                .ok_or_else(|| anyhow!("RGB frame dimensions overflow"))? as usize;
            // Drivers may pad the last buffer; anything shorter is a torn frame.
            if pixels.len() < expected {
                return Err(anyhow!(
                    "RGB frame too short: expected {}, got {}",
                    expected,
                    pixels.len()
                ));
            }
            pixels[..expected].to_vec()
        }
        PixelFormat::Nv12 => nv12_to_rgb(pixels, width, height)?,
    };
    RgbImage::from_raw(width, height, rgb)
        .ok_or_else(|| anyhow!("captured frame does not fit {}x{}", width, height))
}

fn nv12_to_rgb(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let w = width as usize;
    let h = height as usize;
    let y_plane = w
        .checked_mul(h)
        .ok_or_else(|| anyhow!("NV12 frame dimensions overflow"))?;
    let expected = y_plane
        .checked_add(y_plane / 2)
        .ok_or_else(|| anyhow!("NV12 frame dimensions overflow"))?;
    if pixels.len() < expected {
        return Err(anyhow!(
            "NV12 frame too short: expected {}, got {}",
            expected,
            pixels.len()
        ));
    }

    let mut rgb = vec![0u8; y_plane * 3];
    for j in 0..h {
        for i in 0..w {
            let y = pixels[j * w + i] as f32;
            let uv_index = y_plane + (j / 2) * w + (i / 2) * 2;
            let u = pixels[uv_index] as f32 - 128.0;
            let v = pixels[uv_index + 1] as f32 - 128.0;

            let offset = (j * w + i) * 3;
            rgb[offset] = clamp_to_u8(y + 1.402 * v);
            rgb[offset + 1] = clamp_to_u8(y - 0.344_136 * u - 0.714_136 * v);
            rgb[offset + 2] = clamp_to_u8(y + 1.772 * u);
        }
    }

    Ok(rgb)
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
