use anyhow::Result;
use image::RgbImage;

use super::{Concept, Prediction, RecognitionService, STATUS_SUCCESS};

/// Offline recognizer for demos and tests.
///
/// Labels an image by its dominant colour channel and brightness, so the same
/// snapshot always gets the same answer and no network is touched.
#[derive(Default)]
pub struct StubRecognizer {
    calls: u64,
}

impl StubRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl RecognitionService for StubRecognizer {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn predict(&mut self, image: &RgbImage) -> Result<Prediction> {
        self.calls += 1;

        let count = (image.width() as u64 * image.height() as u64).max(1);
        let mut sums = [0u64; 3];
        for pixel in image.pixels() {
            for (sum, channel) in sums.iter_mut().zip(pixel.0) {
                *sum += channel as u64;
            }
        }
        let means = sums.map(|s| (s / count) as u8);
        let brightness = means.iter().map(|&m| m as u32).sum::<u32>() / 3;

        let dominant = match (0..3).max_by_key(|&i| means[i]) {
            Some(0) => "red",
            Some(1) => "green",
            _ => "blue",
        };
        let tone = if brightness > 127 { "bright" } else { "dark" };

        Ok(Prediction {
            status_code: STATUS_SUCCESS,
            status_description: "Ok".to_string(),
            concepts: vec![
                Concept {
                    name: "object".to_string(),
                    confidence: 0.9,
                },
                Concept {
                    name: dominant.to_string(),
                    confidence: 0.6,
                },
                Concept {
                    name: tone.to_string(),
                    confidence: 0.4,
                },
            ],
        })
    }
}
