//! Recognition of confirmed objects.
//!
//! A `RecognitionService` turns an image into a ranked list of concepts. The
//! `RecognitionAdapter` calls it once per confirmed object and copies the top
//! concept names onto the object. Service failures never propagate: the object
//! simply keeps an empty label list.

#[cfg(feature = "recognize-clarifai")]
pub mod clarifai;
pub mod stub;

use anyhow::{anyhow, Result};
use image::RgbImage;

use crate::track::TrackedObject;

#[cfg(feature = "recognize-clarifai")]
pub use clarifai::{ClarifaiConfig, ClarifaiService};
pub use stub::StubRecognizer;

/// Status code the recognition service reports on success.
pub const STATUS_SUCCESS: u32 = 10000;

/// Maximum number of labels kept per object.
pub const MAX_LABELS: usize = 5;

#[derive(Clone, Debug, PartialEq)]
pub struct Concept {
    pub name: String,
    pub confidence: f32,
}

/// Result of one prediction call. Concepts are ordered most relevant first.
#[derive(Clone, Debug, PartialEq)]
pub struct Prediction {
    pub status_code: u32,
    pub status_description: String,
    pub concepts: Vec<Concept>,
}

impl Prediction {
    pub fn is_success(&self) -> bool {
        self.status_code == STATUS_SUCCESS
    }
}

/// External recognition capability.
///
/// `Err` means the call itself failed (transport, decoding). A reachable
/// service that refuses the request returns `Ok` with a non-success status.
pub trait RecognitionService {
    /// Service identifier for logs.
    fn name(&self) -> &'static str;

    fn predict(&mut self, image: &RgbImage) -> Result<Prediction>;
}

#[derive(Clone, Debug, PartialEq)]
pub enum RecognitionOutcome {
    /// Number of labels attached to the object.
    Labeled(usize),
    /// The service answered with a non-success status.
    Rejected { status_code: u32, description: String },
    /// The call did not complete.
    Failed(String),
}

pub const DEFAULT_API_URL: &str = "https://api.clarifai.com/v2";
pub const DEFAULT_MODEL_ID: &str = "general-image-recognition";

/// Which recognition service to use, if any.
///
/// An `api_url` starting with `stub://` selects the offline `StubRecognizer`.
#[derive(Clone, Debug)]
pub struct RecognitionSettings {
    pub enabled: bool,
    pub api_key: String,
    pub model_id: String,
    pub api_url: String,
}

impl Default for RecognitionSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
        }
    }
}

impl RecognitionSettings {
    pub fn is_stub(&self) -> bool {
        self.api_url.starts_with("stub://")
    }

    pub fn validate(&self) -> Result<()> {
        if self.enabled && !self.is_stub() && self.api_key.trim().is_empty() {
            return Err(anyhow!("recognition is enabled but no api key is configured"));
        }
        Ok(())
    }

    /// Service selected by these settings, ignoring `enabled`.
    pub fn build_service(&self) -> Result<Box<dyn RecognitionService>> {
        if self.is_stub() {
            return Ok(Box::new(StubRecognizer::new()));
        }
        #[cfg(feature = "recognize-clarifai")]
        {
            let service = ClarifaiService::new(ClarifaiConfig {
                api_url: self.api_url.clone(),
                api_key: self.api_key.clone(),
                model_id: self.model_id.clone(),
                ..ClarifaiConfig::default()
            })?;
            Ok(Box::new(service))
        }
        #[cfg(not(feature = "recognize-clarifai"))]
        {
            Err(anyhow!(
                "recognition via {} requires the recognize-clarifai feature",
                self.api_url
            ))
        }
    }

    /// Adapter for the configured service, or `None` when recognition is off.
    pub fn build_adapter(&self) -> Result<Option<RecognitionAdapter>> {
        if !self.enabled {
            return Ok(None);
        }
        self.validate()?;
        Ok(Some(RecognitionAdapter::new(self.build_service()?)))
    }
}

pub struct RecognitionAdapter {
    service: Box<dyn RecognitionService>,
    max_labels: usize,
}

impl RecognitionAdapter {
    pub fn new(service: Box<dyn RecognitionService>) -> Self {
        Self {
            service,
            max_labels: MAX_LABELS,
        }
    }

    pub fn service_name(&self) -> &'static str {
        self.service.name()
    }

    /// Submit `snapshot` once and append the returned labels to `object`.
    pub fn recognize(&mut self, object: &mut TrackedObject, snapshot: &RgbImage) -> RecognitionOutcome {
        let id = object.id();
        let prediction = match self.service.predict(snapshot) {
            Ok(prediction) => prediction,
            Err(e) => {
                log::warn!(
                    "recognition via {} failed for object {}: {:#}",
                    self.service.name(),
                    id,
                    e
                );
                return RecognitionOutcome::Failed(e.to_string());
            }
        };

        if !prediction.is_success() {
            log::warn!(
                "recognition via {} rejected object {}: status {} ({})",
                self.service.name(),
                id,
                prediction.status_code,
                prediction.status_description
            );
            return RecognitionOutcome::Rejected {
                status_code: prediction.status_code,
                description: prediction.status_description,
            };
        }

        let before = object.labels().len();
        object.push_labels(
            prediction.concepts.into_iter().map(|c| c.name),
            self.max_labels,
        );
        let added = object.labels().len() - before;
        log::info!("object {} recognized as [{}]", id, object.labels().join(", "));
        RecognitionOutcome::Labeled(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;
    use crate::track::{ObjectTracker, TrackerSettings};
    use anyhow::anyhow;
    use std::time::UNIX_EPOCH;

    struct Scripted(Result<Prediction, String>);

    impl RecognitionService for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn predict(&mut self, _image: &RgbImage) -> Result<Prediction> {
            self.0.clone().map_err(|e| anyhow!(e))
        }
    }

    fn fresh_object() -> TrackedObject {
        let mut tracker = ObjectTracker::new(TrackerSettings::default());
        let obs = tracker.update(&[BoundingBox::new(0, 0, 10, 10)], UNIX_EPOCH);
        tracker.remove(obs[0].id()).unwrap()
    }

    fn concepts(names: &[&str]) -> Vec<Concept> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| Concept {
                name: n.to_string(),
                confidence: 1.0 - i as f32 * 0.1,
            })
            .collect()
    }

    #[test]
    fn success_keeps_top_five_in_order() {
        let mut adapter = RecognitionAdapter::new(Box::new(Scripted(Ok(Prediction {
            status_code: STATUS_SUCCESS,
            status_description: "Ok".into(),
            concepts: concepts(&["bag", "leather", "brown", "fashion", "luggage", "strap", "travel"]),
        }))));
        let mut obj = fresh_object();
        let outcome = adapter.recognize(&mut obj, &RgbImage::new(4, 4));
        assert_eq!(outcome, RecognitionOutcome::Labeled(5));
        assert_eq!(obj.labels(), ["bag", "leather", "brown", "fashion", "luggage"]);
    }

    #[test]
    fn non_success_status_leaves_labels_empty() {
        let mut adapter = RecognitionAdapter::new(Box::new(Scripted(Ok(Prediction {
            status_code: 10001,
            status_description: "partial failure".into(),
            concepts: concepts(&["bag"]),
        }))));
        let mut obj = fresh_object();
        let outcome = adapter.recognize(&mut obj, &RgbImage::new(4, 4));
        assert!(matches!(outcome, RecognitionOutcome::Rejected { status_code: 10001, .. }));
        assert!(obj.labels().is_empty());
    }

    #[test]
    fn disabled_settings_build_no_adapter() -> Result<()> {
        assert!(RecognitionSettings::default().build_adapter()?.is_none());
        Ok(())
    }

    #[test]
    fn enabled_without_key_is_rejected() {
        let settings = RecognitionSettings {
            enabled: true,
            ..RecognitionSettings::default()
        };
        assert!(settings.build_adapter().is_err());
    }

    #[test]
    fn stub_url_needs_no_key() -> Result<()> {
        let settings = RecognitionSettings {
            enabled: true,
            api_url: "stub://labels".to_string(),
            ..RecognitionSettings::default()
        };
        let adapter = settings.build_adapter()?;
        assert_eq!(adapter.map(|a| a.service_name()), Some("stub"));
        Ok(())
    }

    #[test]
    fn transport_error_is_not_fatal() {
        let mut adapter = RecognitionAdapter::new(Box::new(Scripted(Err("timed out".into()))));
        let mut obj = fresh_object();
        let outcome = adapter.recognize(&mut obj, &RgbImage::new(4, 4));
        assert!(matches!(outcome, RecognitionOutcome::Failed(_)));
        assert!(obj.labels().is_empty());
    }
}
