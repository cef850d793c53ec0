//! Clarifai v2 REST recognizer.
//!
//! Snapshots are JPEG-encoded in memory and posted as base64 to the model
//! outputs endpoint. The response status code is passed through untouched so
//! the adapter can tell a refusal from success (`10000`).

use anyhow::{anyhow, Context, Result};
use base64::Engine;
use image::{ImageFormat, RgbImage};
use serde::Deserialize;
use std::io::Cursor;
use std::time::Duration;
use url::Url;

use super::{Concept, Prediction, RecognitionService, DEFAULT_API_URL, DEFAULT_MODEL_ID};
const DEFAULT_TIMEOUT_SECS: u64 = 15;

#[derive(Clone, Debug)]
pub struct ClarifaiConfig {
    pub api_url: String,
    pub api_key: String,
    pub model_id: String,
    /// Owner of the model, for community models (e.g. `clarifai` / `main`).
    pub user_app: Option<(String, String)>,
    pub timeout: Duration,
}

impl Default for ClarifaiConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: String::new(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            user_app: Some(("clarifai".to_string(), "main".to_string())),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

pub struct ClarifaiService {
    agent: ureq::Agent,
    endpoint: Url,
    api_key: String,
}

impl ClarifaiService {
    pub fn new(config: ClarifaiConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(anyhow!("clarifai api key must not be empty"));
        }
        let endpoint = outputs_endpoint(&config)?;
        let agent = ureq::AgentBuilder::new().timeout(config.timeout).build();
        Ok(Self {
            agent,
            endpoint,
            api_key: config.api_key,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl RecognitionService for ClarifaiService {
    fn name(&self) -> &'static str {
        "clarifai"
    }

    fn predict(&mut self, image: &RgbImage) -> Result<Prediction> {
        let body = request_body(image)?;
        let response = self
            .agent
            .post(self.endpoint.as_str())
            .set("Authorization", &format!("Key {}", self.api_key))
            .set("Content-Type", "application/json")
            .send_string(&body);

        // Clarifai reports refusals with a JSON status body on 4xx as well.
        let text = match response {
            Ok(resp) => resp.into_string().context("read clarifai response")?,
            Err(ureq::Error::Status(code, resp)) => {
                let text = resp.into_string().unwrap_or_default();
                if text.trim().is_empty() {
                    return Err(anyhow!("clarifai returned HTTP {} with empty body", code));
                }
                text
            }
            Err(e) => return Err(anyhow::Error::new(e).context("call clarifai")),
        };

        parse_prediction(&text)
    }
}

fn outputs_endpoint(config: &ClarifaiConfig) -> Result<Url> {
    let mut url = Url::parse(&config.api_url).context("parse clarifai api url")?;
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| anyhow!("clarifai api url cannot be a base: {}", config.api_url))?;
        segments.pop_if_empty();
        if let Some((user, app)) = &config.user_app {
            segments.extend(["users", user.as_str(), "apps", app.as_str()]);
        }
        segments.extend(["models", config.model_id.as_str(), "outputs"]);
    }
    Ok(url)
}

fn request_body(image: &RgbImage) -> Result<String> {
    let mut jpeg = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg)
        .context("encode snapshot as jpeg")?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(&jpeg);
    let body = serde_json::json!({
        "inputs": [
            { "data": { "image": { "base64": encoded } } }
        ]
    });
    Ok(body.to_string())
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: ApiStatus,
    #[serde(default)]
    outputs: Vec<ApiOutput>,
}

#[derive(Debug, Deserialize)]
struct ApiStatus {
    code: u32,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ApiOutput {
    #[serde(default)]
    data: ApiData,
}

#[derive(Debug, Default, Deserialize)]
struct ApiData {
    #[serde(default)]
    concepts: Vec<ApiConcept>,
}

#[derive(Debug, Deserialize)]
struct ApiConcept {
    name: String,
    #[serde(default)]
    value: f32,
}

/// Decode a model outputs response. Concepts come from the first output only.
pub fn parse_prediction(body: &str) -> Result<Prediction> {
    let response: ApiResponse =
        serde_json::from_str(body).map_err(|e| anyhow!("invalid clarifai response: {}", e))?;
    let concepts = response
        .outputs
        .into_iter()
        .next()
        .map(|output| output.data.concepts)
        .unwrap_or_default()
        .into_iter()
        .map(|c| Concept {
            name: c.name,
            confidence: c.value,
        })
        .collect();
    Ok(Prediction {
        status_code: response.status.code,
        status_description: response.status.description,
        concepts,
    })
}
