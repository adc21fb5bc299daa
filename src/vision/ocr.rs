//! Remote OCR gateway client
//!
//! Posts the normalized image as base64 JPEG to a general-recognition
//! endpoint and maps the response into [`OcrRegion`]s in working-pixel
//! coordinates.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::config::OcrConfig;
use crate::vision::{OcrClient, OcrRegion, Rect};

/// HTTP OCR client.
pub struct RemoteOcr {
    http: reqwest::Client,
    endpoint: String,
    token: String,
}

impl RemoteOcr {
    pub fn new(config: &OcrConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            token: config.token.clone(),
        })
    }
}

#[async_trait]
impl OcrClient for RemoteOcr {
    async fn recognize(&self, image_jpeg: &[u8]) -> Result<Vec<OcrRegion>> {
        let payload = base64::engine::general_purpose::STANDARD.encode(image_jpeg);
        info!("submitting {} KiB image to OCR gateway", image_jpeg.len() / 1024);

        let mut request = self
            .http
            .post(&self.endpoint)
            .json(&json!({ "image": payload }));
        if !self.token.is_empty() {
            request = request.bearer_auth(&self.token);
        }

        let resp = request.send().await.context("OCR request failed")?;
        let status = resp.status();
        if !status.is_success() {
            bail!("OCR gateway returned HTTP {status}");
        }

        let body: OcrResponse = resp.json().await.context("OCR response malformed")?;
        if body.code != 0 {
            bail!("OCR gateway error ({}): {}", body.code, body.message);
        }

        let regions: Vec<OcrRegion> = body
            .regions
            .into_iter()
            .filter(|r| r.x_bottom > r.x_top && r.y_bottom > r.y_top)
            .map(|r| OcrRegion {
                text: r.text,
                rect: Rect::new(r.x_top, r.y_top, r.x_bottom, r.y_bottom),
            })
            .collect();
        debug!("OCR gateway recognized {} regions", regions.len());
        Ok(regions)
    }
}

#[derive(Debug, Deserialize)]
struct OcrResponse {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
    #[serde(default)]
    regions: Vec<WireRegion>,
}

#[derive(Debug, Deserialize)]
struct WireRegion {
    text: String,
    x_top: f32,
    y_top: f32,
    x_bottom: f32,
    y_bottom: f32,
}
