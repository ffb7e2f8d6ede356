//! Detector adapter
//!
//! ## Responsibilities
//!
//! - Load a detection model on the inference sidecar
//! - Submit sampled frames and parse detections
//!
//! The sidecar owns the actual model runtime; this adapter only speaks its
//! HTTP API. Confidence is on the 0-1 scale here and converted to 0-100 by
//! the event sink.

use crate::error::{Error, Result};
use crate::frame_source::Frame;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Axis-aligned bounding box (pixel coordinates)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// One detection returned by the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    /// 0-1 scale
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// A loaded model that can run inference on frames
#[async_trait]
pub trait Detector: Send + Sync {
    async fn infer(&self, frame: &Frame) -> Result<Vec<Detection>>;
}

/// Resolves a model artifact into a ready Detector
#[async_trait]
pub trait DetectorLoader: Send + Sync {
    async fn load(&self, model_path: &str) -> Result<Arc<dyn Detector>>;
}

/// Inference sidecar client
pub struct InferenceClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct LoadRequest<'a> {
    model_path: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoadResponse {
    model_ref: String,
}

#[derive(Debug, Deserialize)]
struct InferResponse {
    detections: Vec<Detection>,
}

impl InferenceClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl DetectorLoader for InferenceClient {
    async fn load(&self, model_path: &str) -> Result<Arc<dyn Detector>> {
        let url = format!("{}/v1/models/load", self.base_url);

        let resp = self
            .client
            .post(&url)
            .json(&LoadRequest { model_path })
            .send()
            .await
            .map_err(|e| Error::ModelLoad(format!("load request failed: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::ModelLoad(format!(
                "sidecar returned {} for {}: {}",
                status,
                model_path,
                body.trim()
            )));
        }

        let loaded: LoadResponse = resp
            .json()
            .await
            .map_err(|e| Error::ModelLoad(format!("load response parse: {}", e)))?;

        tracing::info!(model_path = %model_path, model_ref = %loaded.model_ref, "Model loaded");

        Ok(Arc::new(LoadedModel {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            model_ref: loaded.model_ref,
        }))
    }
}

/// Handle to a model resident on the sidecar
struct LoadedModel {
    client: reqwest::Client,
    base_url: String,
    model_ref: String,
}

#[async_trait]
impl Detector for LoadedModel {
    async fn infer(&self, frame: &Frame) -> Result<Vec<Detection>> {
        let url = format!("{}/v1/infer", self.base_url);

        let form = Form::new()
            .text("model_ref", self.model_ref.clone())
            .part(
                "frame",
                Part::bytes(frame.data.clone())
                    .file_name("frame.jpg")
                    .mime_str("image/jpeg")?,
            );

        let resp = self.client.post(&url).multipart(form).send().await?;

        if !resp.status().is_success() {
            return Err(Error::Internal(format!(
                "inference returned {}",
                resp.status()
            )));
        }

        let parsed: InferResponse = resp.json().await?;
        Ok(parsed.detections)
    }
}
