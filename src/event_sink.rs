//! Event sink
//!
//! ## Responsibilities
//!
//! - Persist qualifying detections: snapshot upload + events row
//! - Fan out alert dispatch after persistence (fire-and-forget)
//!
//! Any failure before the row is inserted aborts the whole call: the event is
//! lost, the worker loop continues, and no alert goes out for an event that
//! was never persisted.

use crate::detector::BoundingBox;
use crate::error::Result;
use crate::frame_source::Frame;
use crate::notifier::{EventSummary, Notifier};
use crate::object_store::ObjectStore;
use crate::settings_cache::SettingsCache;
use crate::store::{NewDetectionEvent, RemoteStore};
use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use std::io::Cursor;
use std::sync::Arc;
use uuid::Uuid;

/// A qualifying detection awaiting persistence
#[derive(Debug, Clone)]
pub struct EventCandidate {
    pub camera_id: Uuid,
    pub camera_name: String,
    pub model_id: Uuid,
    pub label: String,
    /// 0-1 scale as returned by the detector
    pub confidence: f32,
    pub bbox: BoundingBox,
    pub frame: Frame,
}

/// Seam between the stream worker and event persistence
#[async_trait]
pub trait EventRecorder: Send + Sync {
    async fn record(&self, candidate: EventCandidate) -> Result<()>;
}

/// Persists events and dispatches alerts
pub struct EventSink {
    store: Arc<dyn RemoteStore>,
    objects: Arc<dyn ObjectStore>,
    settings: Arc<SettingsCache>,
    notifier: Arc<dyn Notifier>,
    bucket: String,
}

impl EventSink {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        objects: Arc<dyn ObjectStore>,
        settings: Arc<SettingsCache>,
        notifier: Arc<dyn Notifier>,
        bucket: String,
    ) -> Self {
        Self {
            store,
            objects,
            settings,
            notifier,
            bucket,
        }
    }

    /// Normalize the captured frame to a JPEG still
    fn encode_snapshot(frame: &Frame) -> Result<Vec<u8>> {
        let decoded = image::load_from_memory(&frame.data)?;
        let mut out = Cursor::new(Vec::new());
        decoded.write_with_encoder(JpegEncoder::new_with_quality(&mut out, 85))?;
        Ok(out.into_inner())
    }

    fn dispatch_alerts(&self, summary: EventSummary) {
        let settings_cache = self.settings.clone();
        let notifier = self.notifier.clone();

        tokio::spawn(async move {
            let settings = settings_cache.current().await;

            if settings.alert_email {
                if let Err(e) = notifier.send_email(&settings, &summary).await {
                    tracing::warn!(error = %e, "Alert email dispatch failed");
                }
            }

            if settings.alert_sms {
                if let Err(e) = notifier.send_sms(&settings, &summary).await {
                    tracing::warn!(error = %e, "Alert SMS dispatch failed");
                }
            }
        });
    }
}

#[async_trait]
impl EventRecorder for EventSink {
    async fn record(&self, candidate: EventCandidate) -> Result<()> {
        let snapshot = Self::encode_snapshot(&candidate.frame)?;

        // 1s key granularity; the per-worker cooldown already spaces events
        // further apart than that
        let key = format!(
            "events/{}_{}.jpg",
            candidate.camera_id,
            candidate.frame.captured_at.timestamp()
        );

        self.objects
            .upload(&self.bucket, &key, snapshot, "image/jpeg")
            .await?;

        let snapshot_url = self.objects.public_url(&self.bucket, &key);
        let confidence = candidate.confidence * 100.0;

        let event = NewDetectionEvent {
            camera_id: candidate.camera_id,
            model_id: candidate.model_id,
            event_type: candidate.label.clone(),
            confidence,
            snapshot_url: snapshot_url.clone(),
            metadata: serde_json::json!({ "box": candidate.bbox }),
            created_at: candidate.frame.captured_at,
        };

        self.store.insert_event(&event).await?;

        tracing::info!(
            camera_id = %candidate.camera_id,
            label = %candidate.label,
            confidence = confidence,
            "Detection event recorded"
        );

        self.dispatch_alerts(EventSummary {
            camera_name: candidate.camera_name,
            label: candidate.label,
            confidence,
            snapshot_url,
        });

        Ok(())
    }
}
