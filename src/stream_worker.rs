//! Stream worker - per (camera, model) detection pipeline
//!
//! ## Responsibilities
//!
//! - Pull frames from the camera stream, sampling every Nth
//! - Run detection, filter by confidence threshold
//! - Hand qualifying detections to the event recorder, rate-bounded by a
//!   per-worker cooldown window
//!
//! Connectivity hiccups are expected: a failed read closes and reopens the
//! stream after a backoff without terminating the worker. Only cancellation
//! (or a model that cannot be loaded) ends the pipeline.

use crate::detector::DetectorLoader;
use crate::event_sink::{EventCandidate, EventRecorder};
use crate::frame_source::{FrameSource, FrameStream};
use crate::state::PipelineConfig;
use crate::store::{AiModel, Camera};
use std::sync::Arc;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

/// Pipeline lifecycle, traced as a log field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkerState {
    Init,
    Connecting,
    Streaming,
    Reconnecting,
    Stopping,
    Stopped,
}

impl WorkerState {
    fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Init => "init",
            WorkerState::Connecting => "connecting",
            WorkerState::Streaming => "streaming",
            WorkerState::Reconnecting => "reconnecting",
            WorkerState::Stopping => "stopping",
            WorkerState::Stopped => "stopped",
        }
    }
}

/// Shared collaborators handed to every worker
#[derive(Clone)]
pub struct WorkerContext {
    pub loader: Arc<dyn DetectorLoader>,
    pub frames: Arc<dyn FrameSource>,
    pub recorder: Arc<dyn EventRecorder>,
    pub config: PipelineConfig,
}

/// Run one pipeline until cancelled (or until the model proves unloadable)
pub async fn run_worker(
    ctx: WorkerContext,
    camera: Camera,
    model: AiModel,
    cancel: CancellationToken,
) {
    tracing::info!(
        camera_id = %camera.id,
        model_id = %model.id,
        state = WorkerState::Init.as_str(),
        "Worker starting"
    );

    // INIT: resolve the detector; failure is terminal for this instance and
    // the next reconciliation tick retries the key
    let model_path = match model.model_path.as_deref() {
        Some(path) => path,
        None => {
            tracing::error!(
                camera_id = %camera.id,
                model_id = %model.id,
                "Model has no artifact path, worker terminating"
            );
            return;
        }
    };

    let detector = match ctx.loader.load(model_path).await {
        Ok(detector) => detector,
        Err(e) => {
            tracing::error!(
                camera_id = %camera.id,
                model_id = %model.id,
                error = %e,
                state = WorkerState::Stopped.as_str(),
                "Model load failed, worker terminating"
            );
            return;
        }
    };

    // CONNECTING
    tracing::debug!(
        camera_id = %camera.id,
        state = WorkerState::Connecting.as_str(),
        "Opening frame stream"
    );
    let mut stream = match connect(&ctx, &camera, &cancel, false).await {
        Some(stream) => stream,
        None => {
            tracing::info!(
                camera_id = %camera.id,
                model_id = %model.id,
                state = WorkerState::Stopped.as_str(),
                "Worker cancelled before streaming"
            );
            return;
        }
    };

    tracing::info!(
        camera_id = %camera.id,
        model_id = %model.id,
        state = WorkerState::Streaming.as_str(),
        "Worker streaming"
    );

    let mut frame_count: u64 = 0;
    let mut cooldown_until: Option<Instant> = None;
    let sample_interval = ctx.config.sample_interval.max(1);

    // STREAMING
    loop {
        let read = tokio::select! {
            _ = cancel.cancelled() => break,
            read = stream.read_frame() => read,
        };

        let frame = match read {
            Ok(frame) => frame,
            Err(e) => {
                // RECONNECTING: close, back off, reopen; the worker survives
                tracing::warn!(
                    camera_id = %camera.id,
                    error = %e,
                    state = WorkerState::Reconnecting.as_str(),
                    "Frame read failed, reconnecting"
                );
                stream.close().await;
                match connect(&ctx, &camera, &cancel, true).await {
                    Some(new_stream) => {
                        stream = new_stream;
                        tracing::info!(
                            camera_id = %camera.id,
                            state = WorkerState::Streaming.as_str(),
                            "Stream reopened"
                        );
                        continue;
                    }
                    None => {
                        // Cancelled mid-reconnect; nothing left to release
                        tracing::info!(
                            camera_id = %camera.id,
                            model_id = %model.id,
                            state = WorkerState::Stopped.as_str(),
                            "Worker stopped"
                        );
                        return;
                    }
                }
            }
        };

        frame_count += 1;
        if frame_count % sample_interval == 0 {
            cooldown_until = process_sample(&ctx, &camera, &model, &detector, frame, cooldown_until)
                .await;
        }

        if !ctx.config.read_pause.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sleep(ctx.config.read_pause) => {}
            }
        }
    }

    // STOPPING: any in-flight record has already completed (records are
    // awaited inline); release the stream before reporting stopped
    tracing::debug!(
        camera_id = %camera.id,
        state = WorkerState::Stopping.as_str(),
        "Releasing frame stream"
    );
    stream.close().await;
    tracing::info!(
        camera_id = %camera.id,
        model_id = %model.id,
        state = WorkerState::Stopped.as_str(),
        "Worker stopped"
    );
}

/// Detect on a sampled frame and hand off qualifying detections.
/// Returns the updated cooldown deadline.
async fn process_sample(
    ctx: &WorkerContext,
    camera: &Camera,
    model: &AiModel,
    detector: &Arc<dyn crate::detector::Detector>,
    frame: crate::frame_source::Frame,
    cooldown_until: Option<Instant>,
) -> Option<Instant> {
    let detections = match detector.infer(&frame).await {
        Ok(detections) => detections,
        Err(e) => {
            tracing::warn!(camera_id = %camera.id, error = %e, "Inference failed");
            return cooldown_until;
        }
    };

    let qualifying: Vec<_> = detections
        .into_iter()
        .filter(|d| d.confidence > ctx.config.confidence_threshold)
        .collect();

    if qualifying.is_empty() {
        return cooldown_until;
    }

    // Frames inside the cooldown window are still detected, but everything
    // they produce is suppressed to bound the event write rate
    if let Some(until) = cooldown_until {
        if Instant::now() < until {
            tracing::debug!(
                camera_id = %camera.id,
                suppressed = qualifying.len(),
                "Detections suppressed by cooldown"
            );
            return cooldown_until;
        }
    }

    let mut handed_off = false;
    for detection in qualifying {
        tracing::info!(
            camera_id = %camera.id,
            label = %detection.label,
            confidence = detection.confidence,
            "Qualifying detection"
        );

        let candidate = EventCandidate {
            camera_id: camera.id,
            camera_name: camera.name.clone(),
            model_id: model.id,
            label: detection.label,
            confidence: detection.confidence,
            bbox: detection.bbox,
            frame: frame.clone(),
        };

        match ctx.recorder.record(candidate).await {
            Ok(()) => handed_off = true,
            Err(e) => {
                tracing::warn!(camera_id = %camera.id, error = %e, "Event record failed");
            }
        }
    }

    if handed_off {
        Some(Instant::now() + ctx.config.cooldown)
    } else {
        cooldown_until
    }
}

/// Open the frame stream, backing off between attempts. None means the
/// worker was cancelled while disconnected.
async fn connect(
    ctx: &WorkerContext,
    camera: &Camera,
    cancel: &CancellationToken,
    backoff_first: bool,
) -> Option<Box<dyn FrameStream>> {
    let mut wait = backoff_first;

    loop {
        if wait {
            tokio::select! {
                _ = cancel.cancelled() => return None,
                _ = sleep(ctx.config.reconnect_backoff) => {}
            }
        }
        if cancel.is_cancelled() {
            return None;
        }

        match ctx.frames.open(&camera.stream_url).await {
            Ok(stream) => return Some(stream),
            Err(e) => {
                tracing::warn!(
                    camera_id = %camera.id,
                    error = %e,
                    "Stream open failed, backing off"
                );
                wait = true;
            }
        }
    }
}
