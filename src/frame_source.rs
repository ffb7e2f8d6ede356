//! Frame source
//!
//! ## Responsibilities
//!
//! - Open a camera stream by URL and yield JPEG frames
//! - Signal read failures so the worker can reconnect
//!
//! The production source grabs one frame per read by spawning ffmpeg against
//! the stream URL. `kill_on_drop(true)` means a timed-out grab drops the
//! child and SIGKILLs ffmpeg, so unresponsive cameras cannot accumulate
//! zombie processes.

use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// A single captured frame (JPEG bytes)
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub captured_at: DateTime<Utc>,
}

/// Opens streams; one per camera worker
#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn open(&self, stream_url: &str) -> Result<Box<dyn FrameStream>>;
}

/// An open stream yielding frames in order
#[async_trait]
pub trait FrameStream: Send {
    /// Next frame; Err means the connection should be reopened
    async fn read_frame(&mut self) -> Result<Frame>;

    /// Release the underlying connection; must be called before the worker
    /// reports itself stopped
    async fn close(&mut self);
}

/// ffmpeg-based frame source
pub struct FfmpegFrameSource {
    grab_timeout: Duration,
}

impl FfmpegFrameSource {
    pub fn new(grab_timeout: Duration) -> Self {
        Self { grab_timeout }
    }
}

impl Default for FfmpegFrameSource {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[async_trait]
impl FrameSource for FfmpegFrameSource {
    async fn open(&self, stream_url: &str) -> Result<Box<dyn FrameStream>> {
        // No persistent connection is held between grabs; "open" validates
        // nothing so the first read reports connectivity problems
        Ok(Box::new(FfmpegFrameStream {
            stream_url: stream_url.to_string(),
            grab_timeout: self.grab_timeout,
            closed: false,
        }))
    }
}

struct FfmpegFrameStream {
    stream_url: String,
    grab_timeout: Duration,
    closed: bool,
}

#[async_trait]
impl FrameStream for FfmpegFrameStream {
    async fn read_frame(&mut self) -> Result<Frame> {
        if self.closed {
            return Err(Error::Stream("stream closed".to_string()));
        }

        let data = grab_frame(&self.stream_url, self.grab_timeout).await?;
        Ok(Frame {
            data,
            captured_at: Utc::now(),
        })
    }

    async fn close(&mut self) {
        self.closed = true;
        tracing::debug!(stream_url = %self.stream_url, "Frame stream released");
    }
}

/// Capture one frame from a stream using ffmpeg
///
/// -rtsp_transport tcp: TCP is more reliable for RTSP sources
/// -frames:v 1: capture a single frame
/// -f image2pipe -vcodec mjpeg: JPEG to stdout
async fn grab_frame(stream_url: &str, grab_timeout: Duration) -> Result<Vec<u8>> {
    let child = Command::new("ffmpeg")
        .args([
            "-rtsp_transport", "tcp",
            "-i", stream_url,
            "-frames:v", "1",
            "-f", "image2pipe",
            "-vcodec", "mjpeg",
            "-loglevel", "error",
            "-y",
            "-",
        ])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| Error::Stream(format!("ffmpeg spawn failed: {}", e)))?;

    match tokio::time::timeout(grab_timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => {
            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(Error::Stream(format!("ffmpeg failed: {}", stderr.trim())));
            }
            if output.stdout.is_empty() {
                return Err(Error::Stream("ffmpeg returned empty output".to_string()));
            }
            Ok(output.stdout)
        }
        Ok(Err(e)) => Err(Error::Stream(format!("ffmpeg execution failed: {}", e))),
        Err(_) => {
            // Child dropped on timeout; kill_on_drop sends SIGKILL
            tracing::warn!(
                timeout_sec = grab_timeout.as_secs(),
                stream_url = %stream_url,
                "ffmpeg frame grab timeout, process killed"
            );
            Err(Error::Stream(format!(
                "ffmpeg timeout ({}s)",
                grab_timeout.as_secs()
            )))
        }
    }
}
