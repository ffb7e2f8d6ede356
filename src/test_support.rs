//! Shared fakes for the trait seams, used across module test suites.

use crate::detector::{BoundingBox, Detection, Detector, DetectorLoader};
use crate::error::{Error, Result};
use crate::event_sink::{EventCandidate, EventRecorder};
use crate::frame_source::{Frame, FrameSource, FrameStream};
use crate::notifier::{EventSummary, Notifier};
use crate::object_store::ObjectStore;
use crate::store::{
    AiModel, Assignment, Camera, CommandRow, CommandStatus, NewDetectionEvent, RemoteStore,
    ServerRecord, SystemSettings,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Minimal valid JPEG frame for sink tests
pub fn jpeg_frame(captured_at: DateTime<Utc>) -> Frame {
    let img = image::RgbImage::from_pixel(8, 8, image::Rgb([40, 80, 120]));
    let mut out = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut out, image::ImageFormat::Jpeg)
        .unwrap();
    Frame {
        data: out.into_inner(),
        captured_at,
    }
}

pub fn camera(name: &str) -> Camera {
    Camera {
        id: Uuid::new_v4(),
        name: name.to_string(),
        stream_url: format!("rtsp://cameras.local/{}", name),
        location: None,
    }
}

pub fn model_for(server_id: Uuid) -> AiModel {
    AiModel {
        id: Uuid::new_v4(),
        name: "yolo-things".to_string(),
        model_path: Some("models/yolo-things.onnx".to_string()),
        is_active: true,
        server_id: Some(server_id),
    }
}

pub fn detection(label: &str, confidence: f32) -> Detection {
    Detection {
        label: label.to_string(),
        confidence,
        bbox: BoundingBox {
            x: 10.0,
            y: 20.0,
            width: 30.0,
            height: 40.0,
        },
    }
}

// ---------------------------------------------------------------------------
// Remote store
// ---------------------------------------------------------------------------

/// In-memory RemoteStore with failure toggles
pub struct FakeStore {
    pub models: Mutex<Vec<AiModel>>,
    pub assignments: Mutex<Vec<Assignment>>,
    pub cameras: Mutex<Vec<Camera>>,
    pub commands: Mutex<Vec<CommandRow>>,
    pub events: Mutex<Vec<NewDetectionEvent>>,
    settings: Mutex<SystemSettings>,
    pub settings_fetches: AtomicUsize,
    pub fail_queries: AtomicBool,
    pub fail_settings: AtomicBool,
    pub servers: Mutex<Vec<ServerRecord>>,
    pub heartbeats: AtomicUsize,
}

impl FakeStore {
    pub fn new() -> Self {
        Self {
            models: Mutex::new(Vec::new()),
            assignments: Mutex::new(Vec::new()),
            cameras: Mutex::new(Vec::new()),
            commands: Mutex::new(Vec::new()),
            events: Mutex::new(Vec::new()),
            settings: Mutex::new(SystemSettings::default()),
            settings_fetches: AtomicUsize::new(0),
            fail_queries: AtomicBool::new(false),
            fail_settings: AtomicBool::new(false),
            servers: Mutex::new(Vec::new()),
            heartbeats: AtomicUsize::new(0),
        }
    }

    pub async fn set_settings(&self, settings: SystemSettings) {
        *self.settings.lock().await = settings;
    }

    /// Register camera + model + assignment in one step
    pub async fn add_pipeline(&self, camera: Camera, model: AiModel) {
        self.assignments.lock().await.push(Assignment {
            camera_id: camera.id,
            model_id: model.id,
        });
        self.cameras.lock().await.push(camera);
        self.models.lock().await.push(model);
    }

    pub async fn add_command(&self, command_type: &str, payload: serde_json::Value) -> Uuid {
        let id = Uuid::new_v4();
        self.commands.lock().await.push(CommandRow {
            id,
            command_type: command_type.to_string(),
            payload,
            status: CommandStatus::Pending,
            result: None,
        });
        id
    }

    pub async fn command(&self, id: Uuid) -> CommandRow {
        self.commands
            .lock()
            .await
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .expect("command not found")
    }

    fn check_queries(&self) -> Result<()> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(Error::Internal("store unreachable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for FakeStore {
    async fn eligible_models(&self, server_id: Uuid) -> Result<Vec<AiModel>> {
        self.check_queries()?;
        Ok(self
            .models
            .lock()
            .await
            .iter()
            .filter(|m| m.is_active && m.server_id == Some(server_id) && m.model_path.is_some())
            .cloned()
            .collect())
    }

    async fn assignments_for_models(&self, model_ids: &[Uuid]) -> Result<Vec<Assignment>> {
        self.check_queries()?;
        Ok(self
            .assignments
            .lock()
            .await
            .iter()
            .filter(|a| model_ids.contains(&a.model_id))
            .cloned()
            .collect())
    }

    async fn cameras_by_ids(&self, camera_ids: &[Uuid]) -> Result<Vec<Camera>> {
        self.check_queries()?;
        Ok(self
            .cameras
            .lock()
            .await
            .iter()
            .filter(|c| camera_ids.contains(&c.id))
            .cloned()
            .collect())
    }

    async fn insert_event(&self, event: &NewDetectionEvent) -> Result<()> {
        self.events.lock().await.push(event.clone());
        Ok(())
    }

    async fn pending_commands(&self) -> Result<Vec<CommandRow>> {
        self.check_queries()?;
        Ok(self
            .commands
            .lock()
            .await
            .iter()
            .filter(|c| c.status == CommandStatus::Pending)
            .cloned()
            .collect())
    }

    async fn claim_command(&self, id: Uuid) -> Result<bool> {
        let mut commands = self.commands.lock().await;
        match commands
            .iter_mut()
            .find(|c| c.id == id && c.status == CommandStatus::Pending)
        {
            Some(cmd) => {
                cmd.status = CommandStatus::Processing;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn finalize_command(&self, id: Uuid, status: CommandStatus, result: &str) -> Result<()> {
        let mut commands = self.commands.lock().await;
        if let Some(cmd) = commands.iter_mut().find(|c| c.id == id) {
            cmd.status = status;
            cmd.result = Some(result.to_string());
        }
        Ok(())
    }

    async fn fetch_settings(&self) -> Result<SystemSettings> {
        if self.fail_settings.load(Ordering::SeqCst) {
            return Err(Error::Internal("store unreachable".to_string()));
        }
        self.settings_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.settings.lock().await.clone())
    }

    async fn upsert_server(&self, server: &ServerRecord) -> Result<()> {
        let mut servers = self.servers.lock().await;
        servers.retain(|s| s.id != server.id);
        servers.push(server.clone());
        Ok(())
    }

    async fn touch_server(&self, _id: Uuid, _status: &str) -> Result<()> {
        self.heartbeats.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Object store / notifier
// ---------------------------------------------------------------------------

pub struct FakeObjectStore {
    pub uploads: Mutex<Vec<(String, String)>>,
    fail: AtomicBool,
}

impl FakeObjectStore {
    pub fn new() -> Self {
        Self {
            uploads: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        }
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStore for FakeObjectStore {
    async fn upload(&self, bucket: &str, key: &str, _bytes: Vec<u8>, _content_type: &str)
        -> Result<()>
    {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::ObjectStore("upload refused".to_string()));
        }
        self.uploads
            .lock()
            .await
            .push((bucket.to_string(), key.to_string()));
        Ok(())
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        format!("http://objects.local/{}/{}", bucket, key)
    }
}

pub struct FakeNotifier {
    emails: AtomicUsize,
    smses: AtomicUsize,
    fail_email: AtomicBool,
    pub last_email: Mutex<Option<(SystemSettings, EventSummary)>>,
}

impl FakeNotifier {
    pub fn new() -> Self {
        Self {
            emails: AtomicUsize::new(0),
            smses: AtomicUsize::new(0),
            fail_email: AtomicBool::new(false),
            last_email: Mutex::new(None),
        }
    }

    pub fn email_count(&self) -> usize {
        self.emails.load(Ordering::SeqCst)
    }

    pub fn sms_count(&self) -> usize {
        self.smses.load(Ordering::SeqCst)
    }

    pub fn fail_email(&self, fail: bool) {
        self.fail_email.store(fail, Ordering::SeqCst);
    }

    pub async fn wait_for_email(&self) {
        for _ in 0..1000 {
            if self.email_count() > 0 {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("no email dispatched");
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn send_email(&self, settings: &SystemSettings, summary: &EventSummary) -> Result<()> {
        self.emails.fetch_add(1, Ordering::SeqCst);
        *self.last_email.lock().await = Some((settings.clone(), summary.clone()));
        if self.fail_email.load(Ordering::SeqCst) {
            return Err(Error::Notify("smtp refused".to_string()));
        }
        Ok(())
    }

    async fn send_sms(&self, _settings: &SystemSettings, _summary: &EventSummary) -> Result<()> {
        self.smses.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Frame source / detector / recorder
// ---------------------------------------------------------------------------

/// One scripted read result
pub struct ScriptItem {
    pub delay: Duration,
    /// None means a read error (worker should reconnect)
    pub frame: Option<Vec<u8>>,
}

impl ScriptItem {
    pub fn frame() -> Self {
        Self {
            delay: Duration::ZERO,
            frame: Some(vec![0xFF, 0xD8]),
        }
    }

    pub fn frame_after(delay: Duration) -> Self {
        Self {
            delay,
            frame: Some(vec![0xFF, 0xD8]),
        }
    }

    pub fn error() -> Self {
        Self {
            delay: Duration::ZERO,
            frame: None,
        }
    }
}

/// Frame source replaying a script; reads past the end block forever
pub struct ScriptedFrameSource {
    items: Arc<Mutex<VecDeque<ScriptItem>>>,
    pub opens: Arc<AtomicUsize>,
    fail_opens: AtomicUsize,
    pub released: Arc<AtomicBool>,
}

impl ScriptedFrameSource {
    pub fn new(items: Vec<ScriptItem>) -> Self {
        Self {
            items: Arc::new(Mutex::new(items.into())),
            opens: Arc::new(AtomicUsize::new(0)),
            fail_opens: AtomicUsize::new(0),
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Fail the first n open() calls
    pub fn fail_first_opens(&self, n: usize) {
        self.fail_opens.store(n, Ordering::SeqCst);
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn was_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FrameSource for ScriptedFrameSource {
    async fn open(&self, _stream_url: &str) -> Result<Box<dyn FrameStream>> {
        self.opens.fetch_add(1, Ordering::SeqCst);

        let remaining = self.fail_opens.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_opens.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::Stream("connect refused".to_string()));
        }

        self.released.store(false, Ordering::SeqCst);
        Ok(Box::new(ScriptedStream {
            items: self.items.clone(),
            released: self.released.clone(),
        }))
    }
}

struct ScriptedStream {
    items: Arc<Mutex<VecDeque<ScriptItem>>>,
    released: Arc<AtomicBool>,
}

#[async_trait]
impl FrameStream for ScriptedStream {
    async fn read_frame(&mut self) -> Result<Frame> {
        let item = self.items.lock().await.pop_front();
        match item {
            Some(item) => {
                if !item.delay.is_zero() {
                    tokio::time::sleep(item.delay).await;
                }
                match item.frame {
                    Some(data) => Ok(Frame {
                        data,
                        captured_at: Utc::now(),
                    }),
                    None => Err(Error::Stream("read failed".to_string())),
                }
            }
            // Script exhausted: emulate a stream with nothing more to say
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

/// Detector replaying scripted responses; empty script -> no detections
pub struct StubDetector {
    responses: Mutex<VecDeque<Vec<Detection>>>,
    pub infer_count: AtomicUsize,
}

impl StubDetector {
    pub fn new(responses: Vec<Vec<Detection>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            infer_count: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Detector for StubDetector {
    async fn infer(&self, _frame: &Frame) -> Result<Vec<Detection>> {
        self.infer_count.fetch_add(1, Ordering::SeqCst);
        Ok(self.responses.lock().await.pop_front().unwrap_or_default())
    }
}

pub struct StubLoader {
    detector: Arc<StubDetector>,
    fail: AtomicBool,
    pub loads: AtomicUsize,
}

impl StubLoader {
    pub fn new(detector: Arc<StubDetector>) -> Self {
        Self {
            detector,
            fail: AtomicBool::new(false),
            loads: AtomicUsize::new(0),
        }
    }

    pub fn fail_loads(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl DetectorLoader for StubLoader {
    async fn load(&self, model_path: &str) -> Result<Arc<dyn Detector>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::ModelLoad(format!("missing artifact: {}", model_path)));
        }
        Ok(self.detector.clone())
    }
}

/// Recorder collecting candidates instead of persisting them
pub struct CollectingRecorder {
    pub recorded: Mutex<Vec<EventCandidate>>,
    fail: AtomicBool,
}

impl CollectingRecorder {
    pub fn new() -> Self {
        Self {
            recorded: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        }
    }

    pub fn fail_records(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub async fn count(&self) -> usize {
        self.recorded.lock().await.len()
    }
}

#[async_trait]
impl EventRecorder for CollectingRecorder {
    async fn record(&self, candidate: EventCandidate) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Internal("sink down".to_string()));
        }
        self.recorded.lock().await.push(candidate);
        Ok(())
    }
}
