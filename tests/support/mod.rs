// Shared fakes for integration tests
//
// FakePlatform stands in for the host capture services. Every call made on
// the platform, its projections, recorders and displays is appended to a
// shared log so tests can assert on ordering.

#![allow(dead_code)]

use anyhow::{bail, Result};
use screen_insight::capture::{
    AudioSource, CaptureGrant, CapturePlatform, Projection, ScreenRecorder, VideoProfile,
    VirtualDisplay,
};
use screen_insight::config::GeminiConfig;
use screen_insight::{AiConfig, FileUploader, GeminiHttp, InferenceClient, PollPolicy};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TEST_API_KEY: &str = "test-key";
pub const TEST_MODEL: &str = "gemini-2.5-flash";

/// Which host calls should fail
#[derive(Debug, Clone, Default)]
pub struct Failures {
    pub foreground: bool,
    pub projection: bool,
    /// Audio sources the recorder rejects
    pub rejected_audio: Vec<AudioSource>,
    pub create_display: bool,
    pub start: bool,
    pub stop_recorder: bool,
    pub release_display: bool,
}

impl Failures {
    pub fn no_audio() -> Self {
        Self {
            rejected_audio: AudioSource::PRIORITY.to_vec(),
            ..Self::default()
        }
    }
}

pub type CallLog = Arc<Mutex<Vec<String>>>;

/// Callback run inside `ScreenRecorder::stop`, while teardown is in progress
pub type StopHook = Arc<Mutex<Option<Box<dyn Fn() + Send + Sync>>>>;

fn log(calls: &CallLog, entry: impl Into<String>) {
    calls.lock().unwrap().push(entry.into());
}

pub struct FakePlatform {
    failures: Failures,
    calls: CallLog,
    stop_hook: StopHook,
}

impl FakePlatform {
    pub fn new(failures: Failures) -> Arc<Self> {
        Arc::new(Self {
            failures,
            calls: CallLog::default(),
            stop_hook: StopHook::default(),
        })
    }

    pub fn on_recorder_stop(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.stop_hook.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn called(&self, entry: &str) -> bool {
        self.calls().iter().any(|c| c == entry)
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }
}

impl CapturePlatform for FakePlatform {
    fn enter_foreground(&self) -> Result<()> {
        log(&self.calls, "enter_foreground");
        if self.failures.foreground {
            bail!("foreground service refused");
        }
        Ok(())
    }

    fn exit_foreground(&self) -> Result<()> {
        log(&self.calls, "exit_foreground");
        Ok(())
    }

    fn open_projection(&self, grant: CaptureGrant) -> Result<Box<dyn Projection>> {
        log(&self.calls, format!("open_projection:{}", grant.token()));
        if self.failures.projection {
            bail!("grant rejected");
        }
        Ok(Box::new(FakeProjection {
            failures: self.failures.clone(),
            calls: self.calls.clone(),
        }))
    }

    fn create_recorder(&self) -> Result<Box<dyn ScreenRecorder>> {
        log(&self.calls, "create_recorder");
        Ok(Box::new(FakeRecorder {
            failures: self.failures.clone(),
            calls: self.calls.clone(),
            stop_hook: self.stop_hook.clone(),
            output: None,
        }))
    }
}

struct FakeProjection {
    failures: Failures,
    calls: CallLog,
}

impl Projection for FakeProjection {
    fn create_display(
        &mut self,
        profile: &VideoProfile,
        _recorder: &mut dyn ScreenRecorder,
    ) -> Result<Box<dyn VirtualDisplay>> {
        log(
            &self.calls,
            format!("create_display:{}x{}", profile.width, profile.height),
        );
        if self.failures.create_display {
            bail!("display surface unavailable");
        }
        Ok(Box::new(FakeDisplay {
            failures: self.failures.clone(),
            calls: self.calls.clone(),
        }))
    }

    fn stop(&mut self) -> Result<()> {
        log(&self.calls, "stop_projection");
        Ok(())
    }
}

struct FakeDisplay {
    failures: Failures,
    calls: CallLog,
}

impl VirtualDisplay for FakeDisplay {
    fn release(&mut self) -> Result<()> {
        log(&self.calls, "release_display");
        if self.failures.release_display {
            bail!("display already gone");
        }
        Ok(())
    }
}

/// Recorder that writes a few bytes to its output file on start
struct FakeRecorder {
    failures: Failures,
    calls: CallLog,
    stop_hook: StopHook,
    output: Option<PathBuf>,
}

impl ScreenRecorder for FakeRecorder {
    fn set_audio_source(&mut self, source: AudioSource) -> Result<()> {
        log(&self.calls, format!("set_audio_source:{}", source));
        if self.failures.rejected_audio.contains(&source) {
            bail!("audio source {} not supported", source);
        }
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        log(&self.calls, "reset");
        Ok(())
    }

    fn configure(&mut self, output: &Path, _profile: &VideoProfile, with_audio: bool) -> Result<()> {
        log(&self.calls, format!("configure:audio={}", with_audio));
        self.output = Some(output.to_path_buf());
        Ok(())
    }

    fn prepare(&mut self) -> Result<()> {
        log(&self.calls, "prepare");
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        log(&self.calls, "start");
        if self.failures.start {
            bail!("recorder failed to start");
        }
        if let Some(output) = &self.output {
            std::fs::write(output, b"fake mp4 data")?;
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        log(&self.calls, "stop_recorder");
        if let Some(hook) = self.stop_hook.lock().unwrap().as_ref() {
            hook();
        }
        if self.failures.stop_recorder {
            bail!("stop called in invalid state");
        }
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        log(&self.calls, "release_recorder");
        Ok(())
    }

    fn name(&self) -> &str {
        "fake"
    }
}

// ============================================================================
// Gemini mock server helpers
// ============================================================================

pub fn ai_config() -> AiConfig {
    AiConfig {
        api_key: TEST_API_KEY.to_string(),
        model: TEST_MODEL.to_string(),
        ..AiConfig::default()
    }
}

/// Client pointed at `server`, polling every few milliseconds
pub fn inference_client(server: &MockServer) -> InferenceClient {
    let config = GeminiConfig::with_root(&server.uri());
    let http = GeminiHttp::new(&config).unwrap();
    let uploader = FileUploader::new(
        http.clone(),
        PollPolicy {
            interval: Duration::from_millis(5),
            max_attempts: config.max_poll_attempts,
        },
    );
    InferenceClient::new(http, uploader)
}

pub fn file_uri(server: &MockServer, id: &str) -> String {
    format!("{}/v1beta/files/{}", server.uri(), id)
}

/// Accept a resumable upload and assign it file id `id`
pub async fn mount_upload(server: &MockServer, id: &str) {
    let session_url = format!("{}/upload-session/{}", server.uri(), id);

    Mock::given(method("POST"))
        .and(path("/upload/v1beta/files"))
        .and(header("X-Goog-Upload-Command", "start"))
        .and(header("x-goog-api-key", TEST_API_KEY))
        .respond_with(ResponseTemplate::new(200).insert_header("X-Goog-Upload-URL", session_url))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path(format!("/upload-session/{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "file": { "uri": file_uri(server, id), "state": "PROCESSING" }
        })))
        .mount(server)
        .await;
}

pub async fn mount_file_state(server: &MockServer, id: &str, state: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/v1beta/files/{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": format!("files/{}", id),
            "state": state
        })))
        .mount(server)
        .await;
}

pub fn generate_path() -> String {
    format!("/v1beta/models/{}:generateContent", TEST_MODEL)
}

pub fn candidate_body(text: &str) -> serde_json::Value {
    serde_json::json!({
        "candidates": [
            { "content": { "parts": [ { "text": text } ], "role": "model" } }
        ]
    })
}

pub async fn mount_generate(server: &MockServer, text: &str) {
    Mock::given(method("POST"))
        .and(path(generate_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(candidate_body(text)))
        .mount(server)
        .await;
}
