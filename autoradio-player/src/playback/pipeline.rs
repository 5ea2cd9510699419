//! Decode pipeline
//!
//! Chains two external processes into one byte stream:
//!
//! ```text
//! fetch (yt-dlp) ──stdout─▶ OS pipe ──stdin─▶ transcode (ffmpeg -af <eq>) ──stdout─▶ AudioStream
//! ```
//!
//! The fetch stage's stdout is handed directly to the transcode stage as its
//! stdin, so backpressure flows through the kernel pipe. Both child handles
//! are owned by a single [`DecodeHandle`]; terminating it kills and reaps
//! both processes.
//!
//! Liveness policy applied by [`ProcessPipeline::launch`]:
//! - first output chunk within the grace period: usable
//! - grace period passes with the transcode stage alive and the fetch stage
//!   not failed: usable
//! - transcode output closes before any chunk: premature exit
//! - fetch stage failed with the transcode stage still alive: keep waiting
//!   for output until the safety timeout, then give up

use crate::playback::equalizer::EqualizerMode;
use async_trait::async_trait;
use std::fmt;
use std::io;
use std::io::Cursor;
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};
use std::task::{Context, Poll};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};
use tokio::process::{Child, ChildStdout, Command};
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Placeholder in fetch arguments replaced by the source URL
pub const URL_PLACEHOLDER: &str = "{url}";

/// Placeholder argument in transcode arguments expanded to `-af <graph>`
pub const FILTERS_PLACEHOLDER: &str = "{filters}";

/// Size of the first read used for liveness detection
const FIRST_CHUNK_BYTES: usize = 8192;

/// Decode pipeline failures; all of them mean "pipeline unusable"
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to start fetch stage: {0}")]
    FetchSpawn(#[source] io::Error),

    #[error("failed to start transcode stage: {0}")]
    TranscodeSpawn(#[source] io::Error),

    #[error("missing {0} pipe")]
    MissingPipe(&'static str),

    #[error("{stage} stage exited before producing audio ({status})")]
    PrematureExit { stage: &'static str, status: String },

    #[error("no audio within {0:?}")]
    SafetyTimeout(Duration),

    #[error("failed to read transcode output: {0}")]
    Read(#[source] io::Error),
}

/// External programs and liveness timeouts
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub fetch_program: String,
    pub fetch_args: Vec<String>,
    pub transcode_program: String,
    pub transcode_args: Vec<String>,
    /// Usable-without-output threshold
    pub grace: Duration,
    /// Give-up threshold when the fetch stage has failed
    pub safety: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let args = |list: &[&str]| list.iter().map(|s| s.to_string()).collect();
        Self {
            fetch_program: "yt-dlp".to_string(),
            fetch_args: args(&[
                "--no-playlist",
                "-f",
                "bestaudio[acodec=opus]/bestaudio/best",
                "--no-check-certificates",
                "--prefer-free-formats",
                "--no-warnings",
                "--quiet",
                "-o",
                "-",
                URL_PLACEHOLDER,
            ]),
            transcode_program: "ffmpeg".to_string(),
            // Opus in Ogg, 48 kHz stereo
            transcode_args: args(&[
                "-i",
                "pipe:0",
                "-analyzeduration",
                "0",
                "-loglevel",
                "0",
                "-acodec",
                "libopus",
                "-f",
                "opus",
                "-ar",
                "48000",
                "-ac",
                "2",
                FILTERS_PLACEHOLDER,
                "pipe:1",
            ]),
            grace: Duration::from_secs(2),
            safety: Duration::from_secs(10),
        }
    }
}

impl PipelineConfig {
    /// Fetch arguments with `{url}` substituted
    pub fn fetch_command_args(&self, url: &str) -> Vec<String> {
        self.fetch_args
            .iter()
            .map(|arg| arg.replace(URL_PLACEHOLDER, url))
            .collect()
    }

    /// Transcode arguments with `{filters}` expanded for the preset
    pub fn transcode_command_args(&self, eq: EqualizerMode) -> Vec<String> {
        let mut out = Vec::with_capacity(self.transcode_args.len() + 1);
        for arg in &self.transcode_args {
            if arg == FILTERS_PLACEHOLDER {
                if let Some(graph) = eq.filter_graph() {
                    out.push("-af".to_string());
                    out.push(graph);
                }
            } else {
                out.push(arg.clone());
            }
        }
        out
    }
}

/// What to decode
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeRequest {
    pub url: String,
    pub eq: EqualizerMode,
}

/// Exclusive owner of the running fetch and transcode processes
pub struct DecodeHandle {
    id: Uuid,
    fetch: Option<Child>,
    transcode: Option<Child>,
}

impl fmt::Debug for DecodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodeHandle")
            .field("id", &self.id)
            .field("fetch_pid", &self.fetch.as_ref().and_then(Child::id))
            .field("transcode_pid", &self.transcode.as_ref().and_then(Child::id))
            .finish()
    }
}

impl DecodeHandle {
    /// Handle with no processes attached (in-process pipelines)
    pub fn detached(id: Uuid) -> Self {
        Self {
            id,
            fetch: None,
            transcode: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    fn stage_status(child: &mut Option<Child>) -> Option<ExitStatus> {
        child.as_mut().and_then(|c| c.try_wait().ok().flatten())
    }

    /// Kill both stages and wait for them to be reaped
    pub async fn terminate(mut self) {
        let stages = [("fetch", self.fetch.take()), ("transcode", self.transcode.take())];
        for (stage, child) in stages {
            let Some(mut child) = child else { continue };
            if let Ok(Some(_)) = child.try_wait() {
                continue;
            }
            if let Err(e) = child.start_kill() {
                debug!(pipeline = %self.id, stage, "Kill failed: {}", e);
            }
            if let Err(e) = child.wait().await {
                warn!(pipeline = %self.id, stage, "Failed to reap process: {}", e);
            }
        }
        debug!(pipeline = %self.id, "Decode pipeline terminated");
    }
}

/// Transport-ready audio bytes tagged with the id of the pipeline producing them
pub struct AudioStream {
    id: Uuid,
    reader: Pin<Box<dyn AsyncRead + Send>>,
}

impl AudioStream {
    pub fn new(id: Uuid, reader: Pin<Box<dyn AsyncRead + Send>>) -> Self {
        Self { id, reader }
    }

    /// In-memory stream
    pub fn from_bytes(id: Uuid, bytes: Vec<u8>) -> Self {
        Self::new(id, Box::pin(Cursor::new(bytes)))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl fmt::Debug for AudioStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioStream").field("id", &self.id).finish()
    }
}

impl AsyncRead for AudioStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        self.reader.as_mut().poll_read(cx, buf)
    }
}

/// A started pipeline: the process owner plus the stream it feeds
#[derive(Debug)]
pub struct DecodeOutput {
    pub handle: DecodeHandle,
    pub stream: AudioStream,
}

/// Something that turns a source URL into a transport-ready stream
#[async_trait]
pub trait AudioPipeline: Send + Sync {
    /// Start decoding and wait until the stream is known to be usable
    async fn launch(&self, request: DecodeRequest) -> Result<DecodeOutput, PipelineError>;
}

/// Decode pipeline backed by two child processes
pub struct ProcessPipeline {
    config: PipelineConfig,
}

impl ProcessPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

fn spawn_stage(
    program: &str,
    args: &[String],
    stdin: Stdio,
) -> io::Result<Child> {
    Command::new(program)
        .args(args)
        .stdin(stdin)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
}

fn describe(status: Option<ExitStatus>) -> String {
    status
        .map(|s| s.to_string())
        .unwrap_or_else(|| "output closed".to_string())
}

/// Apply the liveness policy. Returns the bytes already read, if any.
async fn probe_liveness(
    handle: &mut DecodeHandle,
    stdout: &mut ChildStdout,
    grace: Duration,
    safety: Duration,
) -> Result<Vec<u8>, PipelineError> {
    let started = Instant::now();
    let mut buf = vec![0u8; FIRST_CHUNK_BYTES];

    match timeout(grace, stdout.read(&mut buf)).await {
        Ok(Ok(0)) => {
            let status = DecodeHandle::stage_status(&mut handle.transcode);
            return Err(PipelineError::PrematureExit {
                stage: "transcode",
                status: describe(status),
            });
        }
        Ok(Ok(n)) => {
            buf.truncate(n);
            return Ok(buf);
        }
        Ok(Err(e)) => return Err(PipelineError::Read(e)),
        Err(_) => {}
    }

    if let Some(status) = DecodeHandle::stage_status(&mut handle.transcode) {
        return Err(PipelineError::PrematureExit {
            stage: "transcode",
            status: status.to_string(),
        });
    }

    let fetch_status = DecodeHandle::stage_status(&mut handle.fetch);
    let fetch_failed = matches!(fetch_status, Some(status) if !status.success());
    if !fetch_failed {
        debug!(pipeline = %handle.id, "No output within grace period, processes alive");
        return Ok(Vec::new());
    }

    warn!(
        pipeline = %handle.id,
        status = %describe(fetch_status),
        "Fetch stage failed without output, waiting for safety timeout"
    );
    let remaining = safety.saturating_sub(started.elapsed());
    match timeout(remaining, stdout.read(&mut buf)).await {
        Ok(Ok(0)) => Err(PipelineError::PrematureExit {
            stage: "fetch",
            status: describe(fetch_status),
        }),
        Ok(Ok(n)) => {
            buf.truncate(n);
            Ok(buf)
        }
        Ok(Err(e)) => Err(PipelineError::Read(e)),
        Err(_) => Err(PipelineError::SafetyTimeout(safety)),
    }
}

#[async_trait]
impl AudioPipeline for ProcessPipeline {
    async fn launch(&self, request: DecodeRequest) -> Result<DecodeOutput, PipelineError> {
        let id = Uuid::new_v4();
        let fetch_args = self.config.fetch_command_args(&request.url);
        let transcode_args = self.config.transcode_command_args(request.eq);

        let mut fetch = spawn_stage(&self.config.fetch_program, &fetch_args, Stdio::null())
            .map_err(PipelineError::FetchSpawn)?;

        let fetch_stdout = fetch
            .stdout
            .take()
            .ok_or(PipelineError::MissingPipe("fetch stdout"))?;
        let pipe: Stdio = fetch_stdout.try_into().map_err(PipelineError::Read)?;

        let mut transcode = match spawn_stage(&self.config.transcode_program, &transcode_args, pipe) {
            Ok(child) => child,
            Err(e) => {
                DecodeHandle {
                    id,
                    fetch: Some(fetch),
                    transcode: None,
                }
                .terminate()
                .await;
                return Err(PipelineError::TranscodeSpawn(e));
            }
        };

        let stdout = transcode.stdout.take();
        let mut handle = DecodeHandle {
            id,
            fetch: Some(fetch),
            transcode: Some(transcode),
        };
        let Some(mut stdout) = stdout else {
            handle.terminate().await;
            return Err(PipelineError::MissingPipe("transcode stdout"));
        };

        match probe_liveness(&mut handle, &mut stdout, self.config.grace, self.config.safety).await {
            Ok(prefix) => {
                info!(
                    pipeline = %id,
                    eq = %request.eq,
                    first_chunk = prefix.len(),
                    "Decode pipeline usable"
                );
                let reader = Cursor::new(prefix).chain(stdout);
                Ok(DecodeOutput {
                    handle,
                    stream: AudioStream::new(id, Box::pin(reader)),
                })
            }
            Err(e) => {
                warn!(pipeline = %id, "Decode pipeline unusable: {}", e);
                handle.terminate().await;
                Err(e)
            }
        }
    }
}
