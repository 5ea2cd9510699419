//! File / FIFO sink transport
//!
//! Copies each stream to the configured output path (or discards it) on a
//! background task. Pausing stops reading from the stream, so backpressure
//! propagates through the decode pipeline. Volume is recorded only; it
//! cannot be applied to already-encoded Opus frames.

use super::{TransportError, TransportEvent, VoiceTransport};
use crate::playback::pipeline::AudioStream;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

const COPY_CHUNK_BYTES: usize = 16 * 1024;

struct ActiveStream {
    stream_id: Uuid,
    paused: watch::Sender<bool>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

pub struct SinkTransport {
    output: Option<PathBuf>,
    events: mpsc::UnboundedSender<TransportEvent>,
    connected: AtomicBool,
    volume: StdMutex<f32>,
    active: Mutex<Option<ActiveStream>>,
}

impl SinkTransport {
    /// Create a transport and the receiver for its events
    pub fn new(output: Option<PathBuf>) -> (Arc<Self>, mpsc::UnboundedReceiver<TransportEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            output,
            events: tx,
            connected: AtomicBool::new(false),
            volume: StdMutex::new(1.0),
            active: Mutex::new(None),
        });
        (transport, rx)
    }

    pub fn volume(&self) -> f32 {
        self.volume.lock().map(|v| *v).unwrap_or(1.0)
    }

    /// Id of the stream currently owned by the sink
    pub async fn active_stream(&self) -> Option<Uuid> {
        self.active.lock().await.as_ref().map(|a| a.stream_id)
    }

    async fn open_writer(&self) -> Result<Box<dyn AsyncWrite + Send + Unpin>, TransportError> {
        match &self.output {
            Some(path) => {
                let file = tokio::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .await
                    .map_err(|e| {
                        TransportError::Stream(format!("cannot open {}: {}", path.display(), e))
                    })?;
                Ok(Box::new(file))
            }
            None => Ok(Box::new(tokio::io::sink())),
        }
    }

    async fn stop_active(&self) {
        let active = self.active.lock().await.take();
        if let Some(active) = active {
            active.cancel.cancel();
            if let Err(e) = active.task.await {
                warn!(stream = %active.stream_id, "Sink task ended abnormally: {}", e);
            }
            debug!(stream = %active.stream_id, "Sink stream stopped");
        }
    }
}

async fn pump(
    mut stream: AudioStream,
    mut writer: Box<dyn AsyncWrite + Send + Unpin>,
    mut paused: watch::Receiver<bool>,
    cancel: CancellationToken,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    let stream_id = stream.id();
    let mut buf = vec![0u8; COPY_CHUNK_BYTES];
    let _ = events.send(TransportEvent::Playing { stream_id });

    loop {
        while *paused.borrow_and_update() {
            tokio::select! {
                _ = cancel.cancelled() => return,
                changed = paused.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
            }
        }

        let read = tokio::select! {
            _ = cancel.cancelled() => return,
            read = stream.read(&mut buf) => read,
        };

        let n = match read {
            Ok(n) => n,
            Err(e) => {
                let _ = events.send(TransportEvent::Error {
                    stream_id,
                    message: e.to_string(),
                });
                return;
            }
        };

        if n == 0 {
            if let Err(e) = writer.flush().await {
                debug!(stream = %stream_id, "Flush at end of stream failed: {}", e);
            }
            let _ = events.send(TransportEvent::Idle { stream_id });
            return;
        }

        let written = tokio::select! {
            _ = cancel.cancelled() => return,
            written = writer.write_all(&buf[..n]) => written,
        };
        if let Err(e) = written {
            let _ = events.send(TransportEvent::Error {
                stream_id,
                message: e.to_string(),
            });
            return;
        }
    }
}

#[async_trait]
impl VoiceTransport for SinkTransport {
    async fn connect(&self, channel_id: Option<&str>) -> Result<(), TransportError> {
        self.connected.store(true, Ordering::SeqCst);
        info!(
            channel = channel_id.unwrap_or("default"),
            output = ?self.output,
            "Sink transport connected"
        );
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn play(&self, stream: AudioStream) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        self.stop_active().await;

        let writer = self.open_writer().await?;
        let stream_id = stream.id();
        let (paused_tx, paused_rx) = watch::channel(false);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(pump(
            stream,
            writer,
            paused_rx,
            cancel.clone(),
            self.events.clone(),
        ));

        *self.active.lock().await = Some(ActiveStream {
            stream_id,
            paused: paused_tx,
            cancel,
            task,
        });
        Ok(())
    }

    async fn pause(&self) -> bool {
        let active = self.active.lock().await;
        match active.as_ref() {
            Some(a) if !a.task.is_finished() && !*a.paused.borrow() => {
                let _ = a.paused.send(true);
                let _ = self.events.send(TransportEvent::Paused {
                    stream_id: a.stream_id,
                });
                true
            }
            _ => false,
        }
    }

    async fn unpause(&self) -> bool {
        let active = self.active.lock().await;
        match active.as_ref() {
            Some(a) if *a.paused.borrow() => {
                let _ = a.paused.send(false);
                let _ = self.events.send(TransportEvent::Playing {
                    stream_id: a.stream_id,
                });
                true
            }
            _ => false,
        }
    }

    async fn stop(&self) {
        self.stop_active().await;
    }

    async fn set_volume(&self, volume: f32) {
        if let Ok(mut v) = self.volume.lock() {
            *v = volume.clamp(0.0, 2.0);
        }
    }

    async fn await_reconnect(&self, _grace: Duration) -> bool {
        // A local sink has no signalling to wait for
        self.is_connected()
    }

    async fn disconnect(&self) {
        self.stop_active().await;
        self.connected.store(false, Ordering::SeqCst);
        info!("Sink transport disconnected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<TransportEvent>) -> TransportEvent {
        timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for transport event")
            .expect("event channel closed")
    }

    #[tokio::test]
    async fn test_play_requires_connection() {
        let (sink, _rx) = SinkTransport::new(None);
        let stream = AudioStream::from_bytes(Uuid::new_v4(), vec![1, 2, 3]);
        assert!(matches!(
            sink.play(stream).await,
            Err(TransportError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_stream_copied_to_file_then_idle() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("out.opus");
        let (sink, mut rx) = SinkTransport::new(Some(path.clone()));
        sink.connect(None).await.unwrap();

        let id = Uuid::new_v4();
        sink.play(AudioStream::from_bytes(id, b"OggS-data".to_vec()))
            .await
            .unwrap();

        assert_eq!(next_event(&mut rx).await, TransportEvent::Playing { stream_id: id });
        assert_eq!(next_event(&mut rx).await, TransportEvent::Idle { stream_id: id });
        assert_eq!(std::fs::read(&path).unwrap(), b"OggS-data");
    }

    #[tokio::test]
    async fn test_pause_and_unpause_emit_events() {
        let (sink, mut rx) = SinkTransport::new(None);
        sink.connect(Some("voice-1")).await.unwrap();

        // A reader that never finishes
        let (_keep_open, reader) = tokio::io::duplex(64);
        let id = Uuid::new_v4();
        sink.play(AudioStream::new(id, Box::pin(reader))).await.unwrap();
        assert_eq!(next_event(&mut rx).await, TransportEvent::Playing { stream_id: id });

        assert!(sink.pause().await);
        assert!(!sink.pause().await);
        assert_eq!(next_event(&mut rx).await, TransportEvent::Paused { stream_id: id });

        assert!(sink.unpause().await);
        assert!(!sink.unpause().await);
        assert_eq!(next_event(&mut rx).await, TransportEvent::Playing { stream_id: id });

        sink.stop().await;
        assert_eq!(sink.active_stream().await, None);
        // Explicit stop is silent
        assert!(timeout(Duration::from_millis(100), rx.recv()).await.is_err());
    }

    #[tokio::test]
    async fn test_play_replaces_previous_stream() {
        let (sink, mut rx) = SinkTransport::new(None);
        sink.connect(None).await.unwrap();

        let (_first_open, first_reader) = tokio::io::duplex(64);
        let first = Uuid::new_v4();
        sink.play(AudioStream::new(first, Box::pin(first_reader))).await.unwrap();
        assert_eq!(next_event(&mut rx).await, TransportEvent::Playing { stream_id: first });

        let second = Uuid::new_v4();
        sink.play(AudioStream::from_bytes(second, vec![0; 10])).await.unwrap();
        assert_eq!(next_event(&mut rx).await, TransportEvent::Playing { stream_id: second });
        assert_eq!(next_event(&mut rx).await, TransportEvent::Idle { stream_id: second });
    }

    #[tokio::test]
    async fn test_volume_clamped_and_disconnect() {
        let (sink, _rx) = SinkTransport::new(None);
        sink.connect(None).await.unwrap();
        sink.set_volume(3.5).await;
        assert_eq!(sink.volume(), 2.0);
        assert!(sink.await_reconnect(Duration::from_millis(1)).await);

        sink.disconnect().await;
        assert!(!sink.is_connected());
        assert!(!sink.await_reconnect(Duration::from_millis(1)).await);
    }
}
