// Test doubles shared across the integration tests: a scripted transport
// standing in for the realtime connection, channel-backed capture backends,
// and playback sinks with controllable timing. No audio hardware or network
// is touched anywhere in the suite.

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use prepvoice::audio::{CaptureBackend, PlaybackSink};
use prepvoice::realtime::{ClientEvent, EventTransport, TransportEvent};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};

/// Observable side of a scripted transport: what was sent and how many
/// times close ran.
#[derive(Clone, Default)]
pub struct TransportLog {
    pub sent: Arc<Mutex<Vec<ClientEvent>>>,
    pub close_calls: Arc<AtomicUsize>,
}

impl TransportLog {
    pub fn sent_events(&self) -> Vec<ClientEvent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn cancel_count(&self) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e, ClientEvent::CancelResponse))
            .count()
    }

    pub fn close_count(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

/// Transport fed from a channel of pre-scripted provider events.
pub struct ScriptedTransport {
    inbound: mpsc::UnboundedReceiver<TransportEvent>,
    log: TransportLog,
}

pub fn scripted_transport() -> (
    ScriptedTransport,
    mpsc::UnboundedSender<TransportEvent>,
    TransportLog,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let log = TransportLog::default();
    (
        ScriptedTransport {
            inbound: rx,
            log: log.clone(),
        },
        tx,
        log,
    )
}

#[async_trait::async_trait]
impl EventTransport for ScriptedTransport {
    async fn send(&mut self, event: ClientEvent) -> Result<()> {
        self.log.sent.lock().unwrap().push(event);
        Ok(())
    }

    async fn next_event(&mut self) -> Option<TransportEvent> {
        self.inbound.recv().await
    }

    async fn close(&mut self) -> Result<()> {
        self.log.close_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Capture backend that produces no frames; stop drops the sender so the
/// forwarding task drains out.
pub struct NullCapture {
    tx: Option<mpsc::Sender<Vec<f32>>>,
}

impl NullCapture {
    pub fn new() -> Self {
        Self { tx: None }
    }
}

#[async_trait::async_trait]
impl CaptureBackend for NullCapture {
    async fn start(&mut self) -> Result<mpsc::Receiver<Vec<f32>>> {
        let (tx, rx) = mpsc::channel(8);
        self.tx = Some(tx);
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        self.tx = None;
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.tx.is_some()
    }

    fn name(&self) -> &str {
        "null capture"
    }
}

/// Capture backend whose start fails, as a denied microphone does.
pub struct DeniedCapture;

#[async_trait::async_trait]
impl CaptureBackend for DeniedCapture {
    async fn start(&mut self) -> Result<mpsc::Receiver<Vec<f32>>> {
        Err(anyhow!("permission denied"))
    }

    async fn stop(&mut self) -> Result<()> {
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        "denied capture"
    }
}

/// Sink that completes every chunk immediately.
#[derive(Default)]
pub struct InstantSink {
    pub played: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl PlaybackSink for InstantSink {
    async fn play(&self, _samples: Vec<f32>) -> Result<()> {
        self.played.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {}

    fn name(&self) -> &str {
        "instant sink"
    }
}

/// Sink that holds each chunk "playing" until stop is called, so tests can
/// observe mid-playback state.
#[derive(Default)]
pub struct BlockingSink {
    release: Notify,
    pub plays_started: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl PlaybackSink for BlockingSink {
    async fn play(&self, _samples: Vec<f32>) -> Result<()> {
        self.plays_started.fetch_add(1, Ordering::SeqCst);
        self.release.notified().await;
        Ok(())
    }

    fn stop(&self) {
        self.release.notify_one();
    }

    fn name(&self) -> &str {
        "blocking sink"
    }
}

/// Poll a condition until it holds or the timeout elapses.
pub async fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return cond();
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
