use anyhow::{anyhow, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleRate, StreamConfig};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use super::pcm;

/// Microphone capture backend trait.
///
/// Implementations deliver fixed-rate float frames over a channel; the
/// consumer decides what to do with them. Tests substitute a channel-backed
/// double so no audio hardware is required.
#[async_trait::async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Start capturing audio.
    ///
    /// Returns a channel receiver that will receive capture frames
    async fn start(&mut self) -> Result<mpsc::Receiver<Vec<f32>>>;

    /// Stop capturing audio
    async fn stop(&mut self) -> Result<()>;

    /// Check if backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Microphone backend on top of cpal.
///
/// cpal streams are not `Send`, so the stream lives on a dedicated thread
/// for the duration of the capture; the device callback forwards frames
/// with `try_send` and drops them when the channel is full. Frames are
/// never queued locally.
pub struct CpalMicBackend {
    stop_flag: Arc<AtomicBool>,
    dropped_frames: Arc<AtomicUsize>,
    thread: Option<std::thread::JoinHandle<()>>,
    capturing: bool,
}

impl CpalMicBackend {
    pub fn new() -> Self {
        Self {
            stop_flag: Arc::new(AtomicBool::new(false)),
            dropped_frames: Arc::new(AtomicUsize::new(0)),
            thread: None,
            capturing: false,
        }
    }
}

impl Default for CpalMicBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CaptureBackend for CpalMicBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<Vec<f32>>> {
        if self.capturing {
            anyhow::bail!("Already capturing");
        }

        let (frame_tx, frame_rx) = mpsc::channel::<Vec<f32>>(32);
        let (ready_tx, ready_rx) = oneshot::channel::<Result<()>>();

        self.stop_flag.store(false, Ordering::SeqCst);
        let stop_flag = Arc::clone(&self.stop_flag);
        let dropped = Arc::clone(&self.dropped_frames);

        let thread = std::thread::spawn(move || {
            let host = cpal::default_host();
            let device = match host.default_input_device() {
                Some(d) => d,
                None => {
                    let _ = ready_tx.send(Err(anyhow!("no default input device available")));
                    return;
                }
            };

            // The provider protocol is fixed at 24 kHz mono, so request it
            // directly from the device rather than resampling locally.
            let config = StreamConfig {
                channels: pcm::CHANNELS,
                sample_rate: SampleRate(pcm::SAMPLE_RATE),
                buffer_size: BufferSize::Default,
            };

            let callback_dropped = Arc::clone(&dropped);
            let stream = device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if frame_tx.try_send(data.to_vec()).is_err() {
                        callback_dropped.fetch_add(1, Ordering::Relaxed);
                    }
                },
                |err| warn!("Microphone stream error: {}", err),
                None,
            );

            let stream = match stream {
                Ok(s) => s,
                Err(e) => {
                    let _ = ready_tx.send(Err(anyhow!("failed to open microphone stream: {}", e)));
                    return;
                }
            };

            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(anyhow!("failed to start microphone stream: {}", e)));
                return;
            }

            let _ = ready_tx.send(Ok(()));

            while !stop_flag.load(Ordering::SeqCst) {
                std::thread::sleep(std::time::Duration::from_millis(50));
            }

            drop(stream);

            let dropped_total = dropped.load(Ordering::Relaxed);
            if dropped_total > 0 {
                warn!("Capture dropped {} frames on a full channel", dropped_total);
            }
        });

        ready_rx
            .await
            .map_err(|_| anyhow!("capture thread exited before reporting readiness"))??;

        self.thread = Some(thread);
        self.capturing = true;

        info!("Microphone capture started ({} Hz mono)", pcm::SAMPLE_RATE);

        Ok(frame_rx)
    }

    async fn stop(&mut self) -> Result<()> {
        if !self.capturing {
            return Ok(());
        }

        self.stop_flag.store(true, Ordering::SeqCst);

        if let Some(thread) = self.thread.take() {
            let _ = tokio::task::spawn_blocking(move || thread.join()).await;
        }

        self.capturing = false;

        info!("Microphone capture stopped");

        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        "cpal microphone"
    }
}
