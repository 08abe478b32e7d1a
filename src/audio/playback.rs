use anyhow::{anyhow, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleRate, StreamConfig};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::pcm;

/// Speech playback sink trait.
///
/// `play` resolves when the chunk has been played to completion or after
/// `stop` cancels it. `stop` is idempotent and safe from any thread.
#[async_trait::async_trait]
pub trait PlaybackSink: Send + Sync {
    /// Play one chunk of normalized samples to completion
    async fn play(&self, samples: Vec<f32>) -> Result<()>;

    /// Cancel the chunk currently playing, if any
    fn stop(&self);

    /// Get sink name for logging
    fn name(&self) -> &str;
}

fn recover<'a, T>(lock: &'a Mutex<T>) -> MutexGuard<'a, T> {
    lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct QueueShared {
    chunks: Mutex<VecDeque<Vec<f32>>>,
    wakeup: Notify,
    bot_speaking: Arc<AtomicBool>,
    shutdown: AtomicBool,
    sink: Arc<dyn PlaybackSink>,
}

/// FIFO of synthesized speech chunks with a single sequential playback task.
///
/// Provider audio deltas arrive in bursts faster than real-time playback, so
/// chunks queue here and play strictly in order. The bot-speaking flag is
/// held true while a chunk is playing and cleared when the queue drains or
/// playback is interrupted.
#[derive(Clone)]
pub struct PlaybackQueue {
    shared: Arc<QueueShared>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl PlaybackQueue {
    /// Create the queue and spawn its playback task.
    pub fn new(sink: Arc<dyn PlaybackSink>, bot_speaking: Arc<AtomicBool>) -> Self {
        let shared = Arc::new(QueueShared {
            chunks: Mutex::new(VecDeque::new()),
            wakeup: Notify::new(),
            bot_speaking,
            shutdown: AtomicBool::new(false),
            sink,
        });

        let task_shared = Arc::clone(&shared);
        let task = tokio::spawn(async move {
            Self::run(task_shared).await;
        });

        Self {
            shared,
            task: Arc::new(Mutex::new(Some(task))),
        }
    }

    async fn run(shared: Arc<QueueShared>) {
        loop {
            if shared.shutdown.load(Ordering::SeqCst) {
                break;
            }

            let chunk = recover(&shared.chunks).pop_front();

            match chunk {
                Some(samples) => {
                    shared.bot_speaking.store(true, Ordering::SeqCst);
                    if let Err(e) = shared.sink.play(samples).await {
                        warn!("Playback error: {}", e);
                    }
                    if recover(&shared.chunks).is_empty() {
                        shared.bot_speaking.store(false, Ordering::SeqCst);
                    }
                }
                None => {
                    shared.bot_speaking.store(false, Ordering::SeqCst);
                    shared.wakeup.notified().await;
                }
            }
        }

        debug!("Playback task stopped");
    }

    /// Queue one decoded chunk for sequential playback.
    pub fn enqueue(&self, samples: Vec<f32>) {
        recover(&self.shared.chunks).push_back(samples);
        self.shared.wakeup.notify_one();
    }

    /// Interrupt playback: stop the in-flight chunk, discard everything
    /// queued behind it, and clear the bot-speaking flag. Does not yield.
    pub fn interrupt(&self) {
        recover(&self.shared.chunks).clear();
        self.shared.sink.stop();
        self.shared.bot_speaking.store(false, Ordering::SeqCst);
    }

    /// Number of chunks waiting behind the one currently playing.
    pub fn queue_depth(&self) -> usize {
        recover(&self.shared.chunks).len()
    }

    /// Stop the playback task and release the sink. Idempotent.
    pub async fn shutdown(&self) {
        self.shared.shutdown.store(true, Ordering::SeqCst);
        self.interrupt();
        self.shared.wakeup.notify_one();

        let task = recover(&self.task).take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!("Playback task panicked: {}", e);
            }
        }
    }
}

struct SinkShared {
    pending: Mutex<VecDeque<f32>>,
    drained: Notify,
    cancelled: AtomicBool,
    closed: AtomicBool,
}

/// Speaker output on top of cpal.
///
/// As with capture, the cpal stream is not `Send` and lives on its own
/// thread; the device callback drains a shared sample queue, zero-filling
/// when it runs dry, and signals the waiting `play` call once the queue
/// empties.
pub struct CpalPlaybackSink {
    shared: Arc<SinkShared>,
}

impl CpalPlaybackSink {
    pub fn new() -> Result<Self> {
        let shared = Arc::new(SinkShared {
            pending: Mutex::new(VecDeque::new()),
            drained: Notify::new(),
            cancelled: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        });

        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<()>>();
        let thread_shared = Arc::clone(&shared);

        std::thread::spawn(move || {
            let host = cpal::default_host();
            let device = match host.default_output_device() {
                Some(d) => d,
                None => {
                    let _ = ready_tx.send(Err(anyhow!("no default output device available")));
                    return;
                }
            };

            let config = StreamConfig {
                channels: pcm::CHANNELS,
                sample_rate: SampleRate(pcm::SAMPLE_RATE),
                buffer_size: BufferSize::Default,
            };

            let callback_shared = Arc::clone(&thread_shared);
            let stream = device.build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut pending = recover(&callback_shared.pending);
                    let had_samples = !pending.is_empty();
                    for slot in data.iter_mut() {
                        *slot = pending.pop_front().unwrap_or(0.0);
                    }
                    if had_samples && pending.is_empty() {
                        callback_shared.drained.notify_one();
                    }
                },
                |err| warn!("Speaker stream error: {}", err),
                None,
            );

            let stream = match stream {
                Ok(s) => s,
                Err(e) => {
                    let _ = ready_tx.send(Err(anyhow!("failed to open speaker stream: {}", e)));
                    return;
                }
            };

            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(anyhow!("failed to start speaker stream: {}", e)));
                return;
            }

            let _ = ready_tx.send(Ok(()));

            while !thread_shared.closed.load(Ordering::SeqCst) {
                std::thread::sleep(std::time::Duration::from_millis(50));
            }

            drop(stream);
        });

        ready_rx
            .recv_timeout(std::time::Duration::from_secs(5))
            .map_err(|_| anyhow!("speaker thread exited before reporting readiness"))??;

        info!("Speaker playback started ({} Hz mono)", pcm::SAMPLE_RATE);

        Ok(Self { shared })
    }
}

#[async_trait::async_trait]
impl PlaybackSink for CpalPlaybackSink {
    async fn play(&self, samples: Vec<f32>) -> Result<()> {
        self.shared.cancelled.store(false, Ordering::SeqCst);
        recover(&self.shared.pending).extend(samples);

        loop {
            if self.shared.cancelled.load(Ordering::SeqCst) {
                break;
            }
            if recover(&self.shared.pending).is_empty() {
                break;
            }
            self.shared.drained.notified().await;
        }

        Ok(())
    }

    fn stop(&self) {
        self.shared.cancelled.store(true, Ordering::SeqCst);
        recover(&self.shared.pending).clear();
        self.shared.drained.notify_one();
    }

    fn name(&self) -> &str {
        "cpal speaker"
    }
}

impl Drop for CpalPlaybackSink {
    fn drop(&mut self) {
        self.shared.closed.store(true, Ordering::SeqCst);
        self.stop();
    }
}
