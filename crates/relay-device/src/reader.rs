//! The device reader.
//!
//! Serial reads block, so the device is owned by a dedicated OS thread that
//! forwards chunks over a bounded channel. The async side sees a
//! [`DeviceStream`]: a stream of [`DeviceEvent`]s that ends with at most one
//! `Err(DeviceError)`.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use futures::Stream;
use relay_core::RawChunk;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, warn};

use crate::errors::DeviceError;
use crate::transport::{Opener, Transport};

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// When and how to reopen the device after a mid-stream failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Reopen at all. When false, the first failure is terminal.
    pub enabled: bool,
    /// Delay before the first attempt.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Give up after this many failed attempts. `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    /// A policy that never reconnects.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Delay before attempt `attempt` (0-based): `base * 2^attempt`, capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base_ms = u64::try_from(self.base_delay.as_millis()).unwrap_or(u64::MAX);
        let max_ms = u64::try_from(self.max_delay.as_millis()).unwrap_or(u64::MAX);
        let exponential = base_ms.saturating_mul(1u64 << attempt.min(31));
        Duration::from_millis(exponential.min(max_ms))
    }

    fn exhausted(&self, failed_attempts: u32) -> bool {
        self.max_attempts.is_some_and(|max| failed_attempts >= max)
    }
}

/// Reader tuning.
#[derive(Clone, Debug)]
pub struct ReaderConfig {
    /// Size of the read buffer; bounds the size of one chunk.
    pub read_buffer_size: usize,
    /// Fail with [`DeviceError::Idle`] when no bytes arrive for this long.
    pub idle_timeout: Option<Duration>,
    /// Chunks buffered between the reader thread and the consumer.
    pub channel_capacity: usize,
    /// Reopen behavior after a mid-stream failure.
    pub reconnect: ReconnectPolicy,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: 1024,
            idle_timeout: None,
            channel_capacity: 64,
            reconnect: ReconnectPolicy::disabled(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Events and state
// ─────────────────────────────────────────────────────────────────────────────

/// Item produced by the reader.
#[derive(Debug)]
pub enum DeviceEvent {
    /// Bytes read from the device.
    Chunk(RawChunk),
    /// The device was reopened after a failure. Anything buffered from the
    /// previous session is stale.
    Reopened {
        /// Session counter; the initial open is session 1.
        session: u64,
    },
}

/// Observable lifecycle of the reader.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReaderState {
    /// Not opened yet.
    Closed,
    /// Opened, no data seen yet.
    Open,
    /// Data is flowing.
    Streaming,
    /// Waiting to reopen after a failure.
    Reconnecting {
        /// 1-based attempt number.
        attempt: u32,
    },
    /// Terminal.
    Failed {
        /// Display form of the error that ended the reader.
        reason: String,
    },
}

impl ReaderState {
    /// Short name for logs and health output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::Streaming => "streaming",
            Self::Reconnecting { .. } => "reconnecting",
            Self::Failed { .. } => "failed",
        }
    }

    /// Whether the reader has stopped for good.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Stream
// ─────────────────────────────────────────────────────────────────────────────

/// Consumer side of a running reader.
///
/// Dropping it stops the reader thread at its next send or timeout.
pub struct DeviceStream {
    inner: ReceiverStream<Result<DeviceEvent, DeviceError>>,
    state: watch::Receiver<ReaderState>,
    path: String,
}

impl DeviceStream {
    /// Subscribe to reader state changes.
    pub fn state(&self) -> watch::Receiver<ReaderState> {
        self.state.clone()
    }

    /// Device path.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Stream for DeviceStream {
    type Item = Result<DeviceEvent, DeviceError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Reader
// ─────────────────────────────────────────────────────────────────────────────

/// Entry point for starting the device thread.
pub struct DeviceReader;

impl DeviceReader {
    /// Open the device and start reading.
    ///
    /// The first open happens on the calling thread so a missing device is
    /// reported here, before anything else starts.
    pub fn start(opener: Arc<dyn Opener>, config: ReaderConfig) -> Result<DeviceStream, DeviceError> {
        let path = opener.path().to_string();
        let (state_tx, state_rx) = watch::channel(ReaderState::Closed);

        let transport = match opener.open() {
            Ok(t) => t,
            Err(e) => {
                error!(path = %path, error = %e, "failed to open device");
                let _ = state_tx.send_replace(ReaderState::Failed {
                    reason: e.to_string(),
                });
                return Err(e);
            }
        };
        let _ = state_tx.send_replace(ReaderState::Open);

        let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
        let worker = Worker {
            opener,
            path: path.clone(),
            config,
            tx,
            state: state_tx,
        };
        let _ = std::thread::Builder::new()
            .name("device-reader".into())
            .spawn(move || worker.run(transport))
            .map_err(|source| DeviceError::Io {
                path: path.clone(),
                source,
            })?;

        Ok(DeviceStream {
            inner: ReceiverStream::new(rx),
            state: state_rx,
            path,
        })
    }
}

enum PumpExit {
    ConsumerGone,
    Failed(DeviceError),
}

enum ReopenOutcome {
    Reopened(Box<dyn Transport>),
    Exhausted(DeviceError),
    ConsumerGone,
}

struct Worker {
    opener: Arc<dyn Opener>,
    path: String,
    config: ReaderConfig,
    tx: mpsc::Sender<Result<DeviceEvent, DeviceError>>,
    state: watch::Sender<ReaderState>,
}

impl Worker {
    fn run(self, mut transport: Box<dyn Transport>) {
        let mut session = 1u64;
        loop {
            let err = match self.pump(transport.as_mut()) {
                PumpExit::ConsumerGone => {
                    debug!(path = %self.path, "device stream dropped, reader exiting");
                    return;
                }
                PumpExit::Failed(e) => e,
            };

            if !self.config.reconnect.enabled {
                self.fail(err);
                return;
            }
            warn!(path = %self.path, error = %err, "device failed, reconnecting");

            match self.reopen(err) {
                ReopenOutcome::Reopened(t) => {
                    transport = t;
                    session += 1;
                    let _ = self.state.send_replace(ReaderState::Open);
                    info!(path = %self.path, session, "device reopened");
                    if self.tx.blocking_send(Ok(DeviceEvent::Reopened { session })).is_err() {
                        return;
                    }
                }
                ReopenOutcome::Exhausted(e) => {
                    self.fail(e);
                    return;
                }
                ReopenOutcome::ConsumerGone => return,
            }
        }
    }

    fn pump(&self, transport: &mut dyn Transport) -> PumpExit {
        let mut buf = vec![0u8; self.config.read_buffer_size.max(1)];
        let mut last_data = Instant::now();
        let mut streaming = false;

        loop {
            match transport.read(&mut buf) {
                Ok(0) => {
                    if self.tx.is_closed() {
                        return PumpExit::ConsumerGone;
                    }
                    if let Some(idle) = self.config.idle_timeout {
                        if last_data.elapsed() >= idle {
                            return PumpExit::Failed(DeviceError::Idle {
                                path: self.path.clone(),
                                idle_ms: u64::try_from(idle.as_millis()).unwrap_or(u64::MAX),
                            });
                        }
                    }
                }
                Ok(n) => {
                    last_data = Instant::now();
                    if !streaming {
                        streaming = true;
                        let _ = self.state.send_replace(ReaderState::Streaming);
                        debug!(path = %self.path, "first bytes received");
                    }
                    let chunk = RawChunk::now(buf[..n].to_vec());
                    if self.tx.blocking_send(Ok(DeviceEvent::Chunk(chunk))).is_err() {
                        return PumpExit::ConsumerGone;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return PumpExit::Failed(DeviceError::from_read(&self.path, e)),
            }
        }
    }

    fn reopen(&self, mut last_error: DeviceError) -> ReopenOutcome {
        let policy = &self.config.reconnect;
        let mut attempt = 0u32;
        loop {
            if policy.exhausted(attempt) {
                return ReopenOutcome::Exhausted(last_error);
            }
            let _ = self.state.send_replace(ReaderState::Reconnecting {
                attempt: attempt + 1,
            });
            std::thread::sleep(policy.delay_for(attempt));
            if self.tx.is_closed() {
                return ReopenOutcome::ConsumerGone;
            }

            match self.opener.open() {
                Ok(t) => return ReopenOutcome::Reopened(t),
                Err(e) => {
                    warn!(path = %self.path, attempt = attempt + 1, error = %e, "reconnect attempt failed");
                    last_error = e;
                }
            }
            attempt += 1;
        }
    }

    fn fail(&self, err: DeviceError) {
        error!(path = %self.path, error = %err, "device reader stopped");
        let _ = self.state.send_replace(ReaderState::Failed {
            reason: err.to_string(),
        });
        let _ = self.tx.blocking_send(Err(err));
    }
}
