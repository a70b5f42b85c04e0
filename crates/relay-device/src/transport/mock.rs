//! Scripted transports for tests.
//!
//! A [`ScriptedOpener`] hands out one [`ScriptedTransport`] per `open` call,
//! in order. Once the scripts run out, `open` fails.

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::{Opener, Transport};
use crate::errors::DeviceError;

/// One step of a scripted transport.
#[derive(Clone, Debug)]
pub enum Step {
    /// A read returns these bytes.
    Data(Vec<u8>),
    /// A read times out with no data.
    Timeout,
    /// A read fails with this error kind.
    Fail(io::ErrorKind),
}

impl Step {
    /// Shorthand for a text chunk.
    pub fn text(s: &str) -> Self {
        Self::Data(s.as_bytes().to_vec())
    }
}

/// Plays back a fixed list of steps, then reports a hang-up.
pub struct ScriptedTransport {
    steps: VecDeque<Step>,
}

impl ScriptedTransport {
    /// Create from steps.
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
        }
    }
}

impl Transport for ScriptedTransport {
    fn read(&mut self, buffer: &mut [u8]) -> io::Result<usize> {
        match self.steps.pop_front() {
            Some(Step::Data(mut bytes)) => {
                if bytes.len() > buffer.len() {
                    let rest = bytes.split_off(buffer.len());
                    self.steps.push_front(Step::Data(rest));
                }
                buffer[..bytes.len()].copy_from_slice(&bytes);
                Ok(bytes.len())
            }
            Some(Step::Timeout) => {
                std::thread::sleep(std::time::Duration::from_millis(1));
                Ok(0)
            }
            Some(Step::Fail(kind)) => Err(io::Error::from(kind)),
            None => Err(io::Error::from(io::ErrorKind::UnexpectedEof)),
        }
    }
}

/// Hands out scripted transports, one per `open`.
pub struct ScriptedOpener {
    path: String,
    scripts: Mutex<VecDeque<Option<Vec<Step>>>>,
    opens: AtomicUsize,
}

impl ScriptedOpener {
    /// Each entry is one `open` call: `Some(steps)` succeeds, `None` fails.
    pub fn new(scripts: impl IntoIterator<Item = Option<Vec<Step>>>) -> Arc<Self> {
        Arc::new(Self {
            path: "/dev/mock".to_string(),
            scripts: Mutex::new(scripts.into_iter().collect()),
            opens: AtomicUsize::new(0),
        })
    }

    /// A device that plays `steps` once and never reopens.
    pub fn once(steps: Vec<Step>) -> Arc<Self> {
        Self::new([Some(steps)])
    }

    /// Number of `open` calls so far.
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl Opener for ScriptedOpener {
    fn open(&self) -> Result<Box<dyn Transport>, DeviceError> {
        let _ = self.opens.fetch_add(1, Ordering::SeqCst);
        match self.scripts.lock().pop_front() {
            Some(Some(steps)) => Ok(Box::new(ScriptedTransport::new(steps))),
            Some(None) | None => Err(DeviceError::Open {
                path: self.path.clone(),
                reason: "scripted open failure".to_string(),
            }),
        }
    }

    fn path(&self) -> &str {
        &self.path
    }
}
