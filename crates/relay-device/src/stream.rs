//! The lazy reading sequence: device events in, readings out.

use futures::{Stream, StreamExt};
use relay_core::Reading;
use tracing::{debug, warn};

use crate::decoder::FrameDecoder;
use crate::errors::DeviceError;
use crate::reader::DeviceEvent;

/// Decode a device event stream into readings.
///
/// Decode errors are logged and skipped. A device error is yielded once and
/// ends the sequence. A reopen resets the decoder so numbering restarts at 1.
pub fn decode_stream<S>(
    events: S,
    mut decoder: FrameDecoder,
) -> impl Stream<Item = Result<Reading, DeviceError>> + Send
where
    S: Stream<Item = Result<DeviceEvent, DeviceError>> + Send + Unpin,
{
    async_stream::stream! {
        let mut events = events;
        while let Some(event) = events.next().await {
            match event {
                Ok(DeviceEvent::Chunk(chunk)) => {
                    for result in decoder.decode(&chunk) {
                        match result {
                            Ok(reading) => yield Ok(reading),
                            Err(e) => warn!(error = %e, "dropping undecodable frame"),
                        }
                    }
                }
                Ok(DeviceEvent::Reopened { session }) => {
                    if decoder.pending_len() > 0 {
                        debug!(session, discarded = decoder.pending_len(), "discarding partial frame from previous session");
                    }
                    decoder.reset();
                }
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }
        if decoder.pending_len() > 0 {
            debug!(discarded = decoder.pending_len(), "discarding unterminated trailing frame");
        }
    }
}
