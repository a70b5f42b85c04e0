//! Ingest bridge: decoded readings in, hub fan-out out.

use std::sync::Arc;

use futures::{Stream, StreamExt};
use relay_core::Reading;
use relay_device::DeviceError;
use relay_hub::BroadcastHub;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, trace};

/// Why ingestion stopped.
#[derive(Debug)]
pub enum IngestExit {
    /// The device failed; the hub receives nothing more.
    DeviceFailed(DeviceError),
    /// The reading stream ended without an error.
    Ended,
    /// Shutdown was requested.
    Cancelled,
}

/// Pumps readings into the hub, one at a time, in decode order.
pub struct IngestBridge {
    hub: Arc<BroadcastHub>,
    cancel: CancellationToken,
}

impl IngestBridge {
    /// Create a bridge publishing into `hub` until `cancel` fires.
    pub fn new(hub: Arc<BroadcastHub>, cancel: CancellationToken) -> Self {
        Self { hub, cancel }
    }

    /// Run until the stream ends, fails, or shutdown is requested.
    #[tracing::instrument(skip_all, name = "ingest")]
    pub async fn run<S>(self, readings: S) -> IngestExit
    where
        S: Stream<Item = Result<Reading, DeviceError>>,
    {
        let mut readings = std::pin::pin!(readings);
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    info!("ingest cancelled");
                    return IngestExit::Cancelled;
                }
                item = readings.next() => match item {
                    Some(Ok(reading)) => {
                        let report = self.hub.publish(&reading);
                        trace!(seq = reading.seq, recipients = report.recipients, dropped = report.dropped, "published reading");
                    }
                    Some(Err(e)) => {
                        error!(error = %e, "device stream failed, ingestion stopped");
                        return IngestExit::DeviceFailed(e);
                    }
                    None => {
                        info!("device stream ended");
                        return IngestExit::Ended;
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Utc;
    use futures::stream;
    use relay_core::ConnectionId;

    fn reading(seq: u64, payload: &str) -> Result<Reading, DeviceError> {
        Ok(Reading::new(seq, payload, Utc::now()))
    }

    #[tokio::test]
    async fn publishes_in_order_and_reports_device_failure() {
        let hub = Arc::new(BroadcastHub::default());
        let client = hub.register(ConnectionId::from("a")).unwrap();
        let items = vec![
            reading(1, "22.0"),
            reading(2, "22.1"),
            Err(DeviceError::Closed {
                path: "/dev/ttyUSB0".into(),
            }),
        ];

        let exit = IngestBridge::new(Arc::clone(&hub), CancellationToken::new())
            .run(stream::iter(items))
            .await;

        assert_matches!(exit, IngestExit::DeviceFailed(DeviceError::Closed { .. }));
        assert_eq!(client.try_recv().map(|r| r.seq), Some(1));
        assert_eq!(client.try_recv().map(|r| r.seq), Some(2));
        assert!(client.try_recv().is_none());
        assert!(!client.is_closed(), "clients stay connected after device failure");
        assert_eq!(hub.stats().published, 2);
    }

    #[tokio::test]
    async fn publishing_without_clients_is_fine() {
        let hub = Arc::new(BroadcastHub::default());
        let exit = IngestBridge::new(Arc::clone(&hub), CancellationToken::new())
            .run(stream::iter(vec![reading(1, "23.5"), reading(2, "24.1")]))
            .await;
        assert_matches!(exit, IngestExit::Ended);
        assert_eq!(hub.stats().published, 2);
    }

    #[tokio::test]
    async fn cancellation_stops_a_pending_stream() {
        let hub = Arc::new(BroadcastHub::default());
        let cancel = CancellationToken::new();
        let bridge = IngestBridge::new(hub, cancel.clone());
        let task = tokio::spawn(bridge.run(stream::pending::<Result<Reading, DeviceError>>()));
        cancel.cancel();
        assert_matches!(task.await.unwrap(), IngestExit::Cancelled);
    }
}
