//! Wire format of pushed readings.

use chrono::SecondsFormat;
use relay_core::Reading;
use serde::Serialize;

/// Event type carried by every pushed frame.
pub const SENSOR_DATA: &str = "sensorData";

/// One `sensorData` frame.
///
/// `type` and `data` are what dashboards key on; `seq` and `timestamp` let a
/// client notice gaps left by queue overflow.
#[derive(Debug, Serialize)]
pub struct SensorDataEvent<'a> {
    /// Always [`SENSOR_DATA`].
    #[serde(rename = "type")]
    pub event_type: &'static str,
    /// The reading payload.
    pub data: &'a str,
    /// Sequence number within the current device session.
    pub seq: u64,
    /// RFC 3339 arrival time, millisecond precision, UTC.
    pub timestamp: String,
}

impl<'a> From<&'a Reading> for SensorDataEvent<'a> {
    fn from(r: &'a Reading) -> Self {
        Self {
            event_type: SENSOR_DATA,
            data: r.payload(),
            seq: r.seq,
            timestamp: r.received_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Serialize a reading as a text frame body.
pub fn encode_reading(reading: &Reading) -> Result<String, serde_json::Error> {
    serde_json::to_string(&SensorDataEvent::from(reading))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn frame_shape() {
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let json = encode_reading(&Reading::new(7, "22.0", at)).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["type"], "sensorData");
        assert_eq!(parsed["data"], "22.0");
        assert_eq!(parsed["seq"], 7);
        assert_eq!(parsed["timestamp"], "2026-01-01T00:00:00.000Z");
        assert_eq!(parsed.as_object().unwrap().len(), 4);
    }

    #[test]
    fn payload_is_escaped() {
        let json = encode_reading(&Reading::new(1, "a \"quoted\" value", Utc::now())).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["data"], "a \"quoted\" value");
    }
}
