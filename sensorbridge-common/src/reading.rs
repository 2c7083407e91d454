use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One decoded humidity/temperature sample.
///
/// Values are kept verbatim as the sensor sent them; precision and units
/// belong to the physical device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reading {
    timestamp: DateTime<Utc>,
    humidity: String,
    temperature: String,
}

impl Reading {
    /// Create a reading taken at `timestamp`.
    pub fn new(
        timestamp: DateTime<Utc>,
        humidity: impl Into<String>,
        temperature: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            humidity: humidity.into(),
            temperature: temperature.into(),
        }
    }

    /// Create a reading stamped with the current time.
    pub fn now(humidity: impl Into<String>, temperature: impl Into<String>) -> Self {
        Self::new(Utc::now(), humidity, temperature)
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn humidity(&self) -> &str {
        &self.humidity
    }

    pub fn temperature(&self) -> &str {
        &self.temperature
    }

    /// Build the wire payload for this reading.
    pub fn payload(&self) -> ReadingPayload {
        ReadingPayload {
            time: self
                .timestamp
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            temperature: self.temperature.clone(),
            humidity: self.humidity.clone(),
        }
    }

    /// Serialize the wire payload as JSON bytes.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.payload())?)
    }
}

/// JSON document published for each reading.
///
/// Field order is part of the wire format: `time`, `temperature`, `humidity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingPayload {
    /// ISO-8601 UTC timestamp with millisecond precision.
    pub time: String,
    pub temperature: String,
    pub humidity: String,
}

impl ReadingPayload {
    /// Decode a payload received from the bus.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_payload_field_order() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap();
        let reading = Reading::new(ts, "45", "22");

        let json = String::from_utf8(reading.to_json().unwrap()).unwrap();
        assert_eq!(
            json,
            r#"{"time":"2024-03-01T12:30:05.000Z","temperature":"22","humidity":"45"}"#
        );
    }

    #[test]
    fn test_values_kept_verbatim() {
        let reading = Reading::now("45.10", "-3.0");
        assert_eq!(reading.humidity(), "45.10");
        assert_eq!(reading.temperature(), "-3.0");

        let payload = reading.payload();
        assert_eq!(payload.humidity, "45.10");
        assert_eq!(payload.temperature, "-3.0");
    }

    #[test]
    fn test_decode_payload() {
        let data = br#"{"time":"2024-03-01T12:30:05.000Z","temperature":"22","humidity":"45"}"#;
        let payload = ReadingPayload::from_json(data).unwrap();
        assert_eq!(payload.temperature, "22");
        assert_eq!(payload.humidity, "45");
    }
}
