//! JSON lines transport
//!
//! Stands in for the broker connection: every accepted value becomes one JSON
//! object per line with its full topic, formatted payload and receive time.

use can_telemetry::{Emission, TelemetryError, Timestamp, TransportSink};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize)]
struct Record<'a> {
    topic: String,
    payload: String,
    value: f64,
    unit: &'a str,
    timestamp_ms: Timestamp,
    received_at: String,
}

pub struct JsonLineSink<W: Write> {
    writer: W,
    base_topic: String,
    written: u64,
}

impl<W: Write> JsonLineSink<W> {
    pub fn new(writer: W, base_topic: impl Into<String>) -> Self {
        Self {
            writer,
            base_topic: base_topic.into(),
            written: 0,
        }
    }

    /// Lines written so far
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> TransportSink for JsonLineSink<W> {
    fn emit(&mut self, emission: &Emission) -> can_telemetry::Result<()> {
        let record = Record {
            topic: emission.topic(&self.base_topic),
            payload: emission.payload(),
            value: emission.value,
            unit: emission.unit(),
            timestamp_ms: emission.timestamp_ms,
            received_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        };

        let line = serde_json::to_string(&record)
            .map_err(|e| TelemetryError::TransportError(e.to_string()))?;
        writeln!(self.writer, "{}", line).map_err(|e| {
            TelemetryError::TransportError(format!("write to {} failed: {}", record.topic, e))
        })?;

        self.written += 1;
        Ok(())
    }
}
