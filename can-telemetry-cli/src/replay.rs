//! candump log replay
//!
//! Reads `candump -l` style logs and serves them as a frame source:
//!
//! ```text
//! (1700000000.123456) can0 42F#A0BE9E
//! (1700000000.223456) can1 18DAF110#0102
//! ```
//!
//! Timestamps are rebased so the first frame is at 0 ms. Interfaces become
//! channels in order of first appearance. Remote and CAN FD frames are skipped.

use can_telemetry::types::EXTENDED_ID_MAX;
use can_telemetry::{Frame, FrameSource, Timestamp};
use std::collections::VecDeque;
use std::path::Path;

/// Distinct interfaces a log may use, one per channel number
const MAX_INTERFACES: usize = u8::MAX as usize + 1;

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Frames of a candump log, in file order
#[derive(Debug, Default)]
pub struct ReplayLog {
    frames: VecDeque<Frame>,
    interfaces: Vec<String>,
    skipped: usize,
}

struct LogLine<'a> {
    timestamp_ms: Timestamp,
    interface: &'a str,
    id: u32,
    data: Vec<u8>,
}

impl ReplayLog {
    /// Load and parse a log file
    pub fn load(path: &Path) -> Result<Self, ReplayError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse log text
    pub fn parse(content: &str) -> Result<Self, ReplayError> {
        let mut log = ReplayLog::default();
        let mut origin: Option<Timestamp> = None;

        for (idx, raw_line) in content.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let parsed = parse_line(line).map_err(|reason| ReplayError::Parse {
                line: idx + 1,
                reason,
            })?;
            let Some(entry) = parsed else {
                log.skipped += 1;
                continue;
            };

            let start = *origin.get_or_insert(entry.timestamp_ms);
            let channel = log.channel_for(entry.interface).ok_or_else(|| ReplayError::Parse {
                line: idx + 1,
                reason: format!("more than {} interfaces", MAX_INTERFACES),
            })?;
            let frame = Frame::new(entry.id, &entry.data, entry.timestamp_ms.saturating_sub(start))
                .on_channel(channel);
            log.frames.push_back(frame);
        }

        log::info!(
            "Parsed {} frames on {} interfaces ({} skipped)",
            log.frames.len(),
            log.interfaces.len(),
            log.skipped
        );
        Ok(log)
    }

    /// Channel of an interface, `None` once every channel number is taken
    fn channel_for(&mut self, interface: &str) -> Option<u8> {
        if let Some(pos) = self.interfaces.iter().position(|i| i == interface) {
            return u8::try_from(pos).ok();
        }
        let channel = u8::try_from(self.interfaces.len()).ok()?;
        self.interfaces.push(interface.to_string());
        Some(channel)
    }

    /// Frames not yet handed out
    pub fn remaining(&self) -> usize {
        self.frames.len()
    }

    /// Interface names, indexed by channel
    pub fn interfaces(&self) -> &[String] {
        &self.interfaces
    }

    /// Lines skipped as remote or CAN FD frames
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl FrameSource for ReplayLog {
    fn try_receive(&mut self) -> Option<Frame> {
        self.frames.pop_front()
    }
}

fn parse_line(line: &str) -> Result<Option<LogLine<'_>>, String> {
    let mut parts = line.split_whitespace();
    let stamp = parts.next().ok_or("missing timestamp")?;
    let interface = parts.next().ok_or("missing interface")?;
    let body = parts.next().ok_or("missing frame")?;

    let timestamp_ms = parse_timestamp(stamp)?;

    let (id_text, data_text) = body
        .split_once('#')
        .ok_or_else(|| format!("expected <id>#<data>, got '{}'", body))?;

    if data_text.starts_with('#') {
        log::warn!("Skipping CAN FD frame: {}", body);
        return Ok(None);
    }
    if data_text.starts_with('R') {
        log::trace!("Skipping remote frame: {}", body);
        return Ok(None);
    }

    let id = u32::from_str_radix(id_text, 16).map_err(|e| format!("bad identifier '{}': {}", id_text, e))?;
    if id > EXTENDED_ID_MAX {
        return Err(format!("identifier 0x{:X} exceeds 29 bits", id));
    }

    let data = parse_hex_bytes(data_text)?;
    if data.len() > Frame::MAX_LEN {
        return Err(format!("{} data bytes, classic CAN allows 8", data.len()));
    }

    Ok(Some(LogLine {
        timestamp_ms,
        interface,
        id,
        data,
    }))
}

/// `(seconds.fraction)` to milliseconds
fn parse_timestamp(stamp: &str) -> Result<Timestamp, String> {
    let inner = stamp
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| format!("bad timestamp '{}'", stamp))?;

    let (secs, frac) = inner.split_once('.').unwrap_or((inner, "0"));
    let secs: u64 = secs.parse().map_err(|_| format!("bad timestamp '{}'", stamp))?;

    // First three fraction digits are milliseconds
    let mut millis_text: String = frac.chars().take(3).collect();
    while millis_text.len() < 3 {
        millis_text.push('0');
    }
    let millis: u64 = millis_text
        .parse()
        .map_err(|_| format!("bad timestamp '{}'", stamp))?;

    secs.checked_mul(1000)
        .and_then(|ms| ms.checked_add(millis))
        .ok_or_else(|| format!("timestamp '{}' out of range", stamp))
}

fn parse_hex_bytes(text: &str) -> Result<Vec<u8>, String> {
    if let Some(bad) = text.chars().find(|c| *c != '.' && !c.is_ascii_hexdigit()) {
        return Err(format!("bad data character '{}' in '{}'", bad, text));
    }
    let digits: Vec<u8> = text.bytes().filter(|b| *b != b'.').collect();
    if digits.len() % 2 != 0 {
        return Err(format!("odd number of hex digits in '{}'", text));
    }

    Ok(digits
        .chunks(2)
        .map(|pair| (hex_value(pair[0]) << 4) | hex_value(pair[1]))
        .collect())
}

/// Value of an ASCII hex digit already checked with `is_ascii_hexdigit`
fn hex_value(digit: u8) -> u8 {
    match digit {
        b'0'..=b'9' => digit - b'0',
        b'a'..=b'f' => digit - b'a' + 10,
        _ => digit - b'A' + 10,
    }
}
