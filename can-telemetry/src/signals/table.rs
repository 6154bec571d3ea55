//! TOML descriptor tables
//!
//! A table lists signals as `[[signal]]` entries. Loading only produces
//! [`SignalDefinition`]s; nothing here knows how frames are decoded.
//!
//! ```toml
//! [[signal]]
//! name = "SoC"
//! frame_id = 0x42F
//! start_bit = 0
//! bit_length = 8
//! scale = 0.5
//! unit = "%"
//! topic = "battery/soc"
//! tier = "fast"
//! tolerance = 0.5
//! ```

use super::{PublishInterval, SignalDefinition, SignalDescriptor};
use crate::config::PublishTier;
use crate::types::{Result, TelemetryError};
use serde::Deserialize;
use std::borrow::Cow;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct TableFile {
    #[serde(default, rename = "signal")]
    signals: Vec<TableEntry>,
}

/// One `[[signal]]` entry
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableEntry {
    pub name: String,
    pub frame_id: u32,
    pub start_bit: u16,
    pub bit_length: u16,
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default)]
    pub offset: f64,
    #[serde(default)]
    pub unit: String,
    /// Destination topic; defaults to the lowercased signal name
    pub topic: Option<String>,
    /// Fixed interval, takes precedence over `tier`
    pub interval_ms: Option<u64>,
    pub tier: Option<PublishTier>,
    #[serde(default)]
    pub tolerance: f64,
}

fn default_scale() -> f64 {
    1.0
}

impl TableEntry {
    /// Convert into a definition; signals without interval default to the fast tier
    pub fn into_definition(self) -> SignalDefinition {
        let interval = match (self.interval_ms, self.tier) {
            (Some(ms), _) => PublishInterval::Millis(ms),
            (None, Some(tier)) => PublishInterval::Tier(tier),
            (None, None) => PublishInterval::Tier(PublishTier::Fast),
        };
        let topic = self.topic.unwrap_or_else(|| self.name.to_lowercase());

        SignalDefinition {
            descriptor: SignalDescriptor {
                name: Cow::Owned(self.name),
                frame_id: self.frame_id,
                start_bit: self.start_bit,
                bit_length: self.bit_length,
                scale: self.scale,
                offset: self.offset,
                unit: Cow::Owned(self.unit),
                topic: Cow::Owned(topic),
            },
            interval,
            tolerance: self.tolerance,
        }
    }
}

/// Parse a descriptor table from TOML text
pub fn parse_table(content: &str) -> Result<Vec<SignalDefinition>> {
    let file: TableFile =
        toml::from_str(content).map_err(|e| TelemetryError::TableParseError(e.to_string()))?;

    Ok(file
        .signals
        .into_iter()
        .map(TableEntry::into_definition)
        .collect())
}

/// Load a descriptor table file
pub fn load_table(path: &Path) -> Result<Vec<SignalDefinition>> {
    log::info!("Loading descriptor table: {:?}", path);

    let content = std::fs::read_to_string(path)?;
    let definitions = parse_table(&content).map_err(|e| match e {
        TelemetryError::TableParseError(msg) => {
            TelemetryError::TableParseError(format!("{:?}: {}", path, msg))
        }
        other => other,
    })?;

    log::info!("Loaded {} signal definitions from {:?}", definitions.len(), path);
    Ok(definitions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const TABLE: &str = r#"
[[signal]]
name = "SoC"
frame_id = 0x42F
start_bit = 0
bit_length = 8
scale = 0.5
unit = "%"
topic = "battery/soc"
tier = "fast"
tolerance = 0.5

[[signal]]
name = "MotorTorque"
frame_id = 0x154
start_bit = 16
bit_length = 16
scale = 0.1
offset = -3276.8
unit = "Nm"
interval_ms = 10000
"#;

    #[test]
    fn test_parse_table() {
        let defs = parse_table(TABLE).unwrap();
        assert_eq!(defs.len(), 2);

        let soc = &defs[0];
        assert_eq!(soc.descriptor.name, "SoC");
        assert_eq!(soc.descriptor.frame_id, 0x42F);
        assert_eq!(soc.descriptor.scale, 0.5);
        assert_eq!(soc.interval, PublishInterval::Tier(PublishTier::Fast));
        assert_eq!(soc.tolerance, 0.5);

        let torque = &defs[1];
        assert_eq!(torque.descriptor.topic, "motortorque");
        assert_eq!(torque.descriptor.offset, -3276.8);
        assert_eq!(torque.interval, PublishInterval::Millis(10_000));
        assert_eq!(torque.tolerance, 0.0);
    }

    #[test]
    fn test_defaults() {
        let defs = parse_table(
            r#"
            [[signal]]
            name = "Raw"
            frame_id = 1
            start_bit = 0
            bit_length = 8
            "#,
        )
        .unwrap();

        let raw = &defs[0];
        assert_eq!(raw.descriptor.scale, 1.0);
        assert_eq!(raw.descriptor.offset, 0.0);
        assert_eq!(raw.descriptor.unit, "");
        assert_eq!(raw.interval, PublishInterval::Tier(PublishTier::Fast));
    }

    #[test]
    fn test_empty_table() {
        assert!(parse_table("").unwrap().is_empty());
    }

    #[test]
    fn test_rejects_unknown_field() {
        let result = parse_table(
            r#"
            [[signal]]
            name = "Raw"
            frame_id = 1
            start_bit = 0
            bit_length = 8
            byte_order = "big"
            "#,
        );
        assert!(matches!(result, Err(TelemetryError::TableParseError(_))));
    }

    #[test]
    fn test_load_table_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(TABLE.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let defs = load_table(temp_file.path()).unwrap();
        assert_eq!(defs.len(), 2);
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_table(Path::new("/nonexistent/signals.toml"));
        assert!(matches!(result, Err(TelemetryError::IoError(_))));
    }
}
