//! DBC file import
//!
//! Turns the signals of a Vector DBC file into descriptors. The frame decoder
//! only understands little-endian, non-multiplexed fields; everything else is
//! skipped with a warning.

use super::{PublishInterval, SignalDefinition, SignalDescriptor};
use crate::config::PublishTier;
use crate::types::{Result, TelemetryError};
use std::borrow::Cow;
use std::path::Path;

/// Parse a DBC file and return definitions registered at `tier` with zero tolerance
pub fn parse_dbc_file(path: &Path, tier: PublishTier) -> Result<Vec<SignalDefinition>> {
    log::info!("Parsing DBC file: {:?}", path);

    // Read the DBC file as bytes first (handle non-UTF8 encodings)
    let bytes = std::fs::read(path).map_err(|e| {
        TelemetryError::DbcParseError(format!("Failed to read file {:?}: {}", path, e))
    })?;

    let definitions = parse_dbc(&bytes, tier)?;
    log::info!("Imported {} signals from {:?}", definitions.len(), path);
    Ok(definitions)
}

/// Parse DBC content already in memory
pub fn parse_dbc(bytes: &[u8], tier: PublishTier) -> Result<Vec<SignalDefinition>> {
    // Fall back to Latin-1 for files written by Windows tools
    let content = match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            log::warn!("DBC content is not UTF-8, trying Latin-1 encoding");
            bytes.iter().map(|&b| b as char).collect()
        }
    };

    let dbc = can_dbc::DBC::from_slice(content.as_bytes()).map_err(|e| {
        TelemetryError::DbcParseError(format!("Failed to parse DBC content: {:?}", e))
    })?;

    let mut definitions = Vec::new();
    for dbc_msg in dbc.messages() {
        for dbc_sig in dbc_msg.signals() {
            match convert_signal(dbc_msg, dbc_sig) {
                Ok(descriptor) => definitions.push(SignalDefinition::new(
                    descriptor,
                    PublishInterval::Tier(tier),
                    0.0,
                )),
                Err(e) => log::warn!("Skipping DBC signal: {}", e),
            }
        }
    }

    Ok(definitions)
}

/// Convert a can-dbc signal to a descriptor
fn convert_signal(dbc_msg: &can_dbc::Message, dbc_sig: &can_dbc::Signal) -> Result<SignalDescriptor> {
    let message_name = dbc_msg.message_name();

    if let can_dbc::ByteOrder::BigEndian = *dbc_sig.byte_order() {
        return Err(TelemetryError::UnsupportedSignal(format!(
            "{}.{} is big-endian",
            message_name,
            dbc_sig.name()
        )));
    }

    if !matches!(
        *dbc_sig.multiplexer_indicator(),
        can_dbc::MultiplexIndicator::Plain
    ) {
        return Err(TelemetryError::UnsupportedSignal(format!(
            "{}.{} is multiplexed",
            message_name,
            dbc_sig.name()
        )));
    }

    let topic = format!("{}/{}", message_name, dbc_sig.name()).to_lowercase();

    let descriptor = SignalDescriptor {
        name: Cow::Owned(dbc_sig.name().to_string()),
        // Strip the extended-frame flag bit DBC files store in the identifier
        frame_id: dbc_msg.message_id().0 & crate::types::EXTENDED_ID_MAX,
        start_bit: *dbc_sig.start_bit() as u16,
        bit_length: *dbc_sig.signal_size() as u16,
        scale: *dbc_sig.factor(),
        offset: *dbc_sig.offset(),
        unit: Cow::Owned(dbc_sig.unit().to_string()),
        topic: Cow::Owned(topic),
    };
    descriptor.validate()?;

    Ok(descriptor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const DBC: &str = r#"
VERSION ""

NS_ :

BS_:

BU_: BMS GW

BO_ 1605 BatteryPower: 8 BMS
 SG_ BatteryVolt : 0|16@1+ (0.1,0) [0|1000] "V" GW
 SG_ BatteryCurrent : 16|16@1- (0.1,-1638.4) [-1638.4|1638.3] "A" GW
 SG_ LegacyTemp : 39|8@0+ (1,-40) [-40|215] "C" GW

BO_ 512 MultiplexedMsg: 8 BMS
 SG_ Mode M : 0|8@1+ (1,0) [0|3] "" GW
 SG_ SignalA m0 : 8|16@1+ (1,0) [0|100] "%" GW
"#;

    #[test]
    fn test_parse_dbc_keeps_supported_signals() {
        let defs = parse_dbc(DBC.as_bytes(), PublishTier::Mid).unwrap();
        let names: Vec<&str> = defs.iter().map(|d| &*d.descriptor.name).collect();

        assert_eq!(names, vec!["BatteryVolt", "BatteryCurrent"]);

        let current = &defs[1];
        assert_eq!(current.descriptor.frame_id, 0x645);
        assert_eq!(current.descriptor.start_bit, 16);
        assert_eq!(current.descriptor.bit_length, 16);
        assert_eq!(current.descriptor.scale, 0.1);
        assert_eq!(current.descriptor.offset, -1638.4);
        assert_eq!(current.descriptor.unit, "A");
        assert_eq!(current.descriptor.topic, "batterypower/batterycurrent");
        assert_eq!(current.interval, PublishInterval::Tier(PublishTier::Mid));
    }

    #[test]
    fn test_parse_dbc_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(DBC.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let defs = parse_dbc_file(temp_file.path(), PublishTier::Fast).unwrap();
        assert_eq!(defs.len(), 2);
    }

    #[test]
    fn test_missing_file() {
        let result = parse_dbc_file(Path::new("/nonexistent/powertrain.dbc"), PublishTier::Fast);
        assert!(matches!(result, Err(TelemetryError::DbcParseError(_))));
    }
}
