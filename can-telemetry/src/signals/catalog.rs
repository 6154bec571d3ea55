//! Built-in vehicle signal catalog
//!
//! Compiled-in descriptor table for the Renault Zoe Ph2 high-speed bus,
//! grouped by subsystem. Every entry carries the publish tier and tolerance
//! it is registered with by [`register_catalog`].

use super::{PublishInterval, SignalDefinition, SignalDescriptor};
use crate::config::{GatewayConfig, PublishTier};
use crate::registry::Registry;
use crate::types::Result;
use std::fmt;

/// Frame identifiers used by the catalog
pub mod frame_ids {
    pub const BATTERY_STATUS: u32 = 0x042F;
    pub const CELL_VOLTAGES: u32 = 0x0637;
    pub const BATTERY_TEMP: u32 = 0x0639;
    pub const BATTERY_POWER: u32 = 0x0645;
    pub const BATTERY_CAPACITY: u32 = 0x0643;
    pub const CHARGE_CYCLES: u32 = 0x0655;
    pub const CHARGE_STATUS: u32 = 0x01F8;
    pub const SPEED: u32 = 0x0140;
    pub const CONSUMPTION: u32 = 0x0119;
    pub const RANGE: u32 = 0x0100;
    pub const INTERIOR_TEMP: u32 = 0x055B;
    pub const HEAT_PUMP: u32 = 0x065F;
    pub const AUX_VOLTAGE: u32 = 0x035E;
    pub const POWER_MODULE_TEMP: u32 = 0x035F;
    pub const RECUPERATION: u32 = 0x0634;
    pub const TPMS: u32 = 0x0354;
}

/// Logical subsystem a catalog signal belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subsystem {
    Battery,
    Charging,
    Motion,
    Climate,
    Power,
    Recuperation,
    Tpms,
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subsystem::Battery => write!(f, "battery"),
            Subsystem::Charging => write!(f, "charging"),
            Subsystem::Motion => write!(f, "motion"),
            Subsystem::Climate => write!(f, "climate"),
            Subsystem::Power => write!(f, "power"),
            Subsystem::Recuperation => write!(f, "recuperation"),
            Subsystem::Tpms => write!(f, "tpms"),
        }
    }
}

/// One row of the catalog
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub subsystem: Subsystem,
    pub definition: SignalDefinition,
}

use frame_ids::*;
use PublishTier::{Fast, Mid, Slow};
use Subsystem::*;

#[allow(clippy::too_many_arguments)]
const fn entry(
    subsystem: Subsystem,
    name: &'static str,
    frame_id: u32,
    start_bit: u16,
    bit_length: u16,
    scale: f64,
    offset: f64,
    unit: &'static str,
    topic: &'static str,
    tier: PublishTier,
    tolerance: f64,
) -> CatalogEntry {
    CatalogEntry {
        subsystem,
        definition: SignalDefinition::new(
            SignalDescriptor::fixed(name, frame_id, start_bit, bit_length, scale, offset, unit, topic),
            PublishInterval::Tier(tier),
            tolerance,
        ),
    }
}

#[rustfmt::skip]
static CATALOG: [CatalogEntry; 36] = [
    // Battery management
    entry(Battery, "SoC", BATTERY_STATUS, 0, 8, 0.5, 0.0, "%", "battery/soc", Fast, 0.5),
    entry(Battery, "SoH", BATTERY_STATUS, 8, 8, 0.5, 0.0, "%", "battery/soh", Mid, 1.0),
    entry(Battery, "RealSOC", BATTERY_STATUS, 16, 8, 0.5, 0.0, "%", "battery/real_soc", Fast, 0.5),
    entry(Battery, "CellVoltMin", CELL_VOLTAGES, 0, 16, 0.001, 0.0, "V", "battery/cell_voltage_min", Mid, 0.01),
    entry(Battery, "CellVoltMax", CELL_VOLTAGES, 16, 16, 0.001, 0.0, "V", "battery/cell_voltage_max", Mid, 0.01),
    entry(Battery, "BatteryTempMin", BATTERY_TEMP, 0, 8, 1.0, -40.0, "°C", "battery/temp_min", Mid, 1.0),
    entry(Battery, "BatteryTempMax", BATTERY_TEMP, 8, 8, 1.0, -40.0, "°C", "battery/temp_max", Mid, 1.0),
    entry(Battery, "BatteryTempAvg", BATTERY_TEMP, 16, 8, 1.0, -40.0, "°C", "battery/temp_avg", Mid, 1.0),
    entry(Battery, "BatteryVoltage", BATTERY_POWER, 0, 16, 0.1, 0.0, "V", "battery/voltage", Fast, 1.0),
    entry(Battery, "BatteryCurrent", BATTERY_POWER, 16, 16, 0.1, -1638.4, "A", "battery/current", Fast, 0.5),
    entry(Battery, "BatteryPower", BATTERY_POWER, 32, 16, 0.1, -3276.8, "kW", "battery/power", Fast, 0.5),
    entry(Battery, "UsableCapacity", BATTERY_CAPACITY, 0, 16, 0.1, 0.0, "kWh", "battery/usable_capacity", Slow, 0.1),
    entry(Battery, "MaxCapacity", BATTERY_CAPACITY, 16, 16, 0.1, 0.0, "kWh", "battery/max_capacity", Slow, 0.1),
    entry(Battery, "EnergyToFull", BATTERY_CAPACITY, 32, 16, 0.1, 0.0, "kWh", "battery/energy_to_full", Fast, 0.5),
    entry(Battery, "FullCycles", CHARGE_CYCLES, 0, 16, 1.0, 0.0, "count", "battery/full_cycles", Slow, 1.0),
    // Charging
    entry(Charging, "PlugConnected", CHARGE_STATUS, 0, 1, 1.0, 0.0, "bool", "charging/plug_connected", Fast, 0.0),
    entry(Charging, "ChargePower", CHARGE_STATUS, 8, 16, 0.1, 0.0, "kW", "charging/power", Fast, 0.5),
    entry(Charging, "ChargeVoltage", CHARGE_STATUS, 24, 16, 0.1, 0.0, "V", "charging/voltage", Fast, 1.0),
    entry(Charging, "ChargeCurrent", CHARGE_STATUS, 40, 16, 0.1, 0.0, "A", "charging/current", Fast, 0.5),
    // Motion
    entry(Motion, "Speed", SPEED, 0, 16, 0.01, 0.0, "km/h", "motion/speed", Fast, 1.0),
    entry(Motion, "Consumption", CONSUMPTION, 0, 16, 0.01, 0.0, "kWh/100km", "motion/consumption_kwh_100km", Fast, 0.5),
    entry(Motion, "AvailableRange", RANGE, 0, 16, 1.0, 0.0, "km", "motion/available_range", Fast, 1.0),
    // Climate
    entry(Climate, "InteriorTemp", INTERIOR_TEMP, 0, 8, 0.5, -40.0, "°C", "climate/interior_temp", Mid, 1.0),
    entry(Climate, "HeatPumpPressure", HEAT_PUMP, 0, 16, 0.1, 0.0, "bar", "climate/heat_pump_pressure", Mid, 0.5),
    entry(Climate, "HeatPumpEvapTemp", HEAT_PUMP, 16, 8, 1.0, -40.0, "°C", "climate/heat_pump_evap_temp", Mid, 1.0),
    entry(Climate, "HeatPumpCondTemp", HEAT_PUMP, 24, 8, 1.0, -40.0, "°C", "climate/heat_pump_cond_temp", Mid, 1.0),
    // Auxiliary power
    entry(Power, "Voltage12V", AUX_VOLTAGE, 0, 16, 0.01, 0.0, "V", "power/voltage_12v", Mid, 0.5),
    entry(Power, "Voltage24V", AUX_VOLTAGE, 16, 16, 0.01, 0.0, "V", "power/voltage_24v", Mid, 0.5),
    entry(Power, "PowerModuleTemp", POWER_MODULE_TEMP, 0, 8, 1.0, -40.0, "°C", "power/power_module_temp", Mid, 1.0),
    // Recuperation
    entry(Recuperation, "MaxRecupPower", RECUPERATION, 0, 16, 0.1, 0.0, "kW", "recuperation/max_power", Fast, 0.5),
    entry(Recuperation, "InstantRecup", RECUPERATION, 16, 16, 0.1, 0.0, "kW", "recuperation/instant_power", Fast, 0.1),
    entry(Recuperation, "TotalRecup", RECUPERATION, 32, 32, 0.01, 0.0, "kWh", "recuperation/total_energy", Mid, 0.5),
    // Tire pressure
    entry(Tpms, "TireFL_Pressure", TPMS, 0, 8, 0.5, 0.0, "bar", "tpms/tire_fl_pressure", Mid, 0.1),
    entry(Tpms, "TireFR_Pressure", TPMS, 8, 8, 0.5, 0.0, "bar", "tpms/tire_fr_pressure", Mid, 0.1),
    entry(Tpms, "TireRL_Pressure", TPMS, 16, 8, 0.5, 0.0, "bar", "tpms/tire_rl_pressure", Mid, 0.1),
    entry(Tpms, "TireRR_Pressure", TPMS, 24, 8, 0.5, 0.0, "bar", "tpms/tire_rr_pressure", Mid, 0.1),
];

/// All catalog rows in table order
pub fn entries() -> &'static [CatalogEntry] {
    &CATALOG
}

/// Catalog rows of one subsystem
pub fn by_subsystem(subsystem: Subsystem) -> impl Iterator<Item = &'static CatalogEntry> {
    CATALOG.iter().filter(move |e| e.subsystem == subsystem)
}

/// Look up a catalog descriptor by signal name
pub fn find(name: &str) -> Option<&'static SignalDescriptor> {
    CATALOG
        .iter()
        .map(|e| &e.definition.descriptor)
        .find(|d| d.name == name)
}

/// Register every catalog signal
///
/// Returns the number of registered signals.
pub fn register_catalog(registry: &mut Registry, config: &GatewayConfig) -> Result<usize> {
    log::info!("Registering {} built-in vehicle signals", CATALOG.len());
    let count = registry.register_definitions(
        CATALOG.iter().map(|e| e.definition.clone()),
        config,
    )?;
    log::info!(
        "Built-in catalog registered: {} signals on {} frame IDs",
        count,
        registry.stats().num_frames
    );
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_descriptors_are_valid() {
        for e in entries() {
            let d = &e.definition.descriptor;
            assert!(d.validate().is_ok(), "{} invalid", d.name);
            assert!(!d.exceeds_register(), "{} exceeds register", d.name);
            assert!(d.topic.starts_with(&e.subsystem.to_string()), "{} topic", d.name);
        }
    }

    #[test]
    fn test_catalog_has_no_overlaps() {
        let all = entries();
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert!(
                    !a.definition.descriptor.overlaps(&b.definition.descriptor),
                    "{} overlaps {}",
                    a.definition.descriptor.name,
                    b.definition.descriptor.name
                );
            }
        }
    }

    #[test]
    fn test_find_and_subsystems() {
        let soc = find("SoC").unwrap();
        assert_eq!(soc.frame_id, frame_ids::BATTERY_STATUS);
        assert!(find("Nope").is_none());

        assert_eq!(by_subsystem(Subsystem::Tpms).count(), 4);
        assert_eq!(by_subsystem(Subsystem::Charging).count(), 4);
    }

    #[test]
    fn test_register_catalog() {
        let mut registry = Registry::new();
        let count = register_catalog(&mut registry, &GatewayConfig::new()).unwrap();
        assert_eq!(count, 36);
        assert_eq!(registry.stats().num_signals, 36);
        assert_eq!(registry.stats().num_frames, 16);

        let soc = registry.find("SoC")[0];
        assert_eq!(registry.get(soc).unwrap().policy().min_interval_ms(), 60_000);
        let cycles = registry.find("FullCycles")[0];
        assert_eq!(registry.get(cycles).unwrap().policy().min_interval_ms(), 3_600_000);
    }
}
