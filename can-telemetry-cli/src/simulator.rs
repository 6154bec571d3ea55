//! Deterministic vehicle simulator
//!
//! Produces a drive cycle as catalog frames so the gateway can be exercised
//! without a bus. Every step emits one frame per modelled message, all with
//! the same timestamp. Fields the model does not track read as zero.
//!
//! Battery power follows the bus convention of negative values while
//! discharging.

use crate::config::SimulatorConfig;
use byteorder::{ByteOrder, LittleEndian};
use can_telemetry::signals::catalog::{self, frame_ids};
use can_telemetry::{Clock, Frame, FrameSource, ManualClock, SignalDescriptor, Timestamp};
use std::collections::VecDeque;

/// Nominal pack capacity used for the state of charge model
const PACK_CAPACITY_AH: f64 = 120.0;

#[derive(Debug, Clone, Copy, PartialEq)]
struct VehicleState {
    soc: f64,
    speed: f64,
    current: f64,
    voltage: f64,
    battery_temp: f64,
    interior_temp: f64,
    aux_voltage: f64,
}

#[derive(Debug)]
pub struct VehicleSimulator {
    step_ms: u64,
    steps: u64,
    step: u64,
    soc: f64,
    clock: ManualClock,
    pending: VecDeque<Frame>,
}

impl VehicleSimulator {
    /// Simulate `duration_ms` of driving in `config.step_ms` increments
    pub fn new(config: &SimulatorConfig, duration_ms: u64) -> Self {
        let step_ms = config.step_ms.max(1);
        let steps = (duration_ms / step_ms).max(1);
        log::info!(
            "Simulating {} steps of {} ms starting at {:.1}% SoC",
            steps,
            step_ms,
            config.start_soc
        );

        Self {
            step_ms,
            steps,
            step: 0,
            soc: config.start_soc.clamp(0.0, 100.0),
            clock: ManualClock::new(0),
            pending: VecDeque::new(),
        }
    }

    /// Steps not yet generated
    pub fn remaining_steps(&self) -> u64 {
        self.steps - self.step
    }

    /// Current modelled state of charge
    pub fn soc(&self) -> f64 {
        self.soc
    }

    fn state_at(&self, t_s: f64) -> VehicleState {
        let speed = 50.0 + 30.0 * (t_s / 60.0).sin();
        let current = 0.8 * speed;
        VehicleState {
            soc: self.soc,
            speed,
            current,
            voltage: 360.0 + 0.6 * self.soc,
            battery_temp: 20.0 + (t_s / 120.0).min(10.0),
            interior_temp: 21.0,
            aux_voltage: 12.6 + 0.2 * (t_s / 30.0).sin(),
        }
    }

    /// Simulated time of the next burst
    pub fn now_ms(&self) -> Timestamp {
        self.clock.now_ms()
    }

    fn generate_step(&mut self) {
        let timestamp_ms = self.clock.now_ms();
        let t_s = timestamp_ms as f64 / 1000.0;
        let s = self.state_at(t_s);
        let power_kw = -(s.voltage * s.current) / 1000.0;

        let bursts: [(u32, Vec<(&str, f64)>); 8] = [
            (frame_ids::BATTERY_STATUS, vec![("SoC", s.soc), ("RealSOC", s.soc)]),
            (
                frame_ids::BATTERY_POWER,
                vec![
                    ("BatteryVoltage", s.voltage),
                    ("BatteryCurrent", s.current),
                    ("BatteryPower", power_kw),
                ],
            ),
            (
                frame_ids::BATTERY_TEMP,
                vec![
                    ("BatteryTempMin", s.battery_temp - 2.0),
                    ("BatteryTempMax", s.battery_temp + 2.0),
                    ("BatteryTempAvg", s.battery_temp),
                ],
            ),
            (frame_ids::SPEED, vec![("Speed", s.speed)]),
            (frame_ids::CONSUMPTION, vec![("Consumption", 15.0 + 0.05 * s.speed)]),
            (frame_ids::RANGE, vec![("AvailableRange", s.soc * 3.2)]),
            (frame_ids::INTERIOR_TEMP, vec![("InteriorTemp", s.interior_temp)]),
            (frame_ids::AUX_VOLTAGE, vec![("Voltage12V", s.aux_voltage)]),
        ];

        for (id, fields) in &bursts {
            self.pending.push_back(build_frame(*id, fields, timestamp_ms));
        }

        let drained = s.current * (self.step_ms as f64 / 3_600_000.0) / PACK_CAPACITY_AH * 100.0;
        self.soc = (self.soc - drained).max(0.0);
        self.step += 1;
        self.clock.advance(self.step_ms);
    }
}

impl FrameSource for VehicleSimulator {
    fn try_receive(&mut self) -> Option<Frame> {
        if self.pending.is_empty() && self.step < self.steps {
            self.generate_step();
        }
        self.pending.pop_front()
    }
}

fn build_frame(id: u32, fields: &[(&str, f64)], timestamp_ms: Timestamp) -> Frame {
    let mut data = [0u8; 8];
    let mut len = 0;

    for &(name, value) in fields {
        match catalog::find(name) {
            Some(desc) if desc.frame_id == id => {
                encode_field(&mut data, desc, value);
                len = len.max(desc.required_len());
            }
            _ => log::warn!("Simulator field {} is not in frame 0x{:X}", name, id),
        }
    }

    Frame::new(id, &data[..len], timestamp_ms)
}

/// Write `value` into the field described by `desc`
///
/// Values outside the field's signed range saturate.
fn encode_field(data: &mut [u8; 8], desc: &SignalDescriptor, value: f64) {
    let bits = u32::from(desc.bit_length.min(64));
    if bits == 0 {
        return;
    }
    let (min, max) = if bits == 64 {
        (i64::MIN, i64::MAX)
    } else {
        (-(1i64 << (bits - 1)), (1i64 << (bits - 1)) - 1)
    };
    let raw = ((value - desc.offset) / desc.scale)
        .round()
        .clamp(min as f64, max as f64) as i64;

    let start = usize::from(desc.start_bit);
    let byte = start / 8;
    match (start % 8, bits) {
        (0, 8) if byte < 8 => data[byte] = raw as u8,
        (0, 16) if byte + 2 <= 8 => LittleEndian::write_u16(&mut data[byte..byte + 2], raw as u16),
        (0, 32) if byte + 4 <= 8 => LittleEndian::write_u32(&mut data[byte..byte + 4], raw as u32),
        _ => {
            for i in 0..bits as usize {
                let pos = start + i;
                if pos >= 64 {
                    break;
                }
                let mask = 1u8 << (pos % 8);
                if (raw >> i) & 1 == 1 {
                    data[pos / 8] |= mask;
                } else {
                    data[pos / 8] &= !mask;
                }
            }
        }
    }
}
