//! Status report
//!
//! Plain-text summary printed after a run: registry shape, dispatch
//! counters and the last value published for every signal.

use can_telemetry::{DispatchStats, Dispatcher, DrainSummary, RegistryStats};
use std::fmt;

const RULE: &str = "═══════════════════════════════════════════════";

#[derive(Debug, Clone, PartialEq)]
pub struct LastValue {
    pub name: String,
    pub topic: String,
    pub payload: String,
    pub unit: String,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone)]
pub struct StatusReport {
    pub mode: String,
    pub base_topic: String,
    pub registry: RegistryStats,
    pub dispatch: DispatchStats,
    pub summary: DrainSummary,
    pub last_values: Vec<LastValue>,
}

impl StatusReport {
    /// Collect the report from a finished run
    pub fn collect(mode: &str, base_topic: &str, dispatcher: &Dispatcher, summary: DrainSummary) -> Self {
        let last_values = dispatcher
            .registry()
            .iter()
            .filter_map(|(_, signal)| {
                let last = signal.policy().last_emission()?;
                let desc = signal.descriptor();
                let emission = can_telemetry::Emission {
                    descriptor: desc.clone(),
                    value: last.value,
                    timestamp_ms: last.timestamp_ms,
                };
                Some(LastValue {
                    name: desc.name.to_string(),
                    topic: emission.topic(base_topic),
                    payload: emission.payload(),
                    unit: desc.unit.to_string(),
                    timestamp_ms: last.timestamp_ms,
                })
            })
            .collect();

        Self {
            mode: mode.to_string(),
            base_topic: base_topic.to_string(),
            registry: dispatcher.registry_stats(),
            dispatch: dispatcher.stats(),
            summary,
            last_values,
        }
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", RULE)?;
        writeln!(f, "  CAN Telemetry Gateway - {}", self.mode)?;
        writeln!(f, "{}", RULE)?;

        writeln!(f, "\nSignal registry:")?;
        writeln!(f, "  Frame IDs: {}", self.registry.num_frames)?;
        writeln!(f, "  Signals:   {}", self.registry.num_signals)?;

        writeln!(f, "\nDispatch:")?;
        writeln!(f, "  Frames read:       {}", self.summary.frames)?;
        writeln!(f, "  Frames filtered:   {}", self.dispatch.frames_filtered)?;
        writeln!(f, "  Frames matched:    {}", self.dispatch.frames_matched)?;
        writeln!(f, "  Samples decoded:   {}", self.dispatch.samples_decoded)?;
        writeln!(f, "  Values published:  {}", self.summary.emissions)?;
        writeln!(f, "  Delivery failures: {}", self.summary.delivery_failures)?;

        if self.last_values.is_empty() {
            writeln!(f, "\nNo values published.")?;
            return Ok(());
        }

        writeln!(f, "\nLast published values ({}):", self.base_topic)?;
        let width = self.last_values.iter().map(|v| v.topic.len()).max().unwrap_or(0);
        for value in &self.last_values {
            writeln!(
                f,
                "  {:<width$}  {:>10} {:<10} @ {} ms",
                value.topic,
                value.payload,
                value.unit,
                value.timestamp_ms,
                width = width
            )?;
        }
        Ok(())
    }
}
