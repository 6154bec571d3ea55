//! Signal registry
//!
//! Maps frame identifiers to the managed signals defined on them. Descriptors
//! are immutable and shared; each registration owns its own publish policy
//! state, addressed by a stable [`SignalHandle`]. The registry is built once at
//! startup and only the policy state changes afterwards.

use crate::config::GatewayConfig;
use crate::policy::PublishPolicy;
use crate::signals::{SignalDefinition, SignalDescriptor};
use crate::types::Result;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Stable index of a managed signal inside its registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SignalHandle(usize);

impl SignalHandle {
    /// Position in registration order
    pub fn index(self) -> usize {
        self.0
    }
}

/// A registered signal: shared descriptor plus its own policy state
#[derive(Debug, Clone)]
pub struct ManagedSignal {
    descriptor: Arc<SignalDescriptor>,
    policy: PublishPolicy,
}

impl ManagedSignal {
    pub fn descriptor(&self) -> &Arc<SignalDescriptor> {
        &self.descriptor
    }

    pub fn policy(&self) -> &PublishPolicy {
        &self.policy
    }

    pub(crate) fn policy_mut(&mut self) -> &mut PublishPolicy {
        &mut self.policy
    }
}

/// The signal registry
#[derive(Debug, Default)]
pub struct Registry {
    /// All managed signals in registration order
    signals: Vec<ManagedSignal>,

    /// Frame ID lookup
    /// Key: frame identifier, Value: handles in registration order
    by_frame: BTreeMap<u32, Vec<SignalHandle>>,
}

impl Registry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a signal under its frame identifier
    ///
    /// Registering the same descriptor twice yields two independent managed
    /// signals. Fails if the descriptor's bit width is outside 1-64 or the
    /// tolerance is negative or not finite.
    pub fn register(
        &mut self,
        descriptor: impl Into<Arc<SignalDescriptor>>,
        min_interval_ms: u64,
        tolerance: f64,
    ) -> Result<SignalHandle> {
        let descriptor = descriptor.into();
        descriptor.validate()?;
        let policy = PublishPolicy::new(min_interval_ms, tolerance)?;

        if descriptor.exceeds_register() {
            log::warn!(
                "Signal '{}' (ID 0x{:X}) spans bits {:?}, bits past {} read as zero",
                descriptor.name,
                descriptor.frame_id,
                descriptor.bit_range(),
                crate::signals::REGISTER_BITS
            );
        }

        for other in self.signals_for(descriptor.frame_id) {
            if other.descriptor.overlaps(&descriptor) {
                log::debug!(
                    "Signal '{}' overlaps '{}' on ID 0x{:X}",
                    descriptor.name,
                    other.descriptor.name,
                    descriptor.frame_id
                );
            }
        }

        let handle = SignalHandle(self.signals.len());
        log::debug!(
            "Registered signal: {} (ID 0x{:X}, topic: {}, interval {} ms, tolerance {})",
            descriptor.name,
            descriptor.frame_id,
            descriptor.topic,
            min_interval_ms,
            tolerance
        );

        self.by_frame
            .entry(descriptor.frame_id)
            .or_default()
            .push(handle);
        self.signals.push(ManagedSignal { descriptor, policy });

        Ok(handle)
    }

    /// Register a batch of definitions, resolving tiers against `config`
    ///
    /// Stops at the first invalid definition. Returns the number registered.
    pub fn register_definitions(
        &mut self,
        definitions: impl IntoIterator<Item = SignalDefinition>,
        config: &GatewayConfig,
    ) -> Result<usize> {
        let mut count = 0;
        for definition in definitions {
            let interval = definition.interval.resolve(config);
            self.register(definition.descriptor, interval, definition.tolerance)?;
            count += 1;
        }
        Ok(count)
    }

    /// Handles of all signals on a frame identifier, in registration order
    pub fn handles_for(&self, frame_id: u32) -> &[SignalHandle] {
        self.by_frame
            .get(&frame_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All signals on a frame identifier, in registration order
    pub fn signals_for(&self, frame_id: u32) -> impl Iterator<Item = &ManagedSignal> + '_ {
        self.handles_for(frame_id)
            .iter()
            .map(move |h| &self.signals[h.0])
    }

    /// True if at least one signal is registered on the identifier
    pub fn contains_frame(&self, frame_id: u32) -> bool {
        self.by_frame.contains_key(&frame_id)
    }

    /// Get a managed signal by handle
    pub fn get(&self, handle: SignalHandle) -> Option<&ManagedSignal> {
        self.signals.get(handle.0)
    }

    /// Find all registrations of a signal name
    pub fn find(&self, name: &str) -> Vec<SignalHandle> {
        self.signals
            .iter()
            .enumerate()
            .filter(|(_, s)| s.descriptor.name == name)
            .map(|(i, _)| SignalHandle(i))
            .collect()
    }

    /// Iterate over all managed signals in registration order
    pub fn iter(&self) -> impl Iterator<Item = (SignalHandle, &ManagedSignal)> + '_ {
        self.signals
            .iter()
            .enumerate()
            .map(|(i, s)| (SignalHandle(i), s))
    }

    /// All frame identifiers with registered signals, ascending
    pub fn frame_ids(&self) -> Vec<u32> {
        self.by_frame.keys().copied().collect()
    }

    /// Clear every signal's emission history so its next sample is emitted
    pub fn force_publish_all(&mut self) {
        log::debug!("Forcing publish of all {} signals", self.signals.len());
        for signal in &mut self.signals {
            signal.policy.reset();
        }
    }

    /// Split borrow for dispatch: the handles of a frame plus mutable signals
    pub(crate) fn route(&mut self, frame_id: u32) -> Option<(&[SignalHandle], &mut [ManagedSignal])> {
        let handles = self.by_frame.get(&frame_id)?;
        Some((handles.as_slice(), self.signals.as_mut_slice()))
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// Get registry statistics
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            num_frames: self.by_frame.len(),
            num_signals: self.signals.len(),
        }
    }
}

/// Registry statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryStats {
    /// Number of distinct frame identifiers
    pub num_frames: usize,
    /// Number of managed signals
    pub num_signals: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::PublishInterval;
    use crate::config::PublishTier;
    use crate::dispatcher::Dispatcher;
    use crate::policy::LastEmission;
    use crate::types::{Frame, TelemetryError};

    fn soc() -> SignalDescriptor {
        SignalDescriptor::fixed("SoC", 0x42F, 0, 8, 0.5, 0.0, "%", "battery/soc")
    }

    fn soh() -> SignalDescriptor {
        SignalDescriptor::fixed("SoH", 0x42F, 8, 8, 0.5, 0.0, "%", "battery/soh")
    }

    #[test]
    fn test_empty_registry() {
        let registry = Registry::new();
        let stats = registry.stats();
        assert_eq!(stats.num_frames, 0);
        assert_eq!(stats.num_signals, 0);
        assert!(registry.is_empty());
        assert!(registry.handles_for(0x42F).is_empty());
    }

    #[test]
    fn test_register_groups_by_frame() {
        let mut registry = Registry::new();
        let a = registry.register(soc(), 60_000, 0.5).unwrap();
        let b = registry.register(soh(), 300_000, 1.0).unwrap();
        let c = registry
            .register(
                SignalDescriptor::fixed("Speed", 0x140, 0, 16, 0.01, 0.0, "km/h", "motion/speed"),
                60_000,
                1.0,
            )
            .unwrap();

        assert_eq!(registry.handles_for(0x42F), &[a, b]);
        assert_eq!(registry.handles_for(0x140), &[c]);
        assert_eq!(registry.frame_ids(), vec![0x140, 0x42F]);
        assert_eq!(registry.stats(), RegistryStats { num_frames: 2, num_signals: 3 });
        assert!(registry.contains_frame(0x140));
        assert!(!registry.contains_frame(0x999));
    }

    #[test]
    fn test_duplicate_registration_is_independent() {
        let mut registry = Registry::new();
        let shared = Arc::new(soc());
        let a = registry.register(shared.clone(), 0, 0.0).unwrap();
        let b = registry.register(shared.clone(), 1_000, 2.0).unwrap();

        assert_ne!(a, b);
        assert_eq!(registry.find("SoC"), vec![a, b]);
        assert!(Arc::ptr_eq(registry.get(a).unwrap().descriptor(), &shared));
        assert_eq!(registry.get(b).unwrap().policy().min_interval_ms(), 1_000);

        // 50.0 % baseline, then 51.0 % after 500 ms, then 51.5 % after 1500 ms
        let mut dispatcher = Dispatcher::new(registry);
        let emitted: Vec<usize> = [(100u8, 0u64), (102, 500), (103, 1_500)]
            .iter()
            .map(|&(raw, t)| dispatcher.dispatch(&Frame::new(0x42F, &[raw], t)).len())
            .collect();
        // The second observer is held back by its interval, then its tolerance
        assert_eq!(emitted, vec![2, 1, 1]);

        let registry = dispatcher.registry();
        assert_eq!(
            registry.get(a).unwrap().policy().last_emission(),
            Some(LastEmission { value: 51.5, timestamp_ms: 1_500 })
        );
        assert_eq!(
            registry.get(b).unwrap().policy().last_emission(),
            Some(LastEmission { value: 50.0, timestamp_ms: 0 })
        );
    }

    #[test]
    fn test_register_rejects_invalid_width() {
        let mut registry = Registry::new();
        let mut desc = soc();
        desc.bit_length = 65;
        let result = registry.register(desc, 0, 0.0);
        assert!(matches!(result, Err(TelemetryError::InvalidSignalDefinition(_))));
        assert!(registry.is_empty());
        assert!(!registry.contains_frame(0x42F));
    }

    #[test]
    fn test_register_rejects_negative_tolerance() {
        let mut registry = Registry::new();
        let result = registry.register(soc(), 0, -1.0);
        assert!(matches!(result, Err(TelemetryError::InvalidPolicy(_))));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_overlap_is_permitted() {
        let mut registry = Registry::new();
        registry.register(soc(), 0, 0.0).unwrap();
        let nibble = SignalDescriptor::fixed("SoCLow", 0x42F, 0, 4, 1.0, 0.0, "", "battery/soc_low");
        assert!(registry.register(nibble, 0, 0.0).is_ok());
        assert_eq!(registry.handles_for(0x42F).len(), 2);
    }

    #[test]
    fn test_register_definitions_resolves_tiers() {
        let mut registry = Registry::new();
        let config = GatewayConfig::new();
        let defs = vec![
            SignalDefinition::new(soc(), PublishInterval::Tier(PublishTier::Slow), 0.5),
            SignalDefinition::new(soh(), PublishInterval::Millis(1234), 1.0),
        ];

        assert_eq!(registry.register_definitions(defs, &config).unwrap(), 2);
        let soc = registry.find("SoC")[0];
        let soh = registry.find("SoH")[0];
        assert_eq!(registry.get(soc).unwrap().policy().min_interval_ms(), 3_600_000);
        assert_eq!(registry.get(soh).unwrap().policy().min_interval_ms(), 1234);
    }

    #[test]
    fn test_force_publish_all_resets_history() {
        let mut registry = Registry::new();
        let handle = registry.register(soc(), 60_000, 0.0).unwrap();
        {
            let (_, signals) = registry.route(0x42F).unwrap();
            assert!(signals[handle.index()].policy_mut().should_emit(50.0, 0));
        }
        assert!(registry.get(handle).unwrap().policy().last_emission().is_some());

        registry.force_publish_all();
        assert!(registry.get(handle).unwrap().policy().last_emission().is_none());
    }
}
