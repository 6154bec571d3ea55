// End-to-end behavior of decode + publish policy + dispatch
use can_telemetry::signals::catalog::{self, frame_ids};
use can_telemetry::{
    Dispatcher, Emission, Frame, FrameDecoder, GatewayConfig, Registry, SignalDescriptor,
};
use std::collections::{BTreeSet, VecDeque};

fn descriptor(name: &'static str, frame_id: u32, start_bit: u16, bit_length: u16) -> SignalDescriptor {
    SignalDescriptor::fixed(name, frame_id, start_bit, bit_length, 1.0, 0.0, "", "test")
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn round_trip_scaling() {
    let desc = SignalDescriptor::fixed("Volt", 0x645, 0, 16, 0.1, 0.0, "V", "battery/voltage");
    let raw = 1234u16.to_le_bytes();
    let frame = Frame::new(0x645, &[raw[0], raw[1], 0, 0, 0, 0, 0, 0], 0);

    assert!(approx(FrameDecoder::decode(&frame, &desc), 123.4));
}

#[test]
fn sign_extension_on_current_field() {
    let desc = catalog::find("BatteryCurrent").unwrap();
    let frame = Frame::new(frame_ids::BATTERY_POWER, &[0, 0, 0xFF, 0xFF, 0, 0, 0, 0], 0);

    assert!(approx(FrameDecoder::decode(&frame, desc), -1638.5));
}

#[test]
fn zero_length_frame_returns_offset() {
    for entry in catalog::entries() {
        let desc = &entry.definition.descriptor;
        let frame = Frame::with_dlc(desc.frame_id, 0, [0xAA; 8], 0);
        assert_eq!(FrameDecoder::decode(&frame, desc), desc.offset, "{}", desc.name);
    }
}

#[test]
fn interval_gate() {
    let build = || {
        let mut registry = Registry::new();
        registry.register(descriptor("Level", 0x10, 0, 8), 60_000, 0.0).unwrap();
        Dispatcher::new(registry)
    };

    let mut close = build();
    assert_eq!(close.dispatch(&Frame::new(0x10, &[1], 1_000)).len(), 1);
    assert!(close.dispatch(&Frame::new(0x10, &[2], 1_010)).is_empty());

    let mut far = build();
    assert_eq!(far.dispatch(&Frame::new(0x10, &[1], 1_000)).len(), 1);
    assert_eq!(far.dispatch(&Frame::new(0x10, &[2], 62_000)).len(), 1);
}

#[test]
fn tolerance_gate() {
    let mut registry = Registry::new();
    registry
        .register(
            SignalDescriptor::fixed("Temp", 0x20, 0, 16, 0.1, 0.0, "°C", "climate/temp"),
            0,
            0.5,
        )
        .unwrap();
    let mut dispatcher = Dispatcher::new(registry);

    // 10.0, 10.3, 10.6
    let samples = [(100u16, 0u64), (103, 1), (106, 2)];
    let emitted: Vec<bool> = samples
        .iter()
        .map(|&(raw, t)| {
            let b = raw.to_le_bytes();
            !dispatcher.dispatch(&Frame::new(0x20, &b, t)).is_empty()
        })
        .collect();

    assert_eq!(emitted, vec![true, false, true]);
}

#[test]
fn unknown_frame_leaves_state_untouched() {
    init_logging();
    let mut registry = Registry::new();
    catalog::register_catalog(&mut registry, &GatewayConfig::new()).unwrap();
    let mut dispatcher = Dispatcher::new(registry);

    assert!(dispatcher.dispatch(&Frame::new(0x7DF, &[0xFF; 8], 5)).is_empty());
    assert!(dispatcher
        .registry()
        .iter()
        .all(|(_, s)| s.policy().last_emission().is_none()));
}

#[test]
fn registration_order_does_not_change_result_set() {
    // Each signal keeps its own interval and tolerance whatever its position
    let a = (descriptor("A", 0x30, 0, 12), 1_000u64, 2.0);
    let b = (descriptor("B", 0x30, 4, 8), 500u64, 1.0); // overlapping sub-field

    let frames: Vec<Frame> = (0..20u64)
        .map(|i| Frame::new(0x30, &[(i * 37) as u8, (i * 11) as u8], i * 400))
        .collect();

    type Registration = (SignalDescriptor, u64, f64);
    let run = |order: [&Registration; 2]| {
        let mut registry = Registry::new();
        for (desc, interval, tolerance) in order {
            registry.register(desc.clone(), *interval, *tolerance).unwrap();
        }
        let mut dispatcher = Dispatcher::new(registry);

        frames
            .iter()
            .map(|f| {
                dispatcher
                    .dispatch(f)
                    .iter()
                    .map(|e| (e.name().to_string(), e.value.to_bits()))
                    .collect::<BTreeSet<_>>()
            })
            .collect::<Vec<_>>()
    };

    let forward = run([&a, &b]);
    assert_eq!(forward, run([&b, &a]));
    assert!(forward.iter().any(|set| set.len() == 2));
}

#[test]
fn catalog_end_to_end_drain() {
    init_logging();
    let mut registry = Registry::new();
    catalog::register_catalog(&mut registry, &GatewayConfig::new()).unwrap();
    let mut dispatcher = Dispatcher::new(registry);

    // 4000 -> 400.0 V, 16384 + 200 -> 20.0 A, 32768 would be negative so 32000 -> -76.8 kW
    let power = |t| {
        let mut data = [0u8; 8];
        data[0..2].copy_from_slice(&4000u16.to_le_bytes());
        data[2..4].copy_from_slice(&16584u16.to_le_bytes());
        data[4..6].copy_from_slice(&32000u16.to_le_bytes());
        Frame::new(frame_ids::BATTERY_POWER, &data, t)
    };

    let mut source: VecDeque<Frame> = VecDeque::from(vec![power(0), power(1_000), power(61_000)]);
    let mut sink: Vec<Emission> = Vec::new();
    let summary = dispatcher.drain(&mut source, &mut sink, usize::MAX);

    assert_eq!(summary.frames, 3);
    // Baseline emits all three; the 1 s repeat is rate limited; the 61 s
    // repeat is unchanged and therefore below every tolerance
    assert_eq!(summary.emissions, 3);

    let by_name = |name: &str| sink.iter().find(|e| e.name() == name).unwrap().value;
    assert!(approx(by_name("BatteryVoltage"), 400.0));
    assert!(approx(by_name("BatteryCurrent"), 20.0));
    assert!(approx(by_name("BatteryPower"), -76.8));
    assert_eq!(sink[1].topic("vehicle/zoe"), "vehicle/zoe/battery/current");

    let stats = dispatcher.stats();
    assert_eq!(stats.frames_processed, 3);
    assert_eq!(stats.samples_decoded, 9);
    assert_eq!(stats.emissions, 3);
}
