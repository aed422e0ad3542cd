//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Once};

use evtlog::prelude::*;

static TRACING: Once = Once::new();

/// Route `tracing` output through the test harness.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

/// A platform with `Application` holding records 1..=count.
pub fn sim_with_application(count: u64) -> Arc<SimulatedPlatform> {
    init_tracing();
    let sim = Arc::new(SimulatedPlatform::new());
    sim.add_channel(
        "Application",
        (1..=count).map(|id| SimEvent::record("Application", id)),
    );
    sim
}

/// An event log over `sim` with the given batch size.
pub fn event_log(sim: &Arc<SimulatedPlatform>, batch_size: u32) -> EventLog {
    EventLog::builder()
        .simulated(sim.clone())
        .batch_size(batch_size)
        .open()
        .unwrap()
}

/// Path selecting the record id.
pub const RECORD_ID: &str = "Event/System/EventRecordID";

/// Pull the record id out of a rendered row.
pub fn record_id(row: &[Variant]) -> u64 {
    match row.first() {
        Some(Variant::UInt64(id)) => *id,
        other => panic!("expected a record id, got {:?}", other),
    }
}
