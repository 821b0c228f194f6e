//! PPT invariant system: setup-time invariant enforcement with contract tracking.
//!
//! Only graph construction, finalization and initialization assert invariants.
//! The cycle loop in `rt.rs` never touches the log (it takes a lock).

#[cfg(feature = "ppt")]
use lazy_static::lazy_static;
#[cfg(feature = "ppt")]
use std::collections::HashSet;
#[cfg(feature = "ppt")]
use std::sync::Mutex;

pub const SIGNAL_SINGLE_PRODUCER: u32 = 1;
pub const SIGNAL_HAS_PRODUCER: u32 = 2;
pub const MODELS_CONSTRUCTED: u32 = 3;
pub const PLAN_SOUNDNESS: u32 = 4;
pub const PLAN_REJECTS_CYCLES: u32 = 5;
pub const PLAN_COVERS_ALL_MODELS: u32 = 6;
pub const BLOCK_SIZES_RESOLVED: u32 = 7;
pub const BUFFERS_ALLOCATED: u32 = 8;
pub const RATE_CHANGER_DRAINS: u32 = 9;

#[cfg(feature = "ppt")]
lazy_static! {
    static ref INVARIANT_LOG: Mutex<HashSet<u32>> = Mutex::new(HashSet::new());
}

fn failure_message(id: u32, message: &str, context: Option<&str>) -> String {
    match context {
        Some(ctx) => format!("invariant {} ({}) violated: {message} [{ctx}]", invariant_name(id), id),
        None => format!("invariant {} ({}) violated: {message}", invariant_name(id), id),
    }
}

/// Check a setup-time invariant, recording it under the `ppt` feature.
///
/// Panics with the invariant's name when `condition` is false.
pub(crate) fn assert_invariant(id: u32, condition: bool, message: &str, context: Option<&str>) {
    if !condition {
        let full = failure_message(id, message, context);
        tracing::error!("{full}");
        panic!("{full}");
    }
    record(id);
}

#[cfg(feature = "ppt")]
fn record(id: u32) {
    if let Ok(mut log) = INVARIANT_LOG.lock() {
        log.insert(id);
    }
}

#[cfg(not(feature = "ppt"))]
fn record(_id: u32) {}

/// Panics unless every listed invariant has been asserted at least once in this process.
#[cfg(feature = "ppt")]
pub fn contract_test(test_name: &str, required_invariants: &[u32]) {
    let missing: Vec<&'static str> = match INVARIANT_LOG.lock() {
        Ok(log) => required_invariants
            .iter()
            .filter(|&&id| !log.contains(&id))
            .map(|&id| invariant_name(id))
            .collect(),
        Err(_) => required_invariants.iter().map(|&id| invariant_name(id)).collect(),
    };
    if !missing.is_empty() {
        panic!("contract '{test_name}': never asserted {missing:?}");
    }
}

#[cfg(not(feature = "ppt"))]
pub fn contract_test(_test_name: &str, _required_invariants: &[u32]) {}

/// Human-readable name of an invariant id.
pub const fn invariant_name(id: u32) -> &'static str {
    match id {
        SIGNAL_SINGLE_PRODUCER => "SIGNAL_SINGLE_PRODUCER",
        SIGNAL_HAS_PRODUCER => "SIGNAL_HAS_PRODUCER",
        MODELS_CONSTRUCTED => "MODELS_CONSTRUCTED",
        PLAN_SOUNDNESS => "PLAN_SOUNDNESS",
        PLAN_REJECTS_CYCLES => "PLAN_REJECTS_CYCLES",
        PLAN_COVERS_ALL_MODELS => "PLAN_COVERS_ALL_MODELS",
        BLOCK_SIZES_RESOLVED => "BLOCK_SIZES_RESOLVED",
        BUFFERS_ALLOCATED => "BUFFERS_ALLOCATED",
        RATE_CHANGER_DRAINS => "RATE_CHANGER_DRAINS",
        _ => "UNKNOWN",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "BUFFERS_ALLOCATED")]
    fn failed_invariant_panics_with_its_name() {
        assert_invariant(BUFFERS_ALLOCATED, false, "signal x has no storage", Some("x"));
    }

    #[test]
    fn asserted_invariant_satisfies_contract() {
        assert_invariant(PLAN_SOUNDNESS, true, "order respects edges", None);
        contract_test("plan soundness", &[PLAN_SOUNDNESS]);
    }

    #[test]
    fn failure_message_carries_context() {
        let msg = failure_message(SIGNAL_SINGLE_PRODUCER, "two producers", Some("sig"));
        assert!(msg.contains("SIGNAL_SINGLE_PRODUCER (1)"));
        assert!(msg.ends_with("[sig]"));
        assert_eq!(invariant_name(255), "UNKNOWN");
    }
}
