use pracsim::models::{Gain, ToneGenerator, ToneParams};
use pracsim::{ModelGraph, SimConfig};
use std::time::Instant;

#[test]
fn rt_timing_stability() {
    // worst case here: a long chain of gains
    let config = SimConfig::default()
        .with_default_block_size(64)
        .with_default_samp_intvl(1.0 / 44100.0);
    let mut graph = ModelGraph::with_config(config);
    let mut prev = graph.float_signal("tone");
    graph
        .add_model("tone", None, |p| {
            ToneGenerator::new(p, prev, ToneParams {
                freq_hz: 440.0,
                ..ToneParams::default()
            })
        })
        .unwrap();
    for i in 0..10 {
        let next = graph.float_signal(&format!("g{i}"));
        graph
            .add_model(&format!("gain{i}"), None, |p| Gain::new(p, prev, next, 1.0))
            .unwrap();
        prev = next;
    }

    let mut sim = graph.finalize().unwrap();
    let start = Instant::now();
    for _ in 0..1000 {
        sim.step().unwrap();
    }
    let duration = start.elapsed();
    assert!(duration.as_millis() < 1000, "Execution took too long: {:?}", duration);
}
