// demos/ratechange.rs
use pracsim::models::{
    RateChanger, RateChangerParams, Recording, SignalRecorder, ToneGenerator, ToneParams, WavSink,
};
use pracsim::{ModelGraph, SimConfig};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = SimConfig::from_env().unwrap().with_progress_interval(100);
    let mut graph = ModelGraph::with_config(config);
    let tone = graph.float_signal("tone");
    let low = graph.float_signal("low");
    let restored = graph.float_signal("restored");

    // 220 Hz tone at 44.1 kHz, 441 samples per block
    graph.anchor(tone, 1.0 / 44_100.0, 441).unwrap();
    graph
        .add_model("osc", None, |p| {
            ToneGenerator::new(p, tone, ToneParams {
                freq_hz: 220.0,
                amplitude: 0.5,
                ..ToneParams::default()
            })
        })
        .unwrap();
    graph
        .add_model("down", None, |p| {
            RateChanger::new(p, tone, low, RateChangerParams::decimate(3))
        })
        .unwrap();
    graph
        .add_model("up", None, |p| {
            RateChanger::new(p, low, restored, RateChangerParams::interpolate(3))
        })
        .unwrap();
    let recording = Recording::default();
    let handle = recording.clone();
    graph
        .add_model("rec", None, |p| SignalRecorder::new(p, low, handle))
        .unwrap();
    graph
        .add_model("wav", None, |p| WavSink::new(p, restored, "ratechange.wav"))
        .unwrap();

    let mut sim = graph.finalize().unwrap();
    println!(
        "tone {} samples/block, low {} samples/block at {:.0} Hz",
        sim.block_size(tone).unwrap(),
        sim.block_size(low).unwrap(),
        1.0 / sim.samp_intvl(low).unwrap()
    );

    // one second of audio
    let summary = sim.run(100).unwrap();
    sim.teardown().unwrap();

    let lengths = recording.valid_lengths();
    println!(
        "ran {} cycles, {} partial blocks, first low-rate blocks {:?}",
        summary.cycles,
        summary.partial_productions,
        &lengths[..lengths.len().min(5)]
    );
    println!("Generated ratechange.wav - a 220Hz tone after 3x down and up sampling");
}
