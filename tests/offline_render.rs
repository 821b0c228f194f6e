use pracsim::models::{Gain, Recording, SignalRecorder, ToneGenerator, ToneParams, VectorSource, WavSink};
use pracsim::{ModelGraph, SimConfig};

fn tone_graph(config: SimConfig, recording: &Recording<f32>) -> ModelGraph {
    let mut graph = ModelGraph::with_config(config);
    let x = graph.float_signal("tone");
    graph
        .add_model("tone", None, |p| {
            ToneGenerator::new(p, x, ToneParams {
                freq_hz: 440.0,
                amplitude: 0.8,
                phase_deg: 30.0,
            })
        })
        .unwrap();
    let handle = recording.clone();
    graph
        .add_model("rec", None, |p| SignalRecorder::new(p, x, handle))
        .unwrap();
    graph
}

#[test]
fn offline_render_determinism() {
    let config = SimConfig::default()
        .with_cycles(8)
        .with_default_block_size(64)
        .with_default_samp_intvl(1.0 / 44100.0);
    let (first, second) = (Recording::default(), Recording::default());
    let mut sim1 = tone_graph(config.clone(), &first).finalize().unwrap();
    let mut sim2 = tone_graph(config, &second).finalize().unwrap();
    assert_eq!(sim1.run_configured().unwrap().cycles, 8);
    assert_eq!(sim2.run_configured().unwrap().cycles, 8);
    assert_eq!(first.frames(), second.frames(), "offline renders should be identical");
    assert_eq!(first.concatenated().len(), 8 * 64);
    assert!((first.concatenated()[0] - 0.4).abs() < 1e-6);
}

#[test]
fn cycles_come_from_the_environment_lookup() {
    let config = SimConfig::from_lookup(|key| match key {
        "PRACSIM_CYCLES" => Some("3".to_string()),
        "PRACSIM_BLOCK_SIZE" => Some("16".to_string()),
        _ => None,
    })
    .unwrap();
    let recording = Recording::default();
    let mut sim = tone_graph(config, &recording).finalize().unwrap();
    let summary = sim.run_configured().unwrap();
    assert_eq!(summary.cycles, 3);
    assert_eq!(recording.valid_lengths(), vec![16, 16, 16]);
}

#[test]
fn exhaustion_can_be_ignored() {
    let config = SimConfig::default().with_cycles(6).run_past_exhaustion();
    let mut graph = ModelGraph::with_config(config);
    let x = graph.float_signal("x");
    graph.anchor(x, 1.0, 2).unwrap();
    graph
        .add_model("src", None, |p| VectorSource::new(p, x, vec![1.0, 2.0, 3.0]))
        .unwrap();
    let recording = Recording::default();
    let handle = recording.clone();
    graph
        .add_model("rec", None, |p| SignalRecorder::new(p, x, handle))
        .unwrap();
    let mut sim = graph.finalize().unwrap();
    let summary = sim.run_configured().unwrap();
    assert_eq!(summary.cycles, 6);
    assert!(summary.exhausted);
    assert_eq!(recording.valid_lengths(), vec![2, 1, 0, 0, 0, 0]);
}

#[test]
fn tone_renders_to_wav() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tone.wav");
    let config = SimConfig::default()
        .with_cycles(10)
        .with_default_block_size(441)
        .with_default_samp_intvl(1.0 / 44100.0);
    let mut graph = ModelGraph::with_config(config);
    let x = graph.float_signal("tone");
    let y = graph.float_signal("quiet");
    graph
        .add_model("tone", None, |p| ToneGenerator::new(p, x, ToneParams::default()))
        .unwrap();
    graph
        .add_model("gain", None, |p| Gain::new(p, x, y, 0.25))
        .unwrap();
    let wav_path = path.clone();
    graph
        .add_model("wav", None, |p| WavSink::new(p, y, wav_path))
        .unwrap();
    let mut sim = graph.finalize().unwrap();
    sim.run_configured().unwrap();
    sim.teardown().unwrap();

    let reader = hound::WavReader::open(&path).unwrap();
    assert_eq!(reader.spec().sample_rate, 44100);
    assert_eq!(reader.spec().channels, 1);
    assert_eq!(reader.len(), 4410);
}
