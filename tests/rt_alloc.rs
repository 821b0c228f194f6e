use pracsim::models::{
    Gain, MeanSquareError, MseProbe, RateChanger, RateChangerParams, ToneGenerator, ToneParams,
};
use pracsim::ModelGraph;
use std::alloc::{GlobalAlloc, Layout};
use std::cell::Cell;

thread_local! {
    static ALLOC_COUNT: Cell<usize> = const { Cell::new(0) };
}

struct CountingAllocator;

unsafe impl GlobalAlloc for CountingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        ALLOC_COUNT.with(|c| c.set(c.get() + 1));
        unsafe { std::alloc::System.alloc(layout) }
    }
    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { std::alloc::System.dealloc(ptr, layout) }
    }
}

#[global_allocator]
static A: CountingAllocator = CountingAllocator;

fn allocations() -> usize {
    ALLOC_COUNT.with(|c| c.get())
}

#[test]
fn rt_alloc_invariant() {
    let mut graph = ModelGraph::new();
    let tone = graph.float_signal("tone");
    let scaled = graph.float_signal("scaled");
    let low = graph.float_signal("low");
    let high = graph.float_signal("high");
    graph.anchor(tone, 1.0 / 48000.0, 64).unwrap();
    graph
        .add_model("tone", None, |p| {
            ToneGenerator::new(p, tone, ToneParams {
                freq_hz: 440.0,
                ..ToneParams::default()
            })
        })
        .unwrap();
    graph
        .add_model("gain", None, |p| Gain::new(p, tone, scaled, 0.5))
        .unwrap();
    graph
        .add_model("down", None, |p| {
            RateChanger::new(p, scaled, low, RateChangerParams::decimate(3))
        })
        .unwrap();
    graph
        .add_model("up", None, |p| {
            RateChanger::new(p, low, high, RateChangerParams::interpolate(3))
        })
        .unwrap();
    let probe = MseProbe::default();
    let handle = probe.clone();
    graph
        .add_model("mse", None, |p| MeanSquareError::new(p, scaled, tone, handle))
        .unwrap();

    let mut sim = graph.finalize().unwrap();
    // first cycle registers log callsites
    sim.step().unwrap();
    let after_warmup = allocations();
    for _ in 0..10_000 {
        sim.step().unwrap();
    }
    assert_eq!(
        allocations(),
        after_warmup,
        "steady-state cycles should not allocate"
    );
    assert_eq!(probe.samples(), 64 * 10_001);
}
