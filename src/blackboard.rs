use parking_lot::RwLock;
use std::{sync::Arc, time::Instant};

/// Robot-side status shared between the I/O worker and the render loop.
///
/// Map and marker state is not kept here; it lives on the render thread.
#[derive(Clone, Debug, Default)]
pub struct State {
    pub localized: bool,
    pub confidence: Option<f64>,
    pub last_telemetry_ts: Option<Instant>,
    pub faults: Vec<String>,
}

pub type Blackboard = Arc<RwLock<State>>;

pub fn snapshot(bb: &Blackboard) -> State {
    (*bb.read()).clone()
}

pub fn touch_telemetry(bb: &Blackboard, localized: bool, confidence: Option<f64>) {
    let mut g = bb.write();
    g.localized = localized;
    g.confidence = confidence;
    g.last_telemetry_ts = Some(Instant::now());
}

pub fn raise_fault(bb: &Blackboard, msg: &str) {
    let mut g = bb.write();
    if !g.faults.iter().any(|s| s == msg) {
        g.faults.push(msg.to_string());
    }
}

pub fn clear_fault(bb: &Blackboard, msg: &str) {
    bb.write().faults.retain(|s| s != msg);
}
