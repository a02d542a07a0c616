//! Worker-thread tests: one cycle in flight at a time, clean join on stop.

use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use scene_describer::describe::{Describe, DescribeError};
use scene_describer::voice::ScriptedVoice;
use scene_describer::{
    detect, Controller, ControllerHandle, CyclePhase, Frame, FrameStore, StubDetector,
};

/// Describe impl that parks until the test releases it, counting calls.
struct GatedDescribe {
    gate: Mutex<Receiver<()>>,
    calls: Arc<Mutex<u32>>,
}

impl Describe for GatedDescribe {
    fn describe(&self, _jpeg: &[u8], _labels: &[String]) -> Result<String, DescribeError> {
        *self.calls.lock().unwrap() += 1;
        // Block until the test opens the gate, simulating a slow service.
        let _ = self.gate.lock().unwrap().recv();
        Ok("A person is typing.".to_string())
    }
}

fn gated_setup() -> (ControllerHandle, Sender<()>, Arc<Mutex<u32>>, ScriptedVoice) {
    let store = FrameStore::new();
    store.publish(Frame::new(vec![7u8; 8 * 8 * 3], 8, 8, 1));

    let (gate_tx, gate_rx) = channel();
    let calls = Arc::new(Mutex::new(0u32));
    let client = GatedDescribe {
        gate: Mutex::new(gate_rx),
        calls: calls.clone(),
    };

    // Script: the single confirmation listen times out, ending the cycle.
    let voice = ScriptedVoice::new();

    let controller = Controller::new(
        store,
        detect::share(StubDetector::new()),
        Box::new(client),
        Box::new(voice.clone()),
        Duration::from_millis(10),
    );
    (ControllerHandle::spawn(controller), gate_tx, calls, voice)
}

#[test]
fn second_trigger_is_dropped_while_cycle_in_flight() {
    let (handle, gate_tx, calls, _voice) = gated_setup();

    assert!(handle.trigger(), "first trigger accepted");

    // Wait for the worker to reach the blocking describe call.
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while *calls.lock().unwrap() == 0 {
        assert!(std::time::Instant::now() < deadline, "worker never started");
        std::thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(handle.phase(), CyclePhase::Describing);

    // A cycle is unresolved: new triggers must be rejected, not queued.
    assert!(!handle.trigger());
    assert!(!handle.trigger());

    gate_tx.send(()).expect("open gate");
    handle.stop().expect("join worker");

    assert_eq!(*calls.lock().unwrap(), 1, "exactly one request issued");
}

#[test]
fn stop_joins_after_in_flight_cycle_completes() {
    let (handle, gate_tx, calls, voice) = gated_setup();

    assert!(handle.trigger());
    gate_tx.send(()).expect("open gate");
    handle.stop().expect("join worker");

    assert_eq!(*calls.lock().unwrap(), 1);
    let spoken = voice.spoken();
    assert_eq!(spoken.first().map(String::as_str), Some("A person is typing."));
}
