//! Describe-and-retry controller.
//!
//! One user trigger runs one cycle: snapshot the latest frame, detect, send
//! the frame + labels to the description service, speak the caption, then ask
//! whether to go again and listen for a short answer. An affirmative answer
//! re-enters detection against a fresh frame snapshot; anything else (a "no",
//! a timeout, garbled audio, a dead microphone) ends the cycle.
//!
//! Cycles run on a single reusable worker thread so the blocking voice and
//! network calls never stall the display loop. The worker processes one cycle
//! at a time; a trigger arriving while a cycle is in flight is dropped with a
//! log line, which is what keeps the at-most-one-request-in-flight invariant.

use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::describe::Describe;
use crate::detect::SharedDetector;
use crate::frame::FrameStore;
use crate::voice::{ListenError, VoiceChannel};

const CONFIRM_PROMPT: &str = "Would you like to detect again?";
const FAILURE_NOTICE: &str = "Sorry, I could not describe the scene.";

/// Words that count as "go again". Matched as substrings of the lowercased
/// transcript, so "yes please" and "sure, again" both pass.
const AFFIRMATIVE_TOKENS: &[&str] = &["yes", "yeah", "yep", "sure", "again"];

/// Where the controller currently is in a cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    Detecting,
    Describing,
    Speaking,
    AwaitingConfirmation,
}

impl CyclePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            CyclePhase::Idle => "idle",
            CyclePhase::Detecting => "detecting",
            CyclePhase::Describing => "describing",
            CyclePhase::Speaking => "speaking",
            CyclePhase::AwaitingConfirmation => "awaiting_confirmation",
        }
    }
}

/// What one confirmation utterance decided.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Confirmation {
    Again,
    Stop,
}

/// Classify a confirmation transcript. Anything without an affirmative token
/// means stop.
pub fn classify_confirmation(transcript: &str) -> Confirmation {
    let lowered = transcript.to_lowercase();
    if AFFIRMATIVE_TOKENS
        .iter()
        .any(|token| lowered.contains(token))
    {
        Confirmation::Again
    } else {
        Confirmation::Stop
    }
}

/// How one triggered cycle ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    /// At least one caption was produced and spoken. `rounds` counts the
    /// detect→describe→speak passes, including voice-confirmed retries.
    Completed { caption: String, rounds: u32 },
    /// Nothing captured yet; quiet no-op.
    NoFrame,
    /// A detect/describe/speak step failed; the error was surfaced and the
    /// cycle aborted.
    Failed(String),
}

/// The describe-and-retry state machine.
///
/// Owns its collaborators (injected at construction) and a shared phase cell
/// observable by the status endpoint. The display loop is the only writer of
/// `store`; the controller only takes snapshots.
pub struct Controller {
    store: FrameStore,
    detector: SharedDetector,
    client: Box<dyn Describe>,
    voice: Box<dyn VoiceChannel>,
    listen_timeout: Duration,
    phase: Arc<Mutex<CyclePhase>>,
}

impl Controller {
    pub fn new(
        store: FrameStore,
        detector: SharedDetector,
        client: Box<dyn Describe>,
        voice: Box<dyn VoiceChannel>,
        listen_timeout: Duration,
    ) -> Self {
        Self {
            store,
            detector,
            client,
            voice,
            listen_timeout,
            phase: Arc::new(Mutex::new(CyclePhase::Idle)),
        }
    }

    pub fn phase_cell(&self) -> Arc<Mutex<CyclePhase>> {
        self.phase.clone()
    }

    fn set_phase(&self, phase: CyclePhase) {
        *self.phase.lock().unwrap_or_else(|e| e.into_inner()) = phase;
    }

    /// Run one full cycle synchronously: detect → describe → speak, then loop
    /// through voice confirmations until the user stops or something fails.
    ///
    /// Steps within the cycle are strictly sequential; whatever happens, the
    /// controller lands back in `Idle`.
    pub fn run_cycle(&mut self) -> CycleOutcome {
        let mut rounds = 0u32;
        let mut last_caption: Option<String> = None;

        let outcome = loop {
            self.set_phase(CyclePhase::Detecting);
            let Some(frame) = self.store.snapshot() else {
                log::info!("describe cycle: no frame captured yet, nothing to describe");
                break match last_caption.take() {
                    Some(caption) => CycleOutcome::Completed { caption, rounds },
                    None => CycleOutcome::NoFrame,
                };
            };

            let labels = match self.detect_labels(&frame) {
                Ok(labels) => labels,
                Err(e) => break self.abort(format!("detection failed: {}", e)),
            };

            self.set_phase(CyclePhase::Describing);
            let caption = match self.describe_frame(&frame, &labels) {
                Ok(caption) => caption,
                Err(e) => break self.abort(e),
            };
            log::info!("description: {}", caption);

            self.set_phase(CyclePhase::Speaking);
            if let Err(e) = self.voice.speak(&caption) {
                break self.abort(format!("speak caption: {}", e));
            }
            rounds += 1;
            last_caption = Some(caption);

            match self.confirm_again() {
                Confirmation::Again => {
                    log::info!("confirmation: retrying detection");
                    continue;
                }
                Confirmation::Stop => {
                    log::info!("confirmation: detection stopped");
                    break CycleOutcome::Completed {
                        caption: last_caption.take().unwrap_or_default(),
                        rounds,
                    };
                }
            }
        };

        self.set_phase(CyclePhase::Idle);
        outcome
    }

    fn detect_labels(&self, frame: &crate::frame::Frame) -> Result<Vec<String>> {
        let mut detector = self
            .detector
            .lock()
            .map_err(|_| anyhow!("detector lock poisoned"))?;
        let result = detector.detect(frame)?;
        Ok(result.labels)
    }

    /// Issue the description request. An empty label set still sends the
    /// request; labels are optional context, not a precondition.
    fn describe_frame(
        &self,
        frame: &crate::frame::Frame,
        labels: &[String],
    ) -> Result<String, String> {
        let jpeg = frame
            .encode_jpeg()
            .map_err(|e| format!("encode frame: {}", e))?;
        self.client.describe(&jpeg, labels).map_err(|e| {
            log::error!("description request failed: {}", e);
            e.to_string()
        })
    }

    /// Ask for confirmation and classify the answer. Every listen failure is
    /// a deliberate implicit stop, never escalated or retried, so an
    /// ambiguous microphone can't spin the cycle forever.
    fn confirm_again(&mut self) -> Confirmation {
        self.set_phase(CyclePhase::AwaitingConfirmation);
        if let Err(e) = self.voice.speak(CONFIRM_PROMPT) {
            log::warn!("confirmation prompt failed, stopping: {}", e);
            return Confirmation::Stop;
        }
        match self.voice.listen(self.listen_timeout) {
            Ok(transcript) => {
                log::info!("confirmation transcript: {:?}", transcript);
                classify_confirmation(&transcript)
            }
            Err(err @ ListenError::Timeout)
            | Err(err @ ListenError::Unintelligible)
            | Err(err @ ListenError::Device(_)) => {
                log::info!("confirmation listen failed, treating as stop: {}", err);
                Confirmation::Stop
            }
        }
    }

    /// Surface a step failure and terminate the cycle: log it, speak the
    /// generic failure notice, land in Idle via the caller.
    fn abort(&mut self, reason: String) -> CycleOutcome {
        log::error!("describe cycle aborted: {}", reason);
        self.set_phase(CyclePhase::Speaking);
        if let Err(e) = self.voice.speak(FAILURE_NOTICE) {
            log::warn!("failure notice playback failed: {}", e);
        }
        CycleOutcome::Failed(reason)
    }
}

/// Handle to the controller worker thread.
///
/// One reusable worker serves all triggers; `stop` closes the trigger queue
/// and joins the worker, so the process has an explicit point where no cycle
/// is left running.
pub struct ControllerHandle {
    trigger_tx: Option<Sender<()>>,
    in_flight: Arc<AtomicBool>,
    phase: Arc<Mutex<CyclePhase>>,
    join: Option<JoinHandle<()>>,
}

impl ControllerHandle {
    /// Spawn the worker thread for a controller.
    pub fn spawn(mut controller: Controller) -> Self {
        let phase = controller.phase_cell();
        let in_flight = Arc::new(AtomicBool::new(false));
        let worker_flag = in_flight.clone();
        let (trigger_tx, trigger_rx) = channel::<()>();
        let join = std::thread::spawn(move || {
            while trigger_rx.recv().is_ok() {
                match controller.run_cycle() {
                    CycleOutcome::Completed { rounds, .. } => {
                        log::info!("describe cycle completed after {} round(s)", rounds);
                    }
                    CycleOutcome::NoFrame => {}
                    CycleOutcome::Failed(reason) => {
                        log::warn!("describe cycle failed: {}", reason);
                    }
                }
                worker_flag.store(false, Ordering::SeqCst);
            }
        });
        Self {
            trigger_tx: Some(trigger_tx),
            in_flight,
            phase,
            join: Some(join),
        }
    }

    /// Request a cycle. Returns false when a cycle is already in flight, in
    /// which case the trigger is dropped.
    ///
    /// The in-flight flag is claimed here and released by the worker once the
    /// cycle finishes, so while one trigger is pending or running every later
    /// trigger is rejected rather than queued.
    pub fn trigger(&self) -> bool {
        let Some(tx) = &self.trigger_tx else {
            return false;
        };
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            log::info!("describe trigger dropped: a cycle is already running");
            return false;
        }
        if tx.send(()).is_err() {
            self.in_flight.store(false, Ordering::SeqCst);
            return false;
        }
        true
    }

    /// Current phase, for status reporting.
    pub fn phase(&self) -> CyclePhase {
        *self.phase.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Close the trigger queue and wait for the in-flight cycle, if any, to
    /// finish. No cancellation: a started cycle runs to completion or to its
    /// listen timeout.
    pub fn stop(mut self) -> Result<()> {
        self.trigger_tx.take();
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("controller worker thread panicked"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::describe::DescribeError;
    use crate::detect::{share, Detector, DetectionResult};
    use crate::frame::Frame;
    use crate::voice::{ScriptedReply, ScriptedVoice};
    use std::collections::VecDeque;

    fn frame(seq: u64) -> Frame {
        Frame::new(vec![seq as u8; 8 * 8 * 3], 8, 8, seq)
    }

    /// Detector that reports fixed labels and records which frames it saw.
    struct FixedDetector {
        labels: Vec<String>,
        seen: Arc<Mutex<Vec<u64>>>,
    }

    impl Detector for FixedDetector {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn detect(&mut self, frame: &Frame) -> Result<DetectionResult> {
            self.seen.lock().unwrap().push(frame.seq);
            let objects = self
                .labels
                .iter()
                .map(|label| crate::detect::DetectedObject {
                    x: 0.1,
                    y: 0.1,
                    w: 0.2,
                    h: 0.2,
                    confidence: 0.9,
                    label: label.clone(),
                })
                .collect();
            Ok(DetectionResult::from_objects(frame, objects))
        }
    }

    /// Describe fake replaying queued replies and recording label sets.
    #[derive(Clone, Default)]
    struct FakeDescribe {
        replies: Arc<Mutex<VecDeque<Result<String, DescribeError>>>>,
        requests: Arc<Mutex<Vec<Vec<String>>>>,
        publish_on_call: Arc<Mutex<Option<(FrameStore, u64)>>>,
    }

    impl FakeDescribe {
        fn push_caption(&self, caption: &str) {
            self.replies
                .lock()
                .unwrap()
                .push_back(Ok(caption.to_string()));
        }

        fn push_error(&self, err: DescribeError) {
            self.replies.lock().unwrap().push_back(Err(err));
        }

        fn requests(&self) -> Vec<Vec<String>> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl Describe for FakeDescribe {
        fn describe(&self, _jpeg: &[u8], labels: &[String]) -> Result<String, DescribeError> {
            self.requests.lock().unwrap().push(labels.to_vec());
            // Optional hook: simulate the display loop publishing a newer
            // frame while the service call is in flight.
            if let Some((store, seq)) = self.publish_on_call.lock().unwrap().take() {
                store.publish(frame(seq));
            }
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(DescribeError::Transport("script exhausted".into())))
        }
    }

    fn controller_with(
        store: FrameStore,
        labels: &[&str],
        client: FakeDescribe,
        voice: ScriptedVoice,
    ) -> (Controller, Arc<Mutex<Vec<u64>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let detector = share(FixedDetector {
            labels: labels.iter().map(|s| s.to_string()).collect(),
            seen: seen.clone(),
        });
        let controller = Controller::new(
            store,
            detector,
            Box::new(client),
            Box::new(voice),
            Duration::from_millis(10),
        );
        (controller, seen)
    }

    #[test]
    fn classify_requires_affirmative_token() {
        assert_eq!(classify_confirmation("yes please"), Confirmation::Again);
        assert_eq!(classify_confirmation("YEAH"), Confirmation::Again);
        assert_eq!(classify_confirmation("no thanks"), Confirmation::Stop);
        assert_eq!(classify_confirmation(""), Confirmation::Stop);
    }

    #[test]
    fn no_frame_is_a_quiet_no_op() {
        let voice = ScriptedVoice::new();
        let client = FakeDescribe::default();
        let (mut controller, _) =
            controller_with(FrameStore::new(), &["cup"], client.clone(), voice.clone());

        assert_eq!(controller.run_cycle(), CycleOutcome::NoFrame);
        assert_eq!(*controller.phase_cell().lock().unwrap(), CyclePhase::Idle);
        assert!(voice.spoken().is_empty());
        assert!(client.requests().is_empty());
    }

    #[test]
    fn caption_is_spoken_then_confirmation_prompted() {
        let store = FrameStore::new();
        store.publish(frame(1));
        let voice = ScriptedVoice::new();
        voice.push_reply(ScriptedReply::Timeout);
        let client = FakeDescribe::default();
        client.push_caption("A person is typing.");

        let (mut controller, _) =
            controller_with(store, &["cup", "laptop"], client.clone(), voice.clone());
        let outcome = controller.run_cycle();

        assert_eq!(
            outcome,
            CycleOutcome::Completed {
                caption: "A person is typing.".to_string(),
                rounds: 1
            }
        );
        assert_eq!(
            voice.spoken(),
            vec!["A person is typing.".to_string(), CONFIRM_PROMPT.to_string()]
        );
        assert_eq!(client.requests(), vec![vec!["cup".to_string(), "laptop".to_string()]]);
    }

    #[test]
    fn service_error_speaks_failure_notice_and_aborts() {
        let store = FrameStore::new();
        store.publish(frame(1));
        let voice = ScriptedVoice::new();
        let client = FakeDescribe::default();
        client.push_error(DescribeError::Service {
            status: 500,
            body: "boom".to_string(),
        });

        let (mut controller, _) = controller_with(store, &[], client, voice.clone());
        match controller.run_cycle() {
            CycleOutcome::Failed(reason) => assert!(reason.contains("500")),
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(voice.spoken(), vec![FAILURE_NOTICE.to_string()]);
    }

    #[test]
    fn affirmative_confirmation_reruns_against_fresh_frame() {
        let store = FrameStore::new();
        store.publish(frame(1));
        let voice = ScriptedVoice::new();
        voice.push_heard("yes please");
        voice.push_heard("stop now");
        let client = FakeDescribe::default();
        client.push_caption("First look.");
        client.push_caption("Second look.");
        // Newer frame lands while the first request is in flight.
        *client.publish_on_call.lock().unwrap() = Some((store.clone(), 2));

        let (mut controller, seen) = controller_with(store, &["cup"], client, voice.clone());
        let outcome = controller.run_cycle();

        assert_eq!(
            outcome,
            CycleOutcome::Completed {
                caption: "Second look.".to_string(),
                rounds: 2
            }
        );
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn listen_timeout_always_lands_in_idle() {
        let store = FrameStore::new();
        store.publish(frame(1));
        let voice = ScriptedVoice::new();
        voice.push_reply(ScriptedReply::Timeout);
        let client = FakeDescribe::default();
        client.push_caption("One pass.");

        let (mut controller, _) = controller_with(store, &[], client.clone(), voice);
        let outcome = controller.run_cycle();
        assert!(matches!(outcome, CycleOutcome::Completed { rounds: 1, .. }));
        assert_eq!(*controller.phase_cell().lock().unwrap(), CyclePhase::Idle);
        // Exactly one request issued despite the timeout.
        assert_eq!(client.requests().len(), 1);
    }

    #[test]
    fn empty_label_set_still_issues_the_request() {
        let store = FrameStore::new();
        store.publish(frame(1));
        let voice = ScriptedVoice::new();
        voice.push_reply(ScriptedReply::Unintelligible);
        let client = FakeDescribe::default();
        client.push_caption("An empty desk.");

        let (mut controller, _) = controller_with(store, &[], client.clone(), voice);
        controller.run_cycle();
        assert_eq!(client.requests(), vec![Vec::<String>::new()]);
    }
}
