use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::camera::session::CameraSession;
use crate::error::PipelineError;
use crate::gesture::catalog::SignCatalog;
use crate::gesture::stabilizer::Stabilizer;
use crate::pipeline::detection_loop;
use crate::pipeline::detector::DetectorFactory;
use crate::pipeline::model_loader::ModelLoader;
use crate::pipeline::scheduler::FrameScheduler;
use crate::render::overlay::OverlayRenderer;

pub const MODEL_LOAD_MESSAGE: &str = "unable to load recognition model, retry";
pub const DETECT_TIMEOUT_MESSAGE: &str = "recognition model stopped responding, retry";

/// Lifecycle of the camera and model together.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DetectionState {
    #[default]
    Idle,
    Loading,
    Active,
    /// Kept until the next successful start. After a failed model load only `retry` leaves it.
    Error(String),
}

impl fmt::Display for DetectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectionState::Idle => write!(f, "idle"),
            DetectionState::Loading => write!(f, "loading"),
            DetectionState::Active => write!(f, "active"),
            DetectionState::Error(message) => write!(f, "error: {message}"),
        }
    }
}

pub(crate) struct Session {
    pub state: DetectionState,
    /// Bumped on every start and stop; loop iterations from older generations are discarded.
    pub generation: u64,
    pub camera: CameraSession,
    pub stabilizer: Stabilizer,
    task: Option<JoinHandle<()>>,
}

/// State shared between the pipeline handle and its detection loop task.
pub(crate) struct Shared {
    pub session: RefCell<Session>,
    pub renderer: RefCell<OverlayRenderer>,
    pub catalog: Arc<SignCatalog>,
    pub scheduler: Box<dyn FrameScheduler>,
    pub on_sign: Box<dyn Fn(&str)>,
    pub detect_timeout: Cell<Option<Duration>>,
    state_tx: watch::Sender<DetectionState>,
}

impl Shared {
    fn set_state(&self, session: &mut Session, state: DetectionState) {
        if session.state != state {
            debug!(from = %session.state, to = %state, "detection state changed");
        }
        session.state = state.clone();
        self.state_tx.send_replace(state);
    }

    /// True while `generation` is the live session and the pipeline is active.
    pub fn is_current(&self, generation: u64) -> bool {
        let session = self.session.borrow();
        session.generation == generation && session.state == DetectionState::Active
    }

    /// halt cancels the loop, releases the camera, clears the stabilizer and moves to `next`.
    pub fn halt(&self, next: DetectionState) {
        let mut session = self.session.borrow_mut();
        session.generation += 1;
        if let Some(task) = session.task.take() {
            task.abort();
        }
        session.camera.stop();
        session.stabilizer.reset();
        self.set_state(&mut session, next);
    }
}

/// Camera to sign tokens. Must be driven from a `tokio::task::LocalSet`: the
/// detection loop is spawned as a local task and everything runs on one thread.
pub struct SignRecognitionPipeline<F: DetectorFactory> {
    shared: Rc<Shared>,
    loader: ModelLoader<F>,
    start_lock: Mutex<()>,
}

impl<F: DetectorFactory> SignRecognitionPipeline<F> {
    /// new wires the pipeline components together.
    ///
    /// # Arguments
    /// * `factory` - loads the landmark detector
    /// * `camera` - camera session, stopped
    /// * `renderer` - overlay renderer for the live feed
    /// * `scheduler` - refresh signal pacing the detection loop
    /// * `catalog` - sign vocabulary
    /// * `on_sign` - called once per confirmed sign
    pub fn new(
        factory: F,
        camera: CameraSession,
        renderer: OverlayRenderer,
        scheduler: Box<dyn FrameScheduler>,
        catalog: Arc<SignCatalog>,
        on_sign: impl Fn(&str) + 'static,
    ) -> Self {
        let (state_tx, _) = watch::channel(DetectionState::Idle);
        let session = Session {
            state: DetectionState::Idle,
            generation: 0,
            camera,
            stabilizer: Stabilizer::new(),
            task: None,
        };
        SignRecognitionPipeline {
            shared: Rc::new(Shared {
                session: RefCell::new(session),
                renderer: RefCell::new(renderer),
                catalog,
                scheduler,
                on_sign: Box::new(on_sign),
                detect_timeout: Cell::new(None),
                state_tx,
            }),
            loader: ModelLoader::new(factory),
            start_lock: Mutex::new(()),
        }
    }

    /// Caps each detector call; expiry stops the camera and enters the error state.
    pub fn with_detect_timeout(self, timeout: Option<Duration>) -> Self {
        self.shared.detect_timeout.set(timeout);
        self
    }

    pub fn state(&self) -> DetectionState {
        self.shared.session.borrow().state.clone()
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<DetectionState> {
        self.shared.state_tx.subscribe()
    }

    /// The sign currently held as confirmed by the stabilizer.
    pub fn confirmed_label(&self) -> Option<String> {
        self.shared
            .session
            .borrow()
            .stabilizer
            .confirmed()
            .map(str::to_owned)
    }

    pub fn model_load_attempts(&self) -> usize {
        self.loader.attempts()
    }

    /// start loads the model if needed, opens the camera and starts the detection loop.
    ///
    /// Calls are serialized; a call while active does nothing. A `stop` issued
    /// while the model is loading wins: the camera is not opened. After a camera
    /// error the device is tried again; after a model load failure this returns
    /// [`PipelineError::Failed`] until `retry`.
    pub async fn start(&self) -> Result<(), PipelineError> {
        let _guard = self.start_lock.lock().await;

        // a failed model load only clears through retry; camera and timeout errors may start again
        if let DetectionState::Error(message) = self.state() {
            if self.loader.has_failed().await {
                return Err(PipelineError::Failed(message));
            }
        }

        let generation = {
            let mut session = self.shared.session.borrow_mut();
            if session.state == DetectionState::Active {
                return Ok(());
            }
            self.shared.set_state(&mut session, DetectionState::Loading);
            session.generation
        };

        let detector = match self.loader.load().await {
            Ok(detector) => detector,
            Err(e) => {
                if self.shared.session.borrow().generation != generation {
                    return Ok(());
                }
                self.shared
                    .halt(DetectionState::Error(MODEL_LOAD_MESSAGE.to_string()));
                return Err(e.into());
            }
        };

        let mut session = self.shared.session.borrow_mut();
        if session.generation != generation {
            debug!("start cancelled while the model was loading");
            return Ok(());
        }
        if let Err(e) = session.camera.start() {
            drop(session);
            warn!("camera failed to start: {e}");
            self.shared.halt(DetectionState::Error(e.to_string()));
            return Err(e.into());
        }

        session.generation += 1;
        session.stabilizer.reset();
        let generation = session.generation;
        self.shared.set_state(&mut session, DetectionState::Active);
        session.task = Some(tokio::task::spawn_local(detection_loop::run(
            Rc::clone(&self.shared),
            generation,
            detector,
        )));
        info!(generation, "sign recognition started");
        Ok(())
    }

    /// stop releases the camera and cancels detection. Always safe to call.
    /// The error state survives a stop so its banner stays up.
    pub fn stop(&self) {
        let next = match self.state() {
            DetectionState::Error(message) => DetectionState::Error(message),
            _ => DetectionState::Idle,
        };
        self.shared.halt(next);
        info!("sign recognition stopped");
    }

    /// retry clears an error, forgets a failed model load and starts again.
    pub async fn retry(&self) -> Result<(), PipelineError> {
        self.loader.retry().await;
        {
            let mut session = self.shared.session.borrow_mut();
            if matches!(session.state, DetectionState::Error(_)) {
                self.shared.set_state(&mut session, DetectionState::Idle);
            }
        }
        self.start().await
    }

    /// toggle is the camera on/off control. Turning on after an error retries.
    pub async fn toggle(&self) -> Result<(), PipelineError> {
        match self.state() {
            DetectionState::Active | DetectionState::Loading => {
                self.stop();
                Ok(())
            }
            DetectionState::Idle => self.start().await,
            DetectionState::Error(_) => self.retry().await,
        }
    }

    /// render_status draws the current state on the overlay when there is no live feed.
    pub fn render_status(&self) {
        let state = self.state();
        if let Err(e) = self.shared.renderer.borrow_mut().render_status(&state) {
            warn!("overlay rendering failed: {e:#}");
        }
    }
}

impl<F: DetectorFactory> Drop for SignRecognitionPipeline<F> {
    fn drop(&mut self) {
        self.shared.halt(DetectionState::Idle);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::sync::oneshot;
    use tokio::task::LocalSet;

    use super::*;
    use crate::camera::session::tests::{FakeCamera, FakeCameraState};
    use crate::camera::session::CaptureRequest;
    use crate::config::config::CameraConfig;
    use crate::error::{CameraError, ModelLoadError};
    use crate::gesture::classifier::tests::hand_with;
    use crate::gesture::classifier::FingerPosition::{Closed, Up};
    use crate::gesture::classifier::GestureSignature;
    use crate::gesture::landmarks::HandPose;
    use crate::pipeline::detector::tests::{Script, ScriptedFactory, Step};
    use crate::pipeline::scheduler::ManualScheduler;
    use crate::render::overlay::tests::BrokenSurface;
    use crate::render::overlay::{LatestCanvas, RenderSurface};

    struct Harness {
        pipeline: SignRecognitionPipeline<ScriptedFactory>,
        scheduler: ManualScheduler,
        camera: Rc<FakeCameraState>,
        script: Rc<Script>,
        signs: Rc<RefCell<Vec<String>>>,
        canvas: LatestCanvas,
    }

    impl Harness {
        fn new() -> Self {
            Harness::with_surface(None)
        }

        fn with_surface(surface: Option<Box<dyn RenderSurface>>) -> Self {
            let (camera, camera_state) = FakeCamera::new();
            let (factory, script) = ScriptedFactory::new();
            let scheduler = ManualScheduler::new();
            let canvas = LatestCanvas::new();
            let signs = Rc::new(RefCell::new(Vec::new()));

            let surface: Box<dyn RenderSurface> = match surface {
                Some(surface) => surface,
                None => Box::new(canvas.clone()),
            };
            let sink = Rc::clone(&signs);
            let pipeline = SignRecognitionPipeline::new(
                factory,
                CameraSession::new(Box::new(camera), CaptureRequest::from(&CameraConfig::new())),
                OverlayRenderer::new(surface, (640, 480)),
                Box::new(scheduler.clone()),
                Arc::new(SignCatalog::default()),
                move |sign: &str| sink.borrow_mut().push(sign.to_string()),
            );
            Harness {
                pipeline,
                scheduler,
                camera: camera_state,
                script,
                signs,
                canvas,
            }
        }

        /// Lets the detection loop process `n` frames.
        async fn frames(&self, n: usize) {
            for _ in 0..n {
                self.scheduler.signal();
                settle().await;
            }
        }

        fn signs(&self) -> Vec<String> {
            self.signs.borrow().clone()
        }
    }

    async fn settle() {
        for _ in 0..32 {
            tokio::task::yield_now().await;
        }
    }

    fn thumb_up() -> HandPose {
        hand_with(GestureSignature::new(Up, Closed, Closed, Closed, Closed))
    }

    fn open_hand() -> HandPose {
        hand_with(GestureSignature::new(Up, Up, Up, Up, Up))
    }

    #[tokio::test]
    async fn test_thumb_up_on_two_frames_emits_once() {
        LocalSet::new()
            .run_until(async {
                let h = Harness::new();
                h.pipeline.start().await.unwrap();
                assert_eq!(h.pipeline.state(), DetectionState::Active);

                h.script.push_hands(&thumb_up(), 3);
                h.frames(1).await;
                assert!(h.signs().is_empty());
                h.frames(1).await;
                assert_eq!(h.signs(), vec!["Bonjour"]);
                assert_eq!(h.pipeline.confirmed_label().as_deref(), Some("Bonjour"));
                h.frames(1).await;
                assert_eq!(h.signs(), vec!["Bonjour"]);
                assert_eq!(h.script.detect_calls.get(), 3);
                assert_eq!(h.canvas.presented(), 3);
            })
            .await;
    }

    #[tokio::test]
    async fn test_zero_hand_frame_resets_stabilizer() {
        LocalSet::new()
            .run_until(async {
                let h = Harness::new();
                h.pipeline.start().await.unwrap();

                h.script.push_hands(&thumb_up(), 2);
                h.script.push(Step::Hands(vec![]));
                h.script.push_hands(&thumb_up(), 1);
                h.frames(4).await;
                assert_eq!(h.signs(), vec!["Bonjour"]);
                assert_eq!(h.pipeline.confirmed_label(), None);

                h.script.push_hands(&thumb_up(), 1);
                h.frames(1).await;
                assert_eq!(h.signs(), vec!["Bonjour", "Bonjour"]);
            })
            .await;
    }

    #[tokio::test]
    async fn test_unknown_and_changing_gestures() {
        LocalSet::new()
            .run_until(async {
                let h = Harness::new();
                h.pipeline.start().await.unwrap();

                let unknown = hand_with(GestureSignature::new(Closed, Closed, Closed, Up, Up));
                h.script.push_hands(&unknown, 3);
                h.script.push_hands(&open_hand(), 1);
                h.script.push_hands(&thumb_up(), 1);
                h.script.push_hands(&open_hand(), 2);
                h.frames(7).await;
                assert_eq!(h.signs(), vec!["Merci"]);
            })
            .await;
    }

    #[tokio::test]
    async fn test_late_result_after_stop_is_discarded() {
        LocalSet::new()
            .run_until(async {
                let h = Harness::new();
                h.pipeline.start().await.unwrap();

                let (tx, rx) = oneshot::channel();
                h.script.push_hands(&thumb_up(), 1);
                h.script.push(Step::Hold(rx));
                h.frames(2).await;
                assert_eq!(h.script.detect_calls.get(), 2);

                h.pipeline.stop();
                assert_eq!(h.pipeline.state(), DetectionState::Idle);
                assert_eq!(h.camera.open_streams(), 0);

                let _ = tx.send(vec![thumb_up()]);
                h.scheduler.signal();
                settle().await;
                assert_eq!(h.scheduler.pending(), 1);
                assert!(h.signs().is_empty());
                assert_eq!(h.script.detect_calls.get(), 2);

                // a restarted session needs two fresh frames
                h.pipeline.start().await.unwrap();
                h.script.push_hands(&thumb_up(), 1);
                settle().await;
                assert!(h.signs().is_empty());
                h.script.push_hands(&thumb_up(), 1);
                h.frames(1).await;
                assert_eq!(h.signs(), vec!["Bonjour"]);
            })
            .await;
    }

    #[tokio::test]
    async fn test_result_from_superseded_generation_is_dropped() {
        LocalSet::new()
            .run_until(async {
                let h = Harness::new();
                h.pipeline.start().await.unwrap();

                let (tx, rx) = oneshot::channel();
                h.script.push_hands(&thumb_up(), 1);
                h.script.push(Step::Hold(rx));
                h.frames(2).await;
                assert_eq!(h.script.detect_calls.get(), 2);

                // supersede the session while the detector call is still pending,
                // leaving the loop task running
                h.pipeline.shared.session.borrow_mut().generation += 1;
                tx.send(vec![thumb_up()]).unwrap();
                settle().await;

                assert!(h.signs().is_empty());
                assert_eq!(h.pipeline.confirmed_label(), None);
                {
                    let session = h.pipeline.shared.session.borrow();
                    let task = session.task.as_ref().unwrap();
                    assert!(task.is_finished());
                }
                h.frames(1).await;
                assert_eq!(h.script.detect_calls.get(), 2);
            })
            .await;
    }

    #[tokio::test]
    async fn test_concurrent_start_opens_one_session() {
        LocalSet::new()
            .run_until(async {
                let h = Harness::new();
                let (a, b) = tokio::join!(h.pipeline.start(), h.pipeline.start());
                assert!(a.is_ok() && b.is_ok());
                assert_eq!(h.camera.opened.get(), 1);
                assert_eq!(h.camera.open_streams(), 1);
                assert_eq!(h.script.loads.get(), 1);

                h.script.push_hands(&open_hand(), 2);
                h.frames(2).await;
                assert_eq!(h.signs(), vec!["Merci"]);
            })
            .await;
    }

    #[tokio::test]
    async fn test_restart_reuses_loaded_model() {
        LocalSet::new()
            .run_until(async {
                let h = Harness::new();
                let mut states = h.pipeline.subscribe();

                h.pipeline.start().await.unwrap();
                h.pipeline.stop();
                h.pipeline.stop();
                assert_eq!(*states.borrow_and_update(), DetectionState::Idle);

                h.pipeline.start().await.unwrap();
                assert_eq!(*states.borrow_and_update(), DetectionState::Active);
                assert_eq!(h.script.loads.get(), 1);
                assert_eq!(h.pipeline.model_load_attempts(), 1);
                assert_eq!(h.camera.opened.get(), 2);
                assert_eq!(h.camera.released.get(), 1);
            })
            .await;
    }

    #[tokio::test]
    async fn test_model_load_failure_needs_retry() {
        LocalSet::new()
            .run_until(async {
                let h = Harness::new();
                h.script.load_failures.set(1);

                let err = h.pipeline.start().await.unwrap_err();
                assert_eq!(
                    err,
                    PipelineError::ModelLoad(ModelLoadError::NotReady {
                        model: "hand_landmark".to_string()
                    })
                );
                assert_eq!(
                    h.pipeline.state(),
                    DetectionState::Error(MODEL_LOAD_MESSAGE.to_string())
                );
                assert_eq!(h.camera.opened.get(), 0);

                assert!(matches!(h.pipeline.start().await, Err(PipelineError::Failed(_))));
                h.pipeline.stop();
                assert!(matches!(h.pipeline.state(), DetectionState::Error(_)));
                assert_eq!(h.script.detect_calls.get(), 0);
                assert_eq!(h.script.loads.get(), 1);

                h.pipeline.retry().await.unwrap();
                assert_eq!(h.pipeline.state(), DetectionState::Active);
                assert_eq!(h.script.loads.get(), 2);
            })
            .await;
    }

    #[tokio::test]
    async fn test_camera_failure_is_recoverable() {
        LocalSet::new()
            .run_until(async {
                let h = Harness::new();
                *h.camera.failure.borrow_mut() =
                    Some(CameraError::DeviceUnavailable("no device".to_string()));

                let err = h.pipeline.start().await.unwrap_err();
                assert!(matches!(err, PipelineError::Camera(CameraError::DeviceUnavailable(_))));
                assert!(matches!(h.pipeline.state(), DetectionState::Error(_)));

                h.camera.failure.borrow_mut().take();
                h.pipeline.toggle().await.unwrap();
                assert_eq!(h.pipeline.state(), DetectionState::Active);
                assert_eq!(h.script.loads.get(), 1);

                h.pipeline.toggle().await.unwrap();
                assert_eq!(h.pipeline.state(), DetectionState::Idle);
                assert_eq!(h.camera.open_streams(), 0);
            })
            .await;
    }

    #[tokio::test]
    async fn test_start_again_after_permission_denied() {
        LocalSet::new()
            .run_until(async {
                let h = Harness::new();
                *h.camera.failure.borrow_mut() =
                    Some(CameraError::PermissionDenied("/dev/video0".to_string()));

                let err = h.pipeline.start().await.unwrap_err();
                assert!(matches!(err, PipelineError::Camera(CameraError::PermissionDenied(_))));
                assert_eq!(h.pipeline.state(), DetectionState::Error(err.to_string()));
                assert_eq!(h.camera.opened.get(), 0);

                // still denied: the device is tried again and the banner stays
                assert!(matches!(h.pipeline.start().await, Err(PipelineError::Camera(_))));
                assert!(matches!(h.pipeline.state(), DetectionState::Error(_)));

                h.camera.failure.borrow_mut().take();
                h.pipeline.start().await.unwrap();
                assert_eq!(h.pipeline.state(), DetectionState::Active);
                assert_eq!(h.camera.opened.get(), 1);
                assert_eq!(h.script.loads.get(), 1);
            })
            .await;
    }

    #[tokio::test]
    async fn test_inference_errors_do_not_stop_the_loop() {
        LocalSet::new()
            .run_until(async {
                let h = Harness::new();
                h.pipeline.start().await.unwrap();

                h.script.push_hands(&thumb_up(), 1);
                h.script.push(Step::Fail);
                h.script.push_hands(&thumb_up(), 1);
                h.frames(3).await;
                assert_eq!(h.pipeline.state(), DetectionState::Active);
                assert_eq!(h.signs(), vec!["Bonjour"]);
            })
            .await;
    }

    #[tokio::test]
    async fn test_frames_without_dimensions_are_skipped() {
        LocalSet::new()
            .run_until(async {
                let h = Harness::new();
                h.camera.warmup.set(2);
                h.pipeline.start().await.unwrap();

                h.frames(2).await;
                assert_eq!(h.camera.reads.get(), 2);
                assert_eq!(h.script.detect_calls.get(), 0);

                h.frames(1).await;
                assert_eq!(h.script.detect_calls.get(), 1);
            })
            .await;
    }

    #[tokio::test]
    async fn test_render_failure_does_not_abort_detection() {
        LocalSet::new()
            .run_until(async {
                let h = Harness::with_surface(Some(Box::new(BrokenSurface)));
                h.pipeline.start().await.unwrap();

                h.script.push_hands(&open_hand(), 2);
                h.frames(2).await;
                assert_eq!(h.signs(), vec!["Merci"]);
                assert_eq!(h.pipeline.state(), DetectionState::Active);
            })
            .await;
    }

    #[tokio::test]
    async fn test_stop_while_loading_wins() {
        LocalSet::new()
            .run_until(async {
                let h = Rc::new(Harness::new());
                let (release, gate) = oneshot::channel();
                *h.script.load_gate.borrow_mut() = Some(gate);
                let mut states = h.pipeline.subscribe();

                let starting = tokio::task::spawn_local({
                    let h = Rc::clone(&h);
                    async move { h.pipeline.start().await }
                });
                settle().await;
                assert_eq!(h.pipeline.state(), DetectionState::Loading);

                // the host sees the loading state and can draw the indicator meanwhile
                assert!(states.has_changed().unwrap());
                assert_eq!(*states.borrow_and_update(), DetectionState::Loading);
                h.pipeline.render_status();
                assert_eq!(h.canvas.presented(), 1);

                h.pipeline.stop();
                assert_eq!(h.pipeline.state(), DetectionState::Idle);
                let _ = release.send(());
                assert!(starting.await.unwrap().is_ok());
                assert_eq!(h.pipeline.state(), DetectionState::Idle);
                assert_eq!(h.camera.opened.get(), 0);

                h.pipeline.start().await.unwrap();
                assert_eq!(h.pipeline.state(), DetectionState::Active);
                assert_eq!(h.script.loads.get(), 1);
            })
            .await;
    }

    #[tokio::test]
    async fn test_detect_timeout_stops_with_error() {
        LocalSet::new()
            .run_until(async {
                let mut h = Harness::new();
                h.pipeline = h.pipeline.with_detect_timeout(Some(Duration::from_millis(10)));
                h.pipeline.start().await.unwrap();

                let (_tx, rx) = oneshot::channel();
                h.script.push(Step::Hold(rx));
                h.frames(1).await;
                tokio::time::sleep(Duration::from_millis(50)).await;

                assert_eq!(
                    h.pipeline.state(),
                    DetectionState::Error(DETECT_TIMEOUT_MESSAGE.to_string())
                );
                assert_eq!(h.camera.open_streams(), 0);

                h.pipeline.start().await.unwrap();
                assert_eq!(h.pipeline.state(), DetectionState::Active);
                assert_eq!(h.script.loads.get(), 1);
            })
            .await;
    }
}
