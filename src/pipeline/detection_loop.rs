//! The acquire, infer, classify, stabilize, render cycle.

use std::rc::Rc;

use tracing::{debug, info, warn};

use crate::camera::frame::Frame;
use crate::gesture::classifier::classify;
use crate::gesture::landmarks::HandPose;
use crate::pipeline::detector::LandmarkDetector;
use crate::pipeline::pipeline::{DetectionState, Shared, DETECT_TIMEOUT_MESSAGE};

/// run processes at most one frame per refresh tick until `generation` is superseded.
/// The detector call is the only suspension point besides the tick itself.
pub(crate) async fn run<D: LandmarkDetector>(shared: Rc<Shared>, generation: u64, detector: Rc<D>) {
    debug!(generation, "detection loop started");
    loop {
        shared.scheduler.schedule_next().await;
        if !shared.is_current(generation) {
            break;
        }

        let frame = shared.session.borrow_mut().camera.current_frame();
        let Some(frame) = frame.filter(Frame::is_ready) else {
            continue;
        };

        let detection = match shared.detect_timeout.get() {
            Some(limit) => match tokio::time::timeout(limit, detector.detect(&frame)).await {
                Ok(detection) => detection,
                Err(_) => {
                    if shared.is_current(generation) {
                        warn!(?limit, "landmark detection timed out");
                        shared.halt(DetectionState::Error(DETECT_TIMEOUT_MESSAGE.to_string()));
                    }
                    break;
                }
            },
            None => detector.detect(&frame).await,
        };

        if !shared.is_current(generation) {
            debug!(generation, "discarding detection from a stopped session");
            break;
        }

        match detection {
            Ok(hands) => process(&shared, &frame, hands.first()),
            Err(e) => warn!("landmark detection failed: {e}"),
        }
    }
    debug!(generation, "detection loop finished");
}

fn process(shared: &Shared, frame: &Frame, hand: Option<&HandPose>) {
    let (emitted, confirmed) = {
        let mut session = shared.session.borrow_mut();
        let emitted = match hand {
            Some(hand) => session.stabilizer.observe(classify(hand, &shared.catalog)),
            None => {
                session.stabilizer.reset();
                None
            }
        };
        (emitted, session.stabilizer.confirmed().map(str::to_owned))
    };

    if let Err(e) = shared
        .renderer
        .borrow_mut()
        .render(frame, hand, confirmed.as_deref())
    {
        warn!("overlay rendering failed: {e:#}");
    }

    if let Some(sign) = emitted {
        info!(sign = %sign, "sign detected");
        (shared.on_sign)(&sign);
    }
}
