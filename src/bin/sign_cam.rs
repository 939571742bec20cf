//! Webcam sign recognition in a highgui window.
//!
//! Keys: `c` toggles the camera, `r` retries after an error, `q` quits.
//! Confirmed signs are appended to the draft line on stdout.

use std::cell::RefCell;
use std::io::Write;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Error;
use clap::Parser;
use opencv::highgui;
use tokio::task::LocalSet;
use tracing::{info, warn};

use rs_sign_pipeline::camera::{CameraSession, CaptureRequest, OpenCvCamera};
use rs_sign_pipeline::error::PipelineError;
use rs_sign_pipeline::config::config::PipelineConfig;
use rs_sign_pipeline::modules::hand_landmark_client::HandLandmarkClientFactory;
use rs_sign_pipeline::pipeline::scheduler::ManualScheduler;
use rs_sign_pipeline::render::{HighGuiWindow, OverlayRenderer};
use rs_sign_pipeline::{DetectionState, SignCatalog, SignRecognitionPipeline};

const WINDOW_NAME: &str = "sign_cam";

#[derive(Parser, Debug)]
#[command(name = "sign_cam", about = "Translate hand signs from a webcam into text")]
struct Cli {
    /// JSON pipeline configuration; built-in defaults when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON sign catalog, overrides the one named in the configuration
    #[arg(long)]
    catalog: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Error> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rs_sign_pipeline=info,sign_cam=info".into()),
        )
        .init();

    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };
    if cli.catalog.is_some() {
        config.catalog = cli.catalog;
    }
    let catalog = config.load_catalog()?;
    info!(signs = catalog.len(), "sign catalog loaded");

    LocalSet::new().run_until(run(config, catalog)).await
}

async fn run(config: PipelineConfig, catalog: SignCatalog) -> Result<(), Error> {
    let draft = Rc::new(RefCell::new(String::new()));
    let on_sign = {
        let draft = Rc::clone(&draft);
        move |sign: &str| {
            let mut draft = draft.borrow_mut();
            if !draft.is_empty() {
                draft.push(' ');
            }
            draft.push_str(sign);
            print!("\r{draft}");
            let _ = std::io::stdout().flush();
        }
    };

    let camera = CameraSession::new(
        Box::new(OpenCvCamera),
        CaptureRequest::from(&config.camera),
    );
    let renderer = OverlayRenderer::new(
        Box::new(HighGuiWindow::new(WINDOW_NAME)?),
        (config.camera.width, config.camera.height),
    );
    let refresh = ManualScheduler::new();
    let pipeline = Rc::new(
        SignRecognitionPipeline::new(
            HandLandmarkClientFactory::new(config.hand_landmark.clone()),
            camera,
            renderer,
            Box::new(refresh.clone()),
            Arc::new(catalog),
            on_sign,
        )
        .with_detect_timeout(config.detection.detect_timeout_ms.map(Duration::from_millis)),
    );
    let repaint = Duration::from_millis(config.detection.repaint_interval_ms);

    let mut states = pipeline.subscribe();
    pipeline.render_status();
    info!("press c to toggle the camera, r to retry, q to quit");

    loop {
        // pumping highgui repaints the window; each repaint lets one frame through
        let key = highgui::wait_key(1)?;
        refresh.signal();

        match u8::try_from(key).map(char::from) {
            Ok('q') => break,
            Ok('c') => match pipeline.state() {
                DetectionState::Active | DetectionState::Loading => pipeline.stop(),
                _ => spawn_start(&pipeline, false),
            },
            Ok('r') => spawn_start(&pipeline, true),
            _ => {}
        }

        if states.has_changed().unwrap_or(false) {
            let state = states.borrow_and_update().clone();
            info!(%state, "camera state");
            if state != DetectionState::Active {
                pipeline.render_status();
            }
        }
        tokio::time::sleep(repaint).await;
    }

    pipeline.stop();
    if !draft.borrow().is_empty() {
        println!();
    }
    Ok(())
}

/// Starts (or retries) in the background so the window keeps repainting while the model loads.
fn spawn_start(pipeline: &Rc<SignRecognitionPipeline<HandLandmarkClientFactory>>, retry: bool) {
    let pipeline = Rc::clone(pipeline);
    tokio::task::spawn_local(async move {
        let result: Result<(), PipelineError> = if retry {
            pipeline.retry().await
        } else {
            pipeline.toggle().await
        };
        if let Err(e) = result {
            warn!("{e}");
        }
    });
}
