use std::time::Duration;

use anyhow::Error;
use ndarray::Array4;
use opencv::core::{Mat, MatTraitConst, Size, Vec3b};
use opencv::imgproc;
use opencv::imgproc::{cvt_color, resize, COLOR_BGR2RGB};
use tracing::info;

use crate::camera::frame::Frame;
use crate::config::config::HandLandmarkConfig;
use crate::error::{InferenceError, ModelLoadError};
use crate::gesture::landmarks::{HandPose, LANDMARK_COUNT};
use crate::pipeline::detector::{DetectorFactory, LandmarkDetector};
use crate::triton_client::client::triton::model_infer_request::{
    InferInputTensor, InferRequestedOutputTensor,
};
use crate::triton_client::client::triton::{
    InferTensorContents, ModelInferRequest, ModelInferResponse,
};
use crate::triton_client::client::TritonInferenceClient;
use crate::utils::utils::u8_to_f32_vec;

const VALUES_PER_HAND: usize = LANDMARK_COUNT * 3;

/// Hand landmark model served by Triton. Input is an RGB `[1, imsize, imsize, 3]`
/// tensor, outputs are 63 landmark coordinates in input pixels plus a hand
/// presence score per hand.
#[derive(Debug, Clone)]
pub struct HandLandmarkClient {
    triton_infer_client: TritonInferenceClient,
    pub model_name: String,
    pub model_version: String,
    pub input_name: String,
    pub imsize: i32,
    pub landmarks_output: String,
    pub presence_output: String,
    pub mean: f32,
    pub scale: f32,
    pub threshold_presence: f32,
}

impl HandLandmarkClient {
    pub fn new(triton_infer_client: TritonInferenceClient, config: HandLandmarkConfig) -> Self {
        HandLandmarkClient {
            triton_infer_client,
            model_name: config.model_name,
            model_version: config.model_version,
            input_name: config.input_name,
            imsize: config.imsize,
            landmarks_output: config.landmarks_output,
            presence_output: config.presence_output,
            mean: config.mean,
            scale: config.scale,
            threshold_presence: config.threshold_presence,
        }
    }

    /// preprocess resizes the frame to the model input and normalizes it.
    ///
    /// # Arguments
    /// * `frame` - BGR camera frame
    ///
    /// # Returns
    /// * `Result<Array4<f32>, Error>` - NHWC tensor
    fn preprocess(&self, frame: &Frame) -> Result<Array4<f32>, Error> {
        let mut img_resized = Mat::default();
        resize(
            frame.image(),
            &mut img_resized,
            Size::new(self.imsize, self.imsize),
            0.0,
            0.0,
            imgproc::INTER_LINEAR,
        )?;

        let mut img_rgb = Mat::default();
        cvt_color(&img_resized, &mut img_rgb, COLOR_BGR2RGB, 0)?;

        let side = self.imsize as usize;
        let mut im_tensor = Array4::<f32>::zeros((1, side, side, 3));
        for y in 0..side {
            for x in 0..side {
                let pixel = img_rgb.at_2d::<Vec3b>(y as i32, x as i32)?;
                for c in 0..3 {
                    im_tensor[[0, y, x, c]] = (pixel[c] as f32 - self.mean) * self.scale;
                }
            }
        }
        Ok(im_tensor)
    }

    fn build_request(&self, tensor: Array4<f32>) -> ModelInferRequest {
        let shape = tensor.shape().iter().map(|&x| x as i64).collect();
        let (fp32_contents, _) = tensor.into_raw_vec_and_offset();
        let input = InferInputTensor {
            name: self.input_name.to_owned(),
            datatype: "FP32".to_string(),
            shape,
            contents: Some(InferTensorContents {
                fp32_contents,
                ..Default::default()
            }),
        };

        let mut outputs = vec![InferRequestedOutputTensor {
            name: self.landmarks_output.to_owned(),
        }];
        if !self.presence_output.is_empty() {
            outputs.push(InferRequestedOutputTensor {
                name: self.presence_output.to_owned(),
            });
        }

        ModelInferRequest {
            model_name: self.model_name.to_owned(),
            model_version: self.model_version.to_owned(),
            id: "".to_string(),
            inputs: vec![input],
            outputs,
            raw_input_contents: vec![],
        }
    }

    fn postprocess(
        &self,
        response: &ModelInferResponse,
        frame_width: i32,
        frame_height: i32,
    ) -> Result<Vec<HandPose>, InferenceError> {
        let landmarks = output_values(response, &self.landmarks_output)?
            .ok_or_else(|| InferenceError::output(format!("missing output {}", self.landmarks_output)))?;
        let presence = if self.presence_output.is_empty() {
            None
        } else {
            output_values(response, &self.presence_output)?
        };

        let sx = frame_width as f32 / self.imsize as f32;
        let sy = frame_height as f32 / self.imsize as f32;
        decode_hands(&landmarks, presence.as_deref(), self.threshold_presence, sx, sy)
    }
}

impl LandmarkDetector for HandLandmarkClient {
    async fn detect(&self, frame: &Frame) -> Result<Vec<HandPose>, InferenceError> {
        let tensor = self
            .preprocess(frame)
            .map_err(|e| InferenceError::Preprocess(format!("{e:#}")))?;
        let request = self.build_request(tensor);
        let mut client = self.triton_infer_client.clone();
        let response = client.model_infer(request).await?;
        self.postprocess(&response, frame.width(), frame.height())
    }
}

/// Values of the named output, read from the raw contents when the server sent them.
fn output_values(
    response: &ModelInferResponse,
    name: &str,
) -> Result<Option<Vec<f32>>, InferenceError> {
    let Some(idx) = response.outputs.iter().position(|output| output.name == name) else {
        return Ok(None);
    };
    let output = &response.outputs[idx];
    if output.datatype != "FP32" {
        return Err(InferenceError::output(format!(
            "output {name} has datatype {}, expected FP32",
            output.datatype
        )));
    }
    if let Some(raw) = response.raw_output_contents.get(idx) {
        return Ok(Some(u8_to_f32_vec(raw)));
    }
    Ok(output.contents.as_ref().map(|contents| contents.fp32_contents.clone()))
}

/// decode_hands splits flat model output into hand poses in frame pixel space.
///
/// # Arguments
/// * `landmarks` - `x, y, z` triplets, 63 values per hand
/// * `presence` - one score per hand; every hand is kept when absent
/// * `threshold` - minimum presence score
/// * `sx`, `sy` - model input to frame scale factors
///
/// # Returns
/// * `Result<Vec<HandPose>, InferenceError>`
pub fn decode_hands(
    landmarks: &[f32],
    presence: Option<&[f32]>,
    threshold: f32,
    sx: f32,
    sy: f32,
) -> Result<Vec<HandPose>, InferenceError> {
    if landmarks.len() % VALUES_PER_HAND != 0 {
        return Err(InferenceError::output(format!(
            "{} landmark values is not a multiple of {VALUES_PER_HAND}",
            landmarks.len()
        )));
    }

    let mut hands = Vec::with_capacity(landmarks.len() / VALUES_PER_HAND);
    for (i, values) in landmarks.chunks_exact(VALUES_PER_HAND).enumerate() {
        let score = match presence {
            Some(scores) => *scores
                .get(i)
                .ok_or_else(|| InferenceError::output(format!("no presence score for hand {i}")))?,
            None => 1.0,
        };
        if score < threshold {
            continue;
        }
        if let Some(hand) = HandPose::from_flat(values) {
            hands.push(hand.scaled(sx, sy));
        }
    }
    Ok(hands)
}

/// Connects to Triton and checks the hand landmark model is being served.
#[derive(Debug, Clone)]
pub struct HandLandmarkClientFactory {
    config: HandLandmarkConfig,
}

impl HandLandmarkClientFactory {
    pub fn new(config: HandLandmarkConfig) -> Self {
        HandLandmarkClientFactory { config }
    }
}

impl DetectorFactory for HandLandmarkClientFactory {
    type Detector = HandLandmarkClient;

    async fn load(&self) -> Result<HandLandmarkClient, ModelLoadError> {
        let url = &self.config.url;
        let unreachable = |reason: String| ModelLoadError::Unreachable {
            url: url.to_owned(),
            reason,
        };

        let timeout = Duration::from_secs(self.config.timeout.max(1) as u64);
        let mut client = TritonInferenceClient::connect(url, timeout)
            .await
            .map_err(|e| unreachable(e.to_string()))?;

        let server_ready = client
            .server_ready()
            .await
            .map_err(|status| unreachable(status.message().to_string()))?;
        if !server_ready {
            return Err(unreachable("server is not ready".to_string()));
        }

        let model_ready = client
            .model_ready(&self.config.model_name, &self.config.model_version)
            .await
            .map_err(|status| ModelLoadError::Other(status.message().to_string()))?;
        if !model_ready {
            return Err(ModelLoadError::NotReady {
                model: self.config.model_name.to_owned(),
            });
        }

        info!(url = %url, model = %self.config.model_name, "hand landmark model ready");
        Ok(HandLandmarkClient::new(client, self.config.clone()))
    }
}
