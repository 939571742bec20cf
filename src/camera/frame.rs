use anyhow::Error;
use opencv::core::{Mat, MatTraitConst, Scalar, CV_8UC3};

/// One captured BGR video frame.
#[derive(Debug)]
pub struct Frame {
    image: Mat,
}

impl Frame {
    pub fn new(image: Mat) -> Self {
        Frame { image }
    }

    /// blank creates a black frame of the given size.
    pub fn blank(width: i32, height: i32) -> Result<Self, Error> {
        let image = Mat::new_rows_cols_with_default(height, width, CV_8UC3, Scalar::all(0.0))?;
        Ok(Frame { image })
    }

    pub fn width(&self) -> i32 {
        self.image.cols()
    }

    pub fn height(&self) -> i32 {
        self.image.rows()
    }

    /// A frame is ready once the device has reported its dimensions.
    pub fn is_ready(&self) -> bool {
        self.width() > 0 && self.height() > 0
    }

    pub fn image(&self) -> &Mat {
        &self.image
    }
}
