use anyhow::Error;
use opencv::core::{flip, Mat, Point};

/// mirror_horizontally flips the image around its vertical axis, writing into `dst`.
pub fn mirror_horizontally(src: &Mat, dst: &mut Mat) -> Result<(), Error> {
    flip(src, dst, 1)?;
    Ok(())
}

/// mirror_point maps an x/y position in an image of `width` pixels to the pixel
/// it lands on after [`mirror_horizontally`]: column `x` becomes `width - 1 - x`.
pub fn mirror_point(x: f32, y: f32, width: i32) -> Point {
    Point::new((width as f32 - 1.0 - x).round() as i32, y.round() as i32)
}
