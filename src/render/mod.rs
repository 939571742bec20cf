pub mod overlay;

pub use overlay::{HighGuiWindow, LatestCanvas, OverlayRenderer, RenderSurface};
