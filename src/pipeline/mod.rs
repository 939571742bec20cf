pub mod detection_loop;
pub mod detector;
pub mod model_loader;
pub mod pipeline;
pub mod scheduler;
