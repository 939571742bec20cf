pub mod catalog;
pub mod classifier;
pub mod landmarks;
pub mod stabilizer;
