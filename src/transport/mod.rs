/// Sample folder layout and artifact file access.
pub mod fs;

pub use fs::{SampleFolder, read_artifact};
