//! Configuration: settings structs, defaults, TOML persistence and paths.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{AnalysisConfig, AppConfig, CaptureConfig, TranscribeConfig};
