//! Network side of brandkit: the tool executor and vision clients, the
//! generation service built on them, and the `StudioEngine` that runs a
//! campaign from brand image to finished assets.

pub mod config;
pub mod error;
pub mod generation;
mod http;
pub mod studio;
pub mod tools;
pub mod upload;
pub mod vision;

pub use config::{StudioConfig, ToolNames};
pub use error::StudioError;
pub use generation::{GenerationModels, GenerationService, Generated, OperationHandle};
pub use studio::{CampaignResults, GenerateOptions, ProgressObserver, ProgressUpdate, StudioEngine};
pub use tools::{default_backends, DryrunToolExecutor, HttpToolExecutor, ToolBackend, ToolExecutor, ToolOutput};
pub use upload::BrandUpload;
pub use vision::{DryrunVisionClient, GeminiVisionClient, VisionClient};
