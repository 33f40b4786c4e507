pub mod config;
pub mod error;
pub mod imagegen;
pub mod logger;
pub mod models;
#[cfg(feature = "server")]
pub mod server;

pub use config::{Config, GeneratorConfig, ServerConfig};
pub use error::{GenerationError, Result, TransportError};
pub use imagegen::{ImageGenerator, ImageTransport};
pub use models::{GenerationRequest, GenerationResult, GenerationStatus, OperationHandle};
