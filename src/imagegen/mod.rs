pub mod client;
pub mod poller;
pub mod transport;
pub mod validation;

pub use client::ImageGenerator;
pub use poller::{PollDecision, FAILURE_BACKOFF_MULTIPLIER};
pub use transport::{HttpTransport, ImageTransport};
pub use validation::{is_trusted_image_url, validate_prompt};
