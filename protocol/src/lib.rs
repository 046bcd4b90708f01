//! Wire types for the image generation backend consumed by Image Studio.
//!
//! The backend exposes two endpoints:
//!
//! - `POST /generate` (multipart: `prompt` + zero or more `images` parts)
//! - `POST /optimize_prompt` (JSON `{ "prompt": ... }`)
//!
//! Both answer non-success statuses with [`ErrorResponse`].

pub mod error;
pub mod generate;
pub mod mime;
pub mod optimize;

pub use error::ErrorResponse;
pub use generate::GenerateResponse;
pub use generate::ImagePayload;
pub use optimize::OptimizePromptRequest;
pub use optimize::OptimizePromptResponse;

/// Path of the generation endpoint, relative to the server root.
pub const GENERATE_PATH: &str = "/generate";

/// Path of the prompt optimization endpoint, relative to the server root.
pub const OPTIMIZE_PROMPT_PATH: &str = "/optimize_prompt";

/// Multipart field carrying the prompt text.
pub const PROMPT_FIELD: &str = "prompt";

/// Multipart field repeated once per attached image.
pub const IMAGES_FIELD: &str = "images";
