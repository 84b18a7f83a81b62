pub mod gemini;
pub mod prompt;
pub mod types;

use crate::{error::ModelCallError, renderer::PageImage};

pub use types::ModelInfo;

/// Seam over the hosted language model. Every call is a single attempt.
pub trait Structurer {
    /// Text-in-prompt call; returns the trimmed response.
    fn structure_text(&self, text: &str) -> Result<String, ModelCallError>;
    /// Multimodal call with the rendered page; returns the trimmed response.
    fn structure_image(&self, image: &PageImage) -> Result<String, ModelCallError>;
    fn list_models(&self) -> Result<Vec<ModelInfo>, ModelCallError>;
}
