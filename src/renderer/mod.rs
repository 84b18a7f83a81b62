pub mod pdfium;
pub mod types;

use crate::error::DocumentOpenError;
use std::path::Path;

pub use types::PageImage;

/// Seam over the PDF library: plain text per page and raster rendering.
pub trait Renderer {
    fn page_texts(&self, input: &Path) -> Result<Vec<String>, DocumentOpenError>;
    fn render_page(&self, input: &Path, page: u16, scale: f32)
        -> Result<PageImage, DocumentOpenError>;
}
