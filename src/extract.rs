use crate::{
    cleanup,
    config::Config,
    error::DocumentOpenError,
    renderer::{PageImage, Renderer},
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Text,
    Image,
}

/// What gets sent to the model for one document.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractedContent {
    Text(String),
    Image(PageImage),
}

impl ExtractedContent {
    pub fn kind(&self) -> ContentKind {
        match self {
            ExtractedContent::Text(_) => ContentKind::Text,
            ExtractedContent::Image(_) => ContentKind::Image,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub content: ExtractedContent,
    pub page_count: usize,
    /// Chars of trimmed text, counted before any fallback.
    pub text_chars: usize,
}

/// Text wins when the trimmed text reaches `min_text_chars`; anything shorter is a scan.
pub fn classify_text(cfg: &Config, text: &str) -> ContentKind {
    if cleanup::significant_len(text) >= cfg.extraction.min_text_chars {
        ContentKind::Text
    } else {
        ContentKind::Image
    }
}

pub fn extract_document(
    cfg: &Config,
    renderer: &dyn Renderer,
    input: &Path,
) -> Result<Extraction, DocumentOpenError> {
    let pages = renderer.page_texts(input)?;
    let joined = cleanup::join_pages(&pages, &cfg.extraction.page_separator);
    let text = if cfg.extraction.normalize_text {
        cleanup::normalize_text(&joined)
    } else {
        joined
    };
    let text_chars = cleanup::significant_len(&text);

    let content = match classify_text(cfg, &text) {
        ContentKind::Text => ExtractedContent::Text(text),
        ContentKind::Image => {
            debug!(
                "{} has {} chars of text (< {}); rendering page {} at {}x",
                input.display(),
                text_chars,
                cfg.extraction.min_text_chars,
                cfg.extraction.render_page + 1,
                cfg.extraction.render_scale
            );
            let image = renderer.render_page(
                input,
                cfg.extraction.render_page,
                cfg.extraction.render_scale,
            )?;
            ExtractedContent::Image(image)
        }
    };

    Ok(Extraction {
        content,
        page_count: pages.len(),
        text_chars,
    })
}
