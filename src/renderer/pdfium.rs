use super::{PageImage, Renderer};
use crate::error::DocumentOpenError;
use anyhow::{anyhow, Result};
use image::{ImageFormat, RgbaImage};
use pdfium_render::prelude::*;
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

pub struct PdfiumRenderer {
    pdfium: Pdfium,
}

impl PdfiumRenderer {
    /// Binds a PDFium library next to the binary, falling back to the system one.
    pub fn new() -> Result<Self> {
        let bindings =
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library())
                .map_err(|e| anyhow!("failed to bind PDFium: {e}"))?;
        Ok(Self {
            pdfium: Pdfium::new(bindings),
        })
    }

    fn open<'a>(&'a self, input: &Path) -> Result<PdfDocument<'a>, DocumentOpenError> {
        self.pdfium
            .load_pdf_from_file(input, None)
            .map_err(|e| DocumentOpenError::new(input.display().to_string(), e))
    }
}

impl Renderer for PdfiumRenderer {
    fn page_texts(&self, input: &Path) -> Result<Vec<String>, DocumentOpenError> {
        let doc = self.open(input)?;
        let mut texts = Vec::new();
        for (i, page) in doc.pages().iter().enumerate() {
            let text = page
                .text()
                .map_err(|e| {
                    DocumentOpenError::new(input.display().to_string(), format!("page {}: {e}", i + 1))
                })?
                .all();
            texts.push(text);
        }
        debug!("pdfium text {} pages={}", input.display(), texts.len());
        Ok(texts)
    }

    fn render_page(
        &self,
        input: &Path,
        page: u16,
        scale: f32,
    ) -> Result<PageImage, DocumentOpenError> {
        let path = input.display().to_string();
        let doc = self.open(input)?;
        let page_ref = doc
            .pages()
            .get(page)
            .map_err(|e| DocumentOpenError::new(path.clone(), format!("page {}: {e}", page + 1)))?;

        let bitmap = page_ref
            .render_with_config(&PdfRenderConfig::new().scale_page_by_factor(scale))
            .map_err(|e| DocumentOpenError::new(path.clone(), format!("render: {e}")))?;

        let width = bitmap.width() as u32;
        let height = bitmap.height() as u32;
        let rgba = RgbaImage::from_raw(width, height, bitmap.as_rgba_bytes())
            .ok_or_else(|| DocumentOpenError::new(path.clone(), "bitmap size mismatch"))?;

        let mut png = Vec::new();
        rgba.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| DocumentOpenError::new(path.clone(), format!("png encode: {e}")))?;

        debug!(
            "pdfium render {} page={} scale={} {}x{}",
            path, page, scale, width, height
        );
        Ok(PageImage { width, height, png })
    }
}
