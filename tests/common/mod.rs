#![allow(dead_code)]

use facturia::{
    batch::PersistedRow,
    error::{DocumentOpenError, ModelCallError},
    model::{ModelInfo, Structurer},
    renderer::{PageImage, Renderer},
};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;

/// Serves page text by file name; unknown names fail to open.
#[derive(Default)]
pub struct FakeRenderer {
    pub pages: HashMap<String, Vec<String>>,
    pub renders: RefCell<Vec<(String, u16, f32)>>,
}

impl FakeRenderer {
    pub fn with(mut self, name: &str, pages: &[&str]) -> Self {
        self.pages
            .insert(name.to_string(), pages.iter().map(|p| p.to_string()).collect());
        self
    }
}

fn name_of(p: &Path) -> String {
    p.file_name().unwrap().to_string_lossy().into_owned()
}

impl Renderer for FakeRenderer {
    fn page_texts(&self, input: &Path) -> Result<Vec<String>, DocumentOpenError> {
        self.pages
            .get(&name_of(input))
            .cloned()
            .ok_or_else(|| DocumentOpenError::new(input.display().to_string(), "not a PDF"))
    }

    fn render_page(
        &self,
        input: &Path,
        page: u16,
        scale: f32,
    ) -> Result<PageImage, DocumentOpenError> {
        let name = name_of(input);
        self.renders.borrow_mut().push((name.clone(), page, scale));
        Ok(PageImage {
            width: 1190,
            height: 1684,
            png: name.into_bytes(),
        })
    }
}

/// Answers by looking for a key inside the text; images answer by their payload.
#[derive(Default)]
pub struct FakeModel {
    pub by_marker: Vec<(String, Result<String, ModelCallError>)>,
    pub calls: RefCell<Vec<String>>,
}

impl FakeModel {
    pub fn answer(mut self, marker: &str, reply: &str) -> Self {
        self.by_marker
            .push((marker.to_string(), Ok(reply.to_string())));
        self
    }

    pub fn fail(mut self, marker: &str, err: ModelCallError) -> Self {
        self.by_marker.push((marker.to_string(), Err(err)));
        self
    }

    fn lookup(&self, key: &str) -> Result<String, ModelCallError> {
        self.calls.borrow_mut().push(key.to_string());
        self.by_marker
            .iter()
            .find(|(m, _)| key.contains(m.as_str()))
            .map(|(_, r)| r.clone())
            .unwrap_or_else(|| Ok("error".to_string()))
    }
}

impl Structurer for FakeModel {
    fn structure_text(&self, text: &str) -> Result<String, ModelCallError> {
        self.lookup(text)
    }

    fn structure_image(&self, image: &PageImage) -> Result<String, ModelCallError> {
        self.lookup(&String::from_utf8_lossy(&image.png))
    }

    fn list_models(&self) -> Result<Vec<ModelInfo>, ModelCallError> {
        Ok(Vec::new())
    }
}

/// Long enough to count as a text document.
pub fn invoice_text(marker: &str) -> String {
    format!("FACTURA {marker}\nProveedor: Suministros Levante S.L.\nFecha: 03/02/2024\nTotal: 50,00 EUR")
}

pub const HEADER: &str = "fecha_factura;proveedor;concepto;importe;moneda";

/// Reads a table back in insertion order, bypassing the store.
pub fn stored_rows(db: &Path, table: &str) -> Vec<PersistedRow> {
    let conn = rusqlite::Connection::open(db).unwrap();
    let mut stmt = conn
        .prepare(&format!(
            "SELECT fecha_factura, proveedor, concepto, importe FROM {table} ORDER BY rowid"
        ))
        .unwrap();
    stmt.query_map([], |r| {
        Ok(PersistedRow {
            fecha_factura: r.get(0)?,
            proveedor: r.get(1)?,
            concepto: r.get(2)?,
            importe: r.get(3)?,
        })
    })
    .unwrap()
    .collect::<Result<_, _>>()
    .unwrap()
}
