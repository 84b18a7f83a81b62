use serde::{Deserialize, Serialize};

/// A rendered page, PNG-encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageImage {
    pub width: u32,
    pub height: u32,
    #[serde(skip)]
    pub png: Vec<u8>,
}

impl PageImage {
    pub fn mime_type(&self) -> &'static str {
        "image/png"
    }
}
