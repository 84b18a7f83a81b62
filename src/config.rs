use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub global: Global,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub extraction: Extraction,
    #[serde(default)]
    pub model: Model,
    #[serde(default)]
    pub prompt: Prompt,
    #[serde(default)]
    pub parsing: Parsing,
    #[serde(default)]
    pub currency: Currency,
    #[serde(default)]
    pub logging: Logging,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Global {
    pub print_summary: bool,
}
impl Default for Global {
    fn default() -> Self {
        Self {
            print_summary: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paths {
    /// Root folder scanned as `<input_dir>/<subfolder>/<document>`.
    pub input_dir: String,
    pub database: String,
    pub table: String,
    pub env_file: String,
    /// Where the JSON run report goes. Empty disables it.
    pub report_path: String,
}
impl Default for Paths {
    fn default() -> Self {
        Self {
            input_dir: "facturas".into(),
            database: "facturas.db".into(),
            table: "facturas".into(),
            env_file: ".env".into(),
            report_path: "".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Extraction {
    /// Trimmed text shorter than this (in chars) is treated as a scanned document.
    pub min_text_chars: usize,
    /// Linear zoom for the raster fallback; 2.0 means 4x pixel area.
    pub render_scale: f32,
    /// Zero-based page rendered for the raster fallback.
    pub render_page: u16,
    pub page_separator: String,
    pub normalize_text: bool,
}
impl Default for Extraction {
    fn default() -> Self {
        Self {
            min_text_chars: 50,
            render_scale: 2.0,
            render_page: 0,
            page_separator: "\n".into(),
            normalize_text: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    pub endpoint: String,
    pub model: String,
    pub api_key_env: String,
    /// Stop the run on the first credentials failure instead of skipping the document.
    pub abort_on_auth_error: bool,
}
impl Default for Model {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com/v1beta".into(),
            model: "gemini-flash-latest".into(),
            api_key_env: "GEMINI_API_KEY".into(),
            abort_on_auth_error: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompt {
    pub system_instruction: String,
    pub extraction_prompt: String,
    /// Placed between the extraction prompt and the document text.
    pub text_preamble: String,
    /// Placed before the extraction prompt when the page image is sent instead of text.
    pub image_preamble: String,
}
impl Default for Prompt {
    fn default() -> Self {
        Self {
            system_instruction: "Eres un experto en extracción de datos de facturas. \
                Devuelve solo el CSV sin explicaciones ni mensajes adicionales. \
                Si no puedes extraer datos, devuelve exactamente la palabra 'error' sin comillas."
                .into(),
            extraction_prompt: "Extrae las líneas de la factura en formato CSV separado por punto y coma (;). \
                La primera fila debe ser exactamente la cabecera: fecha_factura;proveedor;concepto;importe;moneda\n\
                - fecha_factura: fecha de emisión en formato DD/MM/AAAA.\n\
                - proveedor: nombre de la empresa que emite la factura.\n\
                - concepto: descripción breve del producto o servicio facturado.\n\
                - importe: importe total de la línea, sin símbolo de moneda, con coma como separador decimal.\n\
                - moneda: 'euros' o 'dolares', en minúsculas y sin tildes.\n\
                Escribe una fila por cada concepto facturado y no incluyas filas de totales."
                .into(),
            text_preamble: "Este es el texto a parsear:".into(),
            image_preamble: "Analiza esta imagen de factura.".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parsing {
    pub delimiter: String,
    /// Unwrap ```csv fenced blocks before parsing.
    pub strip_code_fences: bool,
}
impl Default for Parsing {
    fn default() -> Self {
        Self {
            delimiter: ";".into(),
            strip_code_fences: true,
        }
    }
}

impl Parsing {
    pub fn delimiter_byte(&self) -> u8 {
        self.delimiter.as_bytes().first().copied().unwrap_or(b';')
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Currency {
    /// Exact `moneda` value that gets converted.
    pub source: String,
    /// Multiplier into the reference currency.
    pub rate: f64,
}
impl Default for Currency {
    fn default() -> Self {
        Self {
            source: "dolares".into(),
            rate: 0.9243,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: false,
            file_path: "".into(),
        }
    }
}
