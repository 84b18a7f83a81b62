use crate::{config::Config, error::ParseRejection};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::{debug, warn};

pub const REQUIRED_COLUMNS: [&str; 5] = [
    "fecha_factura",
    "proveedor",
    "concepto",
    "importe",
    "moneda",
];

/// Token the model answers with when it cannot extract anything.
pub const DECLINE_TOKEN: &str = "error";

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^```[A-Za-z]*[ \t]*\r?\n(.*?)\r?\n?```$").unwrap());

/// One invoice line as returned by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    pub fecha_factura: String,
    pub proveedor: String,
    pub concepto: String,
    /// `None` when the cell is not a number.
    pub importe: Option<f64>,
    pub moneda: String,
}

/// Parses a model response; every rejection drops the whole response.
pub fn parse_response(cfg: &Config, raw: &str) -> Result<Vec<InvoiceRecord>, ParseRejection> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case(DECLINE_TOKEN) {
        return Err(ParseRejection::ModelDeclined);
    }

    let body = if cfg.parsing.strip_code_fences {
        strip_code_fences(trimmed)
    } else {
        trimmed
    };

    let delimiter = cfg.parsing.delimiter_byte();
    if let Some(line) = unterminated_quote(body, delimiter) {
        return Err(ParseRejection::Malformed(format!(
            "quoted field opened on line {line} is never closed"
        )));
    }

    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| ParseRejection::Malformed(e.to_string()))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|c| !headers.iter().any(|h| h == *c))
        .map(|c| c.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ParseRejection::MissingColumns {
            missing,
            found: headers,
        });
    }

    let idx = |name: &str| headers.iter().position(|h| h == name).unwrap_or(0);
    let (i_fecha, i_prov, i_conc, i_imp, i_mon) = (
        idx("fecha_factura"),
        idx("proveedor"),
        idx("concepto"),
        idx("importe"),
        idx("moneda"),
    );

    let mut records = Vec::new();
    for (line, row) in rdr.records().enumerate() {
        let row = row.map_err(|e| ParseRejection::Malformed(e.to_string()))?;
        if row.iter().all(|f| f.is_empty()) {
            continue;
        }
        if row.len() > headers.len() {
            return Err(ParseRejection::Malformed(format!(
                "row {} has {} fields, header has {}",
                line + 1,
                row.len(),
                headers.len()
            )));
        }
        let cell = |i: usize| row.get(i).unwrap_or("").to_string();
        let raw_amount = cell(i_imp);
        let importe = coerce_amount(&raw_amount);
        if importe.is_none() && !raw_amount.is_empty() {
            debug!("importe {raw_amount:?} is not numeric; keeping row without amount");
        }
        records.push(InvoiceRecord {
            fecha_factura: cell(i_fecha),
            proveedor: cell(i_prov),
            concepto: cell(i_conc),
            importe,
            moneda: cell(i_mon),
        });
    }

    if records.is_empty() {
        return Err(ParseRejection::NoRows);
    }
    Ok(records)
}

/// Lenient form: any rejection is logged and becomes an empty result.
pub fn csv_to_records(cfg: &Config, raw: &str) -> Vec<InvoiceRecord> {
    match parse_response(cfg, raw) {
        Ok(records) => records,
        Err(rejection) => {
            warn!("response rejected: {rejection}");
            Vec::new()
        }
    }
}

/// Comma is the decimal separator; periods before it are digit grouping.
pub fn coerce_amount(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    let normalized = match (s.rfind(','), s.rfind('.')) {
        // "1,234.56": a period after the comma means another scheme entirely.
        (Some(comma), Some(period)) if period > comma => return None,
        (Some(_), _) => s.replace('.', "").replace(',', "."),
        (None, _) => s.to_string(),
    };

    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Line where a quoted field starts and never closes. The reader would
/// otherwise swallow the rest of the input into that field.
fn unterminated_quote(body: &str, delimiter: u8) -> Option<usize> {
    let bytes = body.as_bytes();
    let mut line = 1;
    let mut field_start = true;
    let mut opened_on: Option<usize> = None;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if opened_on.is_some() {
            if b == b'"' {
                if bytes.get(i + 1) == Some(&b'"') {
                    i += 1;
                } else {
                    opened_on = None;
                }
            } else if b == b'\n' {
                line += 1;
            }
        } else if b == b'"' && field_start {
            opened_on = Some(line);
            field_start = false;
        } else if b == delimiter || b == b'\r' {
            field_start = true;
        } else if b == b'\n' {
            line += 1;
            field_start = true;
        } else {
            field_start = false;
        }
        i += 1;
    }
    opened_on
}

fn strip_code_fences(s: &str) -> &str {
    CODE_FENCE
        .captures(s)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(s)
}
