use crate::parse::InvoiceRecord;
use serde::{Deserialize, Serialize};

/// Records accumulated over one run, in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct InvoiceBatch {
    records: Vec<InvoiceRecord>,
}

/// Stored shape of a record: the currency column is gone after normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedRow {
    pub fecha_factura: String,
    pub proveedor: String,
    pub concepto: String,
    pub importe: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct FinalizedBatch {
    pub rows: Vec<PersistedRow>,
    /// Rows whose amount was converted into the reference currency.
    pub converted: usize,
}

impl InvoiceBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, records: Vec<InvoiceRecord>) {
        self.records.extend(records);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Converts every `moneda == source` amount by `rate`, then drops the currency.
    /// Consumes the batch so the conversion runs exactly once.
    pub fn finalize(self, source: &str, rate: f64) -> FinalizedBatch {
        let mut converted = 0;
        let rows = self
            .records
            .into_iter()
            .map(|r| {
                let importe = match r.importe {
                    Some(v) if r.moneda == source => {
                        converted += 1;
                        Some(v * rate)
                    }
                    other => other,
                };
                PersistedRow {
                    fecha_factura: r.fecha_factura,
                    proveedor: r.proveedor,
                    concepto: r.concepto,
                    importe,
                }
            })
            .collect();

        FinalizedBatch { rows, converted }
    }
}
