use crate::{batch::PersistedRow, util::ensure_dir};
use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection};
use std::path::Path;
use tracing::debug;

/// Append-only SQLite sink. One connection per run.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                ensure_dir(parent)?;
            }
        }
        let conn = Connection::open(path)
            .with_context(|| format!("opening database: {}", path.display()))?;
        Ok(Self { conn })
    }

    /// Appends all rows in a single transaction; the table is created on first use.
    pub fn append(&mut self, table: &str, rows: &[PersistedRow]) -> Result<usize> {
        let table = quoted_table(table)?;
        let tx = self.conn.transaction().with_context(|| "begin transaction")?;

        tx.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                fecha_factura TEXT,
                proveedor TEXT,
                concepto TEXT,
                importe REAL
            );"
        ))
        .with_context(|| format!("creating table {table}"))?;

        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {table} (fecha_factura, proveedor, concepto, importe) VALUES (?1, ?2, ?3, ?4)"
            ))?;
            for r in rows {
                stmt.execute(params![r.fecha_factura, r.proveedor, r.concepto, r.importe])
                    .with_context(|| format!("inserting into {table}"))?;
            }
        }

        tx.commit().with_context(|| "commit")?;
        debug!("appended {} rows to {table}", rows.len());
        Ok(rows.len())
    }

    pub fn count(&self, table: &str) -> Result<u64> {
        let table = quoted_table(table)?;
        let n: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))
            .with_context(|| format!("counting rows in {table}"))?;
        Ok(n as u64)
    }
}

fn quoted_table(name: &str) -> Result<String> {
    let valid = !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if !valid {
        bail!("invalid table name: {name:?}");
    }
    Ok(format!("\"{name}\""))
}
