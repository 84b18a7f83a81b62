use crate::{
    batch::InvoiceBatch,
    config::Config,
    error::{DocumentOpenError, ModelCallError, ParseRejection},
    extract::{self, ContentKind, ExtractedContent},
    model::Structurer,
    parse::{self, InvoiceRecord},
    renderer::Renderer,
    report::{DocumentReport, OutcomeKind, RunReport},
    store::Store,
    util::{display_name, now_rfc3339},
};
use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub struct Pipeline<R: Renderer, S: Structurer> {
    cfg: Config,
    renderer: R,
    structurer: S,
}

pub struct RunOutput {
    pub batch: InvoiceBatch,
    pub report: RunReport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Saved {
    pub converted: usize,
    pub persisted: usize,
    /// Rows in the table after the append, earlier runs included.
    pub table_rows: u64,
}

#[derive(Debug, Clone)]
pub struct DocumentFolder {
    pub path: PathBuf,
    pub documents: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub enum DocumentOutcome {
    Structured {
        content: ContentKind,
        records: Vec<InvoiceRecord>,
    },
    Declined {
        content: ContentKind,
    },
    Rejected {
        content: ContentKind,
        reason: ParseRejection,
    },
    ModelError {
        content: ContentKind,
        error: ModelCallError,
    },
    Unreadable(DocumentOpenError),
}

impl DocumentOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            DocumentOutcome::Structured { .. } => OutcomeKind::Structured,
            DocumentOutcome::Declined { .. } => OutcomeKind::Declined,
            DocumentOutcome::Rejected { .. } => OutcomeKind::Rejected,
            DocumentOutcome::ModelError { .. } => OutcomeKind::ModelError,
            DocumentOutcome::Unreadable(_) => OutcomeKind::Unreadable,
        }
    }

    fn content(&self) -> Option<ContentKind> {
        match self {
            DocumentOutcome::Structured { content, .. }
            | DocumentOutcome::Declined { content }
            | DocumentOutcome::Rejected { content, .. }
            | DocumentOutcome::ModelError { content, .. } => Some(*content),
            DocumentOutcome::Unreadable(_) => None,
        }
    }

    fn detail(&self) -> Option<String> {
        match self {
            DocumentOutcome::Structured { .. } => None,
            DocumentOutcome::Declined { .. } => Some(ParseRejection::ModelDeclined.to_string()),
            DocumentOutcome::Rejected { reason, .. } => Some(reason.to_string()),
            DocumentOutcome::ModelError { error, .. } => Some(error.to_string()),
            DocumentOutcome::Unreadable(e) => Some(e.to_string()),
        }
    }

    fn report(&self, doc: &Path, folder: &Path) -> DocumentReport {
        let records = match self {
            DocumentOutcome::Structured { records, .. } => records.len(),
            _ => 0,
        };
        DocumentReport {
            path: doc.display().to_string(),
            folder: display_name(folder),
            outcome: self.kind(),
            content: self.content(),
            records,
            detail: self.detail(),
        }
    }
}

impl<R: Renderer, S: Structurer> Pipeline<R, S> {
    pub fn new(cfg: &Config, renderer: R, structurer: S) -> Self {
        Self {
            cfg: cfg.clone(),
            renderer,
            structurer,
        }
    }

    /// Scans, extracts, structures and parses every document. Persistence is left to the caller.
    pub fn run(&self) -> Result<RunOutput> {
        let input_dir = Path::new(&self.cfg.paths.input_dir);
        let folders = discover_documents(input_dir)?;

        let mut batch = InvoiceBatch::new();
        let mut report = RunReport {
            started: now_rfc3339(),
            ..Default::default()
        };
        report.totals.folders = folders.len();

        for folder in &folders {
            info!(
                "folder {} documents={}",
                folder.path.display(),
                folder.documents.len()
            );

            for doc in &folder.documents {
                info!("processing invoice {}", doc.display());
                let outcome = self.process_document(doc);

                if let DocumentOutcome::ModelError { error, .. } = &outcome {
                    if error.is_credentials() && self.cfg.model.abort_on_auth_error {
                        if !batch.is_empty() {
                            warn!(
                                "discarding {} rows from {} structured documents; nothing was saved",
                                batch.len(),
                                report.totals.structured
                            );
                        }
                        return Err(anyhow!(
                            "model credentials rejected while processing {}: {error} \
                             ({} rows gathered before the failure were not saved)",
                            doc.display(),
                            batch.len()
                        ));
                    }
                }

                report.push(outcome.report(doc, &folder.path));

                match outcome {
                    DocumentOutcome::Structured { records, .. } => {
                        info!("invoice structured rows={}", records.len());
                        batch.append(records);
                    }
                    other => {
                        let detail = other.detail().unwrap_or_default();
                        warn!("invoice skipped ({:?}): {detail}", other.kind());
                    }
                }
            }
        }

        report.finished = now_rfc3339();
        Ok(RunOutput { batch, report })
    }

    /// Failure boundary for one document: nothing here aborts the batch.
    pub fn process_document(&self, doc: &Path) -> DocumentOutcome {
        let extraction = match extract::extract_document(&self.cfg, &self.renderer, doc) {
            Ok(e) => e,
            Err(e) => return DocumentOutcome::Unreadable(e),
        };
        let content = extraction.content.kind();
        debug!(
            "extracted {} pages={} text_chars={} content={:?}",
            doc.display(),
            extraction.page_count,
            extraction.text_chars,
            content
        );

        let response = match &extraction.content {
            ExtractedContent::Text(text) => self.structurer.structure_text(text),
            ExtractedContent::Image(image) => self.structurer.structure_image(image),
        };
        let raw = match response {
            Ok(raw) => raw,
            Err(error) => return DocumentOutcome::ModelError { content, error },
        };
        debug!("model response for {}:\n{}", doc.display(), raw);

        match parse::parse_response(&self.cfg, &raw) {
            Ok(records) => DocumentOutcome::Structured { content, records },
            Err(ParseRejection::ModelDeclined) => DocumentOutcome::Declined { content },
            Err(reason) => DocumentOutcome::Rejected { content, reason },
        }
    }
}

/// Subfolders in lexicographic order; files inside each in directory listing order.
pub fn discover_documents(input_dir: &Path) -> Result<Vec<DocumentFolder>> {
    let entries = std::fs::read_dir(input_dir)
        .with_context(|| format!("reading input dir: {}", input_dir.display()))?;

    let mut folders = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            folders.push(path);
        } else {
            debug!("ignoring top-level file {}", path.display());
        }
    }
    folders.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    let mut out = Vec::with_capacity(folders.len());
    for path in folders {
        let mut documents = Vec::new();
        let entries = std::fs::read_dir(&path)
            .with_context(|| format!("reading folder: {}", path.display()))?;
        for entry in entries {
            let doc = entry?.path();
            if doc.is_file() {
                documents.push(doc);
            }
        }
        out.push(DocumentFolder { path, documents });
    }
    Ok(out)
}

/// Hints printed when a run structured nothing.
pub fn empty_run_guidance(cfg: &Config, report: &RunReport) -> Vec<String> {
    vec![
        "no invoices were structured; nothing to save".to_string(),
        format!(
            "check that the PDFs contain readable text or a legible first page (unreadable: {})",
            report.count(OutcomeKind::Unreadable)
        ),
        format!(
            "check that {} is set in {} and that the key is valid (model errors: {})",
            cfg.model.api_key_env,
            cfg.paths.env_file,
            report.count(OutcomeKind::ModelError)
        ),
        format!(
            "rerun with --log-level debug to see each raw model response (declined: {}, rejected: {})",
            report.count(OutcomeKind::Declined),
            report.count(OutcomeKind::Rejected)
        ),
    ]
}

/// End-of-run step: currency normalization once over the whole batch, then one append.
pub fn save_batch(cfg: &Config, batch: InvoiceBatch) -> Result<Saved> {
    let finalized = batch.finalize(&cfg.currency.source, cfg.currency.rate);
    let mut store = Store::open(Path::new(&cfg.paths.database))?;
    let persisted = store.append(&cfg.paths.table, &finalized.rows)?;
    let table_rows = store.count(&cfg.paths.table)?;
    Ok(Saved {
        converted: finalized.converted,
        persisted,
        table_rows,
    })
}
