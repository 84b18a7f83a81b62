use crate::extract::ContentKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Structured,
    Declined,
    Rejected,
    ModelError,
    Unreadable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentReport {
    pub path: String,
    pub folder: String,
    pub outcome: OutcomeKind,
    pub content: Option<ContentKind>,
    pub records: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunTotals {
    pub folders: usize,
    pub documents: usize,
    pub structured: usize,
    pub skipped: usize,
    pub records: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    pub started: String,
    pub finished: String,
    pub totals: RunTotals,
    pub documents: Vec<DocumentReport>,
}

impl RunReport {
    pub fn push(&mut self, doc: DocumentReport) {
        self.totals.documents += 1;
        if doc.outcome == OutcomeKind::Structured {
            self.totals.structured += 1;
            self.totals.records += doc.records;
        } else {
            self.totals.skipped += 1;
        }
        self.documents.push(doc);
    }

    pub fn count(&self, outcome: OutcomeKind) -> usize {
        self.documents.iter().filter(|d| d.outcome == outcome).count()
    }
}
