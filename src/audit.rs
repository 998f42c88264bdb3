use std::collections::VecDeque;

use crate::limits::MAX_AUDIT_RECORDS;
use crate::model::AuditRecord;

/// Append-only trail of administrative actions, bounded to the most recent
/// [`MAX_AUDIT_RECORDS`], newest first.
#[derive(Debug, Default)]
pub struct AuditTrail {
    records: VecDeque<AuditRecord>,
}

impl AuditTrail {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend a record and drop everything past the bound.
    pub fn push(&mut self, record: AuditRecord) {
        self.records.push_front(record);
        self.records.truncate(MAX_AUDIT_RECORDS);
    }

    /// Records newest first.
    pub fn records(&self) -> impl Iterator<Item = &AuditRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
