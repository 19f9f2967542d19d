//! Cache snapshots and the read handle handed to callers.

use cdd_core::{
    build_default_table, resolve_against, AttributeRecord, DefaultTable, OverrideTable,
    StudyOverrides,
};
use chrono::{DateTime, Utc};
use std::ops::Deref;
use std::sync::Arc;

use crate::source::StudyOverrideLists;

/// The default table and the resolved override table from one refresh,
/// plus the time that refresh started.
///
/// Snapshots are immutable once built. A refresh replaces the whole
/// snapshot; it never edits one in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSnapshot {
    defaults: DefaultTable,
    overrides: OverrideTable,
    refreshed_at: DateTime<Utc>,
}

impl CacheSnapshot {
    /// Build a snapshot from raw source data.
    ///
    /// Every override is resolved against the new default table before it
    /// is stored. Returns the snapshot and the `(study, column_header)` of
    /// each override that had no matching default.
    pub fn build(
        defaults: Vec<AttributeRecord>,
        overrides: StudyOverrideLists,
        refreshed_at: DateTime<Utc>,
    ) -> (Self, Vec<(String, String)>) {
        let defaults = build_default_table(defaults);
        let mut unmatched = Vec::new();

        let mut override_table = OverrideTable::with_capacity(overrides.len());
        for (study_id, records) in overrides {
            let mut study = StudyOverrides::with_capacity(records.len());
            for record in records {
                let resolution = resolve_against(record, &defaults);
                if resolution.is_unmatched() {
                    unmatched.push((study_id.clone(), resolution.record().column_header.clone()));
                }
                let record = resolution.into_record();
                study.insert(record.column_header.clone(), record);
            }
            override_table.insert(study_id, study);
        }

        (
            Self {
                defaults,
                overrides: override_table,
                refreshed_at,
            },
            unmatched,
        )
    }

    pub fn defaults(&self) -> &DefaultTable {
        &self.defaults
    }

    pub fn overrides(&self) -> &OverrideTable {
        &self.overrides
    }

    pub fn refreshed_at(&self) -> DateTime<Utc> {
        self.refreshed_at
    }

    /// Resolved overrides for one study, if it has any.
    pub fn study_overrides(&self, study_id: &str) -> Option<&StudyOverrides> {
        self.overrides.get(study_id)
    }

    /// Total number of override records across every study.
    pub fn override_count(&self) -> usize {
        self.overrides.values().map(|s| s.len()).sum()
    }

    /// True when both tables hold the same data, ignoring the refresh time.
    pub fn same_contents(&self, other: &CacheSnapshot) -> bool {
        self.defaults == other.defaults && self.overrides == other.overrides
    }
}

/// A read of one table of the current snapshot.
///
/// Holds the snapshot alive for as long as the caller keeps the handle, so
/// the table cannot change underneath a reader. Dereferences to the table.
pub struct CacheRead<T: 'static> {
    snapshot: Arc<CacheSnapshot>,
    project: fn(&CacheSnapshot) -> &T,
}

impl<T: 'static> CacheRead<T> {
    pub(crate) fn new(snapshot: Arc<CacheSnapshot>, project: fn(&CacheSnapshot) -> &T) -> Self {
        Self { snapshot, project }
    }

    /// When the snapshot behind this read was refreshed.
    pub fn refreshed_at(&self) -> DateTime<Utc> {
        self.snapshot.refreshed_at()
    }
}

impl<T: 'static> Deref for CacheRead<T> {
    type Target = T;

    fn deref(&self) -> &T {
        (self.project)(&self.snapshot)
    }
}

impl<T: std::fmt::Debug + 'static> std::fmt::Debug for CacheRead<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheRead")
            .field("refreshed_at", &self.refreshed_at())
            .field("value", &**self)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn defaults() -> Vec<AttributeRecord> {
        vec![
            AttributeRecord::new("AGE", "Diagnosis Age", "Age at diagnosis.", "NUMBER", "PATIENT", "1"),
            AttributeRecord::new("LAST_STATUS", "Last Status", "Last Status.", "STRING", "PATIENT", "1"),
        ]
    }

    #[test]
    fn test_build_resolves_overrides() {
        let mut overrides = HashMap::new();
        overrides.insert(
            "mskimpact".to_string(),
            vec![AttributeRecord::new("AGE", "Age", "", "", "", "")],
        );

        let (snapshot, unmatched) = CacheSnapshot::build(defaults(), overrides, Utc::now());
        assert!(unmatched.is_empty());

        let age = &snapshot.study_overrides("mskimpact").unwrap()["AGE"];
        assert_eq!(age.display_name, "Age");
        assert_eq!(age.description, "Age at diagnosis.");
        assert_eq!(age.priority, "1");
        assert!(age.is_complete());
    }

    #[test]
    fn test_build_reports_unmatched_overrides() {
        let mut overrides = HashMap::new();
        overrides.insert(
            "study_a".to_string(),
            vec![AttributeRecord::new("UNKNOWN", "Unknown", "", "", "", "")],
        );

        let (snapshot, unmatched) = CacheSnapshot::build(defaults(), overrides, Utc::now());
        assert_eq!(unmatched, vec![("study_a".to_string(), "UNKNOWN".to_string())]);
        let stored = &snapshot.study_overrides("study_a").unwrap()["UNKNOWN"];
        assert_eq!(stored.display_name, "Unknown");
        assert_eq!(stored.priority, "");
    }

    #[test]
    fn test_override_count_and_empty_study() {
        let mut overrides = HashMap::new();
        overrides.insert("empty_study".to_string(), Vec::new());
        overrides.insert(
            "two".to_string(),
            vec![
                AttributeRecord::header_only("AGE"),
                AttributeRecord::header_only("LAST_STATUS"),
            ],
        );

        let (snapshot, _) = CacheSnapshot::build(defaults(), overrides, Utc::now());
        assert_eq!(snapshot.override_count(), 2);
        assert!(snapshot.study_overrides("empty_study").unwrap().is_empty());
        assert!(snapshot.study_overrides("missing").is_none());
    }

    #[test]
    fn test_cache_read_derefs_to_table() {
        let (snapshot, _) = CacheSnapshot::build(defaults(), HashMap::new(), Utc::now());
        let refreshed_at = snapshot.refreshed_at();
        let read = CacheRead::new(Arc::new(snapshot), CacheSnapshot::defaults);
        assert_eq!(read.len(), 2);
        assert!(read.contains_key("AGE"));
        assert_eq!(read.refreshed_at(), refreshed_at);
    }
}
