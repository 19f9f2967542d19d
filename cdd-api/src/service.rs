//! Clinical data dictionary queries.
//!
//! Every query reads the cache's current snapshot and nothing else. Before
//! the first successful refresh all of them report
//! [`LookupError::SourceUnresponsive`].

use std::collections::BTreeMap;
use std::sync::Arc;

use cdd_cache::{CacheSnapshot, MetadataCache, RefreshReport};
use cdd_core::{AttributeRecord, LookupError, RefreshError, StudyOverrides};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::telemetry::metrics;

/// Result of looking up several column headers at once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderLookup {
    /// Records for the headers that exist, in request order.
    pub found: Vec<AttributeRecord>,
    /// Headers with no record, in request order.
    pub missing: Vec<String>,
}

/// Cache state reported to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CacheStatus {
    pub populated: bool,
    pub stale: bool,
    pub refreshing: bool,
    pub refreshed_at: Option<DateTime<Utc>>,
    pub age_seconds: Option<i64>,
    pub max_age_days: i64,
    pub attribute_count: usize,
    pub study_count: usize,
    pub override_count: usize,
}

/// Read-only query surface over the metadata cache, plus the operator
/// refresh.
#[derive(Clone)]
pub struct DictionaryService {
    cache: Arc<MetadataCache>,
}

impl DictionaryService {
    pub fn new(cache: Arc<MetadataCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<MetadataCache> {
        &self.cache
    }

    fn snapshot(&self) -> Result<Arc<CacheSnapshot>, LookupError> {
        self.cache.snapshot().ok_or(LookupError::SourceUnresponsive)
    }

    /// Every attribute, sorted by column header.
    ///
    /// With a study, that study's overrides replace the defaults with the same
    /// header, and override-only headers are included.
    pub fn clinical_attribute_metadata(
        &self,
        study: Option<&str>,
    ) -> Result<Vec<AttributeRecord>, LookupError> {
        let snapshot = self.snapshot()?;
        let overrides = study_overrides(&snapshot, study)?;

        let mut merged: BTreeMap<&str, &AttributeRecord> = snapshot
            .defaults()
            .iter()
            .map(|(header, record)| (header.as_str(), record))
            .collect();
        if let Some(overrides) = overrides {
            merged.extend(
                overrides
                    .iter()
                    .map(|(header, record)| (header.as_str(), record)),
            );
        }

        Ok(merged.into_values().cloned().collect())
    }

    /// Look up each header, collecting hits and misses separately.
    pub fn lookup_column_headers<S: AsRef<str>>(
        &self,
        study: Option<&str>,
        column_headers: &[S],
    ) -> Result<HeaderLookup, LookupError> {
        let snapshot = self.snapshot()?;
        let overrides = study_overrides(&snapshot, study)?;

        let mut lookup = HeaderLookup::default();
        for header in column_headers {
            let header = header.as_ref();
            match effective_record(&snapshot, overrides, header) {
                Some(record) => lookup.found.push(record.clone()),
                None => lookup.missing.push(header.to_string()),
            }
        }
        Ok(lookup)
    }

    /// Records for every header, or one error naming all missing headers.
    pub fn metadata_by_column_headers<S: AsRef<str>>(
        &self,
        study: Option<&str>,
        column_headers: &[S],
    ) -> Result<Vec<AttributeRecord>, LookupError> {
        let lookup = self.lookup_column_headers(study, column_headers)?;
        if !lookup.missing.is_empty() {
            return Err(LookupError::AttributesNotFound {
                column_headers: lookup.missing,
            });
        }
        Ok(lookup.found)
    }

    pub fn metadata_by_column_header(
        &self,
        study: Option<&str>,
        column_header: &str,
    ) -> Result<AttributeRecord, LookupError> {
        let snapshot = self.snapshot()?;
        let overrides = study_overrides(&snapshot, study)?;
        effective_record(&snapshot, overrides, column_header)
            .cloned()
            .ok_or_else(|| LookupError::AttributesNotFound {
                column_headers: vec![column_header.to_string()],
            })
    }

    /// Default attributes matching the search terms, sorted by column header.
    ///
    /// A term matches a record when it occurs, ignoring case, in the column
    /// header, display name or description. `inclusive` accepts a record
    /// matching any term; otherwise every term must match.
    pub fn metadata_by_search_terms<S: AsRef<str>>(
        &self,
        search_terms: &[S],
        attribute_type: Option<&str>,
        inclusive: bool,
    ) -> Result<Vec<AttributeRecord>, LookupError> {
        let snapshot = self.snapshot()?;

        let terms: Vec<String> = search_terms
            .iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();

        let mut matches: Vec<AttributeRecord> = snapshot
            .defaults()
            .values()
            .filter(|record| {
                attribute_type.map_or(true, |wanted| {
                    record.attribute_type.eq_ignore_ascii_case(wanted.trim())
                })
            })
            .filter(|record| matches_terms(record, &terms, inclusive))
            .cloned()
            .collect();

        if matches.is_empty() {
            return Err(LookupError::NoSearchMatches {
                search_terms: search_terms.iter().map(|t| t.as_ref().to_string()).collect(),
            });
        }

        matches.sort_by(|a, b| a.column_header.cmp(&b.column_header));
        Ok(matches)
    }

    /// Ids of studies with overrides, sorted.
    pub fn cancer_studies(&self) -> Result<Vec<String>, LookupError> {
        let snapshot = self.snapshot()?;
        let mut studies: Vec<String> = snapshot.overrides().keys().cloned().collect();
        studies.sort();
        Ok(studies)
    }

    /// Refresh now, waiting for any refresh already running.
    pub async fn force_reset_cache(&self) -> Result<RefreshReport, RefreshError> {
        tracing::info!("Operator requested cache refresh");
        let result = self.cache.refresh().await;
        if let Some(m) = metrics() {
            match &result {
                Ok(report) => m.record_refresh_success(report),
                Err(_) => m.record_refresh_failure(),
            }
        }
        result
    }

    pub fn cache_status(&self) -> CacheStatus {
        let now = self.cache.now();
        let snapshot = self.cache.snapshot();
        let window = self.cache.config().staleness_window;
        if let (Some(m), Some(s)) = (metrics(), snapshot.as_ref()) {
            m.observe_snapshot(s);
        }

        CacheStatus {
            populated: snapshot.is_some(),
            stale: self.cache.is_stale(now),
            refreshing: self.cache.is_refreshing(),
            refreshed_at: snapshot.as_ref().map(|s| s.refreshed_at()),
            age_seconds: snapshot
                .as_ref()
                .map(|s| cdd_cache::StalenessWindow::age(s.refreshed_at(), now).num_seconds()),
            max_age_days: window.window().num_days(),
            attribute_count: snapshot.as_ref().map_or(0, |s| s.defaults().len()),
            study_count: snapshot.as_ref().map_or(0, |s| s.overrides().len()),
            override_count: snapshot.as_ref().map_or(0, |s| s.override_count()),
        }
    }

    /// True once a snapshot has been published.
    pub fn is_ready(&self) -> bool {
        self.cache.is_populated()
    }
}

fn study_overrides<'a>(
    snapshot: &'a CacheSnapshot,
    study: Option<&str>,
) -> Result<Option<&'a StudyOverrides>, LookupError> {
    match study {
        None => Ok(None),
        Some(study_id) => snapshot
            .study_overrides(study_id)
            .map(Some)
            .ok_or_else(|| LookupError::StudyNotFound {
                study_id: study_id.to_string(),
            }),
    }
}

fn effective_record<'a>(
    snapshot: &'a CacheSnapshot,
    overrides: Option<&'a StudyOverrides>,
    column_header: &str,
) -> Option<&'a AttributeRecord> {
    overrides
        .and_then(|o| o.get(column_header))
        .or_else(|| snapshot.defaults().get(column_header))
}

fn matches_terms(record: &AttributeRecord, terms: &[String], inclusive: bool) -> bool {
    if terms.is_empty() {
        return false;
    }
    let haystacks = [
        record.column_header.to_lowercase(),
        record.display_name.to_lowercase(),
        record.description.to_lowercase(),
    ];
    let hit = |term: &String| haystacks.iter().any(|h| h.contains(term.as_str()));
    if inclusive {
        terms.iter().any(hit)
    } else {
        terms.iter().all(hit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cdd_cache::{CacheConfig, MetadataSource, StudyOverrideLists};
    use cdd_core::{ManualClock, SourceError};

    struct StaticSource;

    #[async_trait]
    impl MetadataSource for StaticSource {
        async fn fetch_defaults(&self) -> Result<Vec<AttributeRecord>, SourceError> {
            Ok(vec![
                AttributeRecord::new("AGE", "Diagnosis Age", "Age at which a condition or disease was first diagnosed.", "NUMBER", "PATIENT", "1"),
                AttributeRecord::new("DISEASE_STAGE", "Disease Stage", "Disease Stage", "STRING", "SAMPLE", "1"),
                AttributeRecord::new("LAST_STATUS", "Last Status", "Last Status.", "STRING", "PATIENT", "1"),
            ])
        }

        async fn fetch_overrides(&self) -> Result<StudyOverrideLists, SourceError> {
            let mut overrides = StudyOverrideLists::new();
            overrides.insert(
                "test_override_study".to_string(),
                vec![
                    AttributeRecord::new("DISEASE_STAGE", "", "", "", "PATIENT", "10"),
                    AttributeRecord::new("STUDY_ONLY", "Study Only", "Only here", "STRING", "SAMPLE", "1"),
                ],
            );
            overrides.insert("empty_study".to_string(), Vec::new());
            Ok(overrides)
        }
    }

    fn service() -> DictionaryService {
        DictionaryService::new(Arc::new(MetadataCache::new(
            Arc::new(StaticSource),
            Arc::new(ManualClock::default()),
            CacheConfig::default(),
        )))
    }

    async fn populated() -> DictionaryService {
        let service = service();
        service.force_reset_cache().await.unwrap();
        service
    }

    #[test]
    fn test_empty_cache_is_unresponsive() {
        let service = service();
        assert_eq!(
            service.clinical_attribute_metadata(None),
            Err(LookupError::SourceUnresponsive)
        );
        assert_eq!(
            service.metadata_by_column_header(None, "AGE"),
            Err(LookupError::SourceUnresponsive)
        );
        assert_eq!(service.cancer_studies(), Err(LookupError::SourceUnresponsive));
        assert!(!service.is_ready());
        assert!(service.cache_status().stale);
    }

    #[tokio::test]
    async fn test_all_attributes_sorted() {
        let service = populated().await;
        let headers: Vec<String> = service
            .clinical_attribute_metadata(None)
            .unwrap()
            .into_iter()
            .map(|r| r.column_header)
            .collect();
        assert_eq!(headers, vec!["AGE", "DISEASE_STAGE", "LAST_STATUS"]);
    }

    #[tokio::test]
    async fn test_study_view_merges_overrides() {
        let service = populated().await;
        let records = service
            .clinical_attribute_metadata(Some("test_override_study"))
            .unwrap();
        assert_eq!(records.len(), 4);

        let stage = records
            .iter()
            .find(|r| r.column_header == "DISEASE_STAGE")
            .unwrap();
        assert_eq!(stage.attribute_type, "PATIENT");
        assert_eq!(stage.priority, "10");
        assert_eq!(stage.display_name, "Disease Stage");
    }

    #[tokio::test]
    async fn test_unknown_study_is_not_found() {
        let service = populated().await;
        assert_eq!(
            service.clinical_attribute_metadata(Some("nope")),
            Err(LookupError::StudyNotFound {
                study_id: "nope".to_string()
            })
        );
        // A study listed with no overrides is still known.
        assert_eq!(
            service.clinical_attribute_metadata(Some("empty_study")).unwrap().len(),
            3
        );
    }

    #[tokio::test]
    async fn test_lookup_reports_all_missing_headers() {
        let service = populated().await;
        let lookup = service
            .lookup_column_headers(None, &["FOO", "AGE", "BAR"])
            .unwrap();
        assert_eq!(lookup.found.len(), 1);
        assert_eq!(lookup.found[0].column_header, "AGE");
        assert_eq!(lookup.missing, vec!["FOO", "BAR"]);

        assert_eq!(
            service.metadata_by_column_headers(None, &["FOO", "AGE", "BAR"]),
            Err(LookupError::AttributesNotFound {
                column_headers: vec!["FOO".to_string(), "BAR".to_string()]
            })
        );
    }

    #[tokio::test]
    async fn test_lookup_preserves_request_order() {
        let service = populated().await;
        let records = service
            .metadata_by_column_headers(None, &["LAST_STATUS", "AGE"])
            .unwrap();
        assert_eq!(records[0].column_header, "LAST_STATUS");
        assert_eq!(records[1].column_header, "AGE");
    }

    #[tokio::test]
    async fn test_single_header_with_study_override() {
        let service = populated().await;
        let stage = service
            .metadata_by_column_header(Some("test_override_study"), "DISEASE_STAGE")
            .unwrap();
        assert_eq!(stage.priority, "10");

        let age = service
            .metadata_by_column_header(Some("test_override_study"), "AGE")
            .unwrap();
        assert_eq!(age.priority, "1");

        assert!(matches!(
            service.metadata_by_column_header(None, "STUDY_ONLY"),
            Err(LookupError::AttributesNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_search_exclusive_requires_all_terms() {
        let service = populated().await;
        let hits = service
            .metadata_by_search_terms(&["disease", "diagnosed"], None, false)
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].column_header, "AGE");
    }

    #[tokio::test]
    async fn test_search_inclusive_accepts_any_term() {
        let service = populated().await;
        let hits = service
            .metadata_by_search_terms(&["STATUS", "stage"], None, true)
            .unwrap();
        let headers: Vec<&str> = hits.iter().map(|r| r.column_header.as_str()).collect();
        assert_eq!(headers, vec!["DISEASE_STAGE", "LAST_STATUS"]);
    }

    #[tokio::test]
    async fn test_search_filters_attribute_type() {
        let service = populated().await;
        let hits = service
            .metadata_by_search_terms(&["s"], Some("sample"), true)
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].column_header, "DISEASE_STAGE");
    }

    #[tokio::test]
    async fn test_search_without_matches() {
        let service = populated().await;
        assert_eq!(
            service.metadata_by_search_terms(&["zzz"], None, true),
            Err(LookupError::NoSearchMatches {
                search_terms: vec!["zzz".to_string()]
            })
        );
    }

    #[tokio::test]
    async fn test_cancer_studies_sorted() {
        let service = populated().await;
        assert_eq!(
            service.cancer_studies().unwrap(),
            vec!["empty_study", "test_override_study"]
        );
    }

    #[tokio::test]
    async fn test_cache_status_after_refresh() {
        let service = populated().await;
        let status = service.cache_status();
        assert!(status.populated);
        assert!(!status.stale);
        assert!(!status.refreshing);
        assert_eq!(status.age_seconds, Some(0));
        assert_eq!(status.max_age_days, 3);
        assert_eq!(status.attribute_count, 3);
        assert_eq!(status.study_count, 2);
        assert_eq!(status.override_count, 2);

        let gauges = metrics().unwrap();
        assert!(gauges.cache_last_refresh_timestamp_seconds.get() > 0.0);
        assert!(gauges.cache_default_attributes.get() > 0);
    }
}
