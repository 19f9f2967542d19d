//! CDD Test Utilities
//!
//! Centralized test infrastructure for the workspace:
//! - Scriptable metadata source and recording notifier
//! - Proptest generators for attribute records and source payloads
//! - Fixtures mirroring the reference dictionary
//! - Custom assertions for cache invariants

// Re-export core types for convenience
pub use cdd_cache::{
    CacheConfig, CacheSnapshot, MetadataCache, MetadataSource, NotificationSink,
    StudyOverrideLists, ValidationOutcome, STALE_CACHE_ALERT,
};
pub use cdd_core::{
    AttributeField, AttributeRecord, Clock, LookupError, ManualClock, NotifyError, RefreshError,
    SourceError,
};

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// MOCK SOURCE
// ============================================================================

/// In-memory [`MetadataSource`] whose data and failures can be changed
/// between refreshes.
#[derive(Debug)]
pub struct FakeMetadataSource {
    defaults: Mutex<Vec<AttributeRecord>>,
    overrides: Mutex<StudyOverrideLists>,
    fail_defaults: AtomicBool,
    fail_overrides: AtomicBool,
    delay: Mutex<Option<Duration>>,
    defaults_calls: AtomicUsize,
    overrides_calls: AtomicUsize,
}

impl FakeMetadataSource {
    pub fn new(defaults: Vec<AttributeRecord>, overrides: StudyOverrideLists) -> Self {
        Self {
            defaults: Mutex::new(defaults),
            overrides: Mutex::new(overrides),
            fail_defaults: AtomicBool::new(false),
            fail_overrides: AtomicBool::new(false),
            delay: Mutex::new(None),
            defaults_calls: AtomicUsize::new(0),
            overrides_calls: AtomicUsize::new(0),
        }
    }

    /// Source serving the reference dictionary from [`fixtures`].
    pub fn working() -> Self {
        Self::new(
            fixtures::reference_attributes(),
            fixtures::reference_overrides(),
        )
    }

    /// Source whose both calls fail.
    pub fn broken() -> Self {
        let source = Self::working();
        source.set_defaults_failing(true);
        source.set_overrides_failing(true);
        source
    }

    pub fn set_defaults(&self, defaults: Vec<AttributeRecord>) {
        *lock(&self.defaults) = defaults;
    }

    pub fn set_overrides(&self, overrides: StudyOverrideLists) {
        *lock(&self.overrides) = overrides;
    }

    pub fn set_defaults_failing(&self, failing: bool) {
        self.fail_defaults.store(failing, Ordering::SeqCst);
    }

    pub fn set_overrides_failing(&self, failing: bool) {
        self.fail_overrides.store(failing, Ordering::SeqCst);
    }

    /// Make every call sleep this long before answering.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *lock(&self.delay) = delay;
    }

    pub fn defaults_calls(&self) -> usize {
        self.defaults_calls.load(Ordering::SeqCst)
    }

    pub fn overrides_calls(&self) -> usize {
        self.overrides_calls.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        let delay = *lock(&self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn unavailable(operation: &str) -> SourceError {
        SourceError::Transport {
            operation: operation.to_string(),
            reason: "faking a problem getting the clinical attribute data".to_string(),
        }
    }
}

#[async_trait]
impl MetadataSource for FakeMetadataSource {
    async fn fetch_defaults(&self) -> Result<Vec<AttributeRecord>, SourceError> {
        self.defaults_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        if self.fail_defaults.load(Ordering::SeqCst) {
            return Err(Self::unavailable("fetch_defaults"));
        }
        Ok(lock(&self.defaults).clone())
    }

    async fn fetch_overrides(&self) -> Result<StudyOverrideLists, SourceError> {
        self.overrides_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        if self.fail_overrides.load(Ordering::SeqCst) {
            return Err(Self::unavailable("fetch_overrides"));
        }
        Ok(lock(&self.overrides).clone())
    }
}

// ============================================================================
// MOCK NOTIFIER
// ============================================================================

/// [`NotificationSink`] that records every message it is asked to send.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
    fail: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier whose deliveries always fail (after recording).
    pub fn failing() -> Self {
        let notifier = Self::default();
        notifier.fail.store(true, Ordering::SeqCst);
        notifier
    }

    pub fn messages(&self) -> Vec<String> {
        lock(&self.messages).clone()
    }

    pub fn count(&self) -> usize {
        lock(&self.messages).len()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn notify(&self, message: &str) -> Result<(), NotifyError> {
        lock(&self.messages).push(message.to_string());
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifyError::Delivery {
                reason: "connection reset".to_string(),
            });
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

// ============================================================================
// CACHE HARNESS
// ============================================================================

/// A cache wired to a fake source and a manual clock.
pub struct CacheHarness {
    pub source: Arc<FakeMetadataSource>,
    pub clock: Arc<ManualClock>,
    pub cache: Arc<MetadataCache>,
}

impl CacheHarness {
    pub fn new(source: FakeMetadataSource) -> Self {
        Self::with_config(source, CacheConfig::default())
    }

    pub fn with_config(source: FakeMetadataSource, config: CacheConfig) -> Self {
        let source = Arc::new(source);
        let clock = Arc::new(ManualClock::default());
        let cache = Arc::new(MetadataCache::new(source.clone(), clock.clone(), config));
        Self {
            source,
            clock,
            cache,
        }
    }

    /// Harness over the reference dictionary, not yet refreshed.
    pub fn working() -> Self {
        Self::new(FakeMetadataSource::working())
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for attribute records and source payloads.

    use super::*;
    use proptest::collection::{hash_map, vec};
    use proptest::prelude::*;

    /// Column headers drawn from a small pool so duplicates and
    /// override/default matches are common.
    pub fn arb_column_header() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("AGE".to_string()),
            Just("SEX".to_string()),
            Just("DISEASE_STAGE".to_string()),
            Just("LAST_STATUS".to_string()),
            Just("CLIN_M_STAGE".to_string()),
            "[A-Z]{3,8}(_[A-Z]{2,6})?",
        ]
    }

    /// A non-empty field value.
    pub fn arb_field_value() -> impl Strategy<Value = String> {
        "[A-Za-z][A-Za-z0-9 .]{0,20}"
    }

    /// A field value that is empty about a third of the time.
    pub fn arb_optional_field_value() -> impl Strategy<Value = String> {
        prop_oneof![
            1 => Just(String::new()),
            2 => arb_field_value(),
        ]
    }

    pub fn arb_attribute_type() -> impl Strategy<Value = String> {
        prop_oneof![Just("PATIENT".to_string()), Just("SAMPLE".to_string())]
    }

    pub fn arb_datatype() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("STRING".to_string()),
            Just("NUMBER".to_string()),
            Just("BOOLEAN".to_string()),
        ]
    }

    /// A fully-populated default record.
    pub fn arb_default_record() -> impl Strategy<Value = AttributeRecord> {
        (
            arb_column_header(),
            arb_field_value(),
            arb_field_value(),
            arb_datatype(),
            arb_attribute_type(),
            "[1-9][0-9]{0,2}",
        )
            .prop_map(
                |(column_header, display_name, description, datatype, attribute_type, priority)| {
                    AttributeRecord {
                        column_header,
                        display_name,
                        description,
                        datatype,
                        attribute_type,
                        priority,
                    }
                },
            )
    }

    /// An override record with any subset of fields left empty.
    pub fn arb_override_record() -> impl Strategy<Value = AttributeRecord> {
        (
            arb_column_header(),
            arb_optional_field_value(),
            arb_optional_field_value(),
            arb_optional_field_value(),
            arb_optional_field_value(),
            arb_optional_field_value(),
        )
            .prop_map(
                |(column_header, display_name, description, datatype, attribute_type, priority)| {
                    AttributeRecord {
                        column_header,
                        display_name,
                        description,
                        datatype,
                        attribute_type,
                        priority,
                    }
                },
            )
    }

    pub fn arb_study_id() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("mskimpact".to_string()),
            Just("test_override_study".to_string()),
            "[a-z]{3,10}_[a-z]{2,6}",
        ]
    }

    /// A default list (possibly with duplicate headers) and an override map.
    pub fn arb_source_payload() -> impl Strategy<Value = (Vec<AttributeRecord>, StudyOverrideLists)>
    {
        (
            vec(arb_default_record(), 0..20),
            hash_map(arb_study_id(), vec(arb_override_record(), 0..6), 0..4),
        )
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built dictionary data for common scenarios.

    use super::*;

    /// The reference default dictionary: five attributes, all priority 1.
    pub fn reference_attributes() -> Vec<AttributeRecord> {
        vec![
            AttributeRecord::new(
                "AGE",
                "Diagnosis Age",
                "Age at which a condition or disease was first diagnosed.",
                "NUMBER",
                "PATIENT",
                "1",
            ),
            AttributeRecord::new(
                "BONE_MARROW_SAMPLE_HISTOLOGY",
                "Bone Marrow Sample Histology",
                "Bone Marrow Sample Histology",
                "STRING",
                "SAMPLE",
                "1",
            ),
            AttributeRecord::new(
                "CLIN_M_STAGE",
                "Neoplasm American Joint Committee on Cancer Clinical Distant Metastasis M Stage",
                "Extent of the distant metastasis for the cancer based on evidence obtained from clinical assessment parameters determined prior to treatment.",
                "STRING",
                "PATIENT",
                "1",
            ),
            AttributeRecord::new(
                "DISEASE_STAGE",
                "Disease Stage",
                "Disease Stage",
                "STRING",
                "SAMPLE",
                "1",
            ),
            AttributeRecord::new(
                "LAST_STATUS",
                "Last Status",
                "Last Status.",
                "STRING",
                "PATIENT",
                "1",
            ),
        ]
    }

    /// Overrides for `test_override_study` (AGE, DISEASE_STAGE) and
    /// `mskimpact` (LAST_STATUS).
    pub fn reference_overrides() -> StudyOverrideLists {
        let mut overrides = StudyOverrideLists::new();
        overrides.insert(
            "test_override_study".to_string(),
            vec![
                AttributeRecord::new(
                    "AGE",
                    "Diagnosis Age",
                    "Age at which a condition or disease was first diagnosed.",
                    "NUMBER",
                    "PATIENT",
                    "100",
                ),
                AttributeRecord::new(
                    "DISEASE_STAGE",
                    "Disease Stage",
                    "Disease Stage",
                    "STRING",
                    "PATIENT",
                    "10",
                ),
            ],
        );
        overrides.insert(
            "mskimpact".to_string(),
            vec![AttributeRecord::new(
                "LAST_STATUS",
                "Last Status",
                "Last Status.",
                "STRING",
                "PATIENT",
                "1",
            )],
        );
        overrides
    }

    /// A single AGE default with an `mskimpact` override that leaves the
    /// priority unset.
    pub fn partial_age_override() -> (Vec<AttributeRecord>, StudyOverrideLists) {
        let defaults = vec![AttributeRecord::new(
            "AGE",
            "Diagnosis Age",
            "Age at which a condition or disease was first diagnosed.",
            "NUMBER",
            "PATIENT",
            "1",
        )];
        let mut overrides = StudyOverrideLists::new();
        overrides.insert(
            "mskimpact".to_string(),
            vec![AttributeRecord::new(
                "AGE",
                "Age at Sequencing",
                "Age of the patient when the sample was sequenced.",
                "NUMBER",
                "SAMPLE",
                "",
            )],
        );
        (defaults, overrides)
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for cache invariants.

    use super::*;

    /// Assert every stored override with a matching default is complete and
    /// prefers its own values over the default's.
    pub fn assert_overrides_resolved(snapshot: &CacheSnapshot, raw: &StudyOverrideLists) {
        for (study_id, records) in raw {
            let stored = snapshot
                .study_overrides(study_id)
                .unwrap_or_else(|| panic!("study {} missing from snapshot", study_id));
            // Last record per header wins within a study.
            let mut last = std::collections::HashMap::new();
            for record in records {
                last.insert(record.column_header.as_str(), record);
            }
            for (header, raw_record) in last {
                let resolved = &stored[header];
                let Some(default) = snapshot.defaults().get(header) else {
                    assert_eq!(resolved, raw_record, "unmatched override must be kept as sent");
                    continue;
                };
                for field in AttributeField::ALL {
                    let expected = if raw_record.field(field).is_empty() {
                        default.field(field)
                    } else {
                        raw_record.field(field)
                    };
                    assert_eq!(
                        resolved.field(field),
                        expected,
                        "{}/{} field {}",
                        study_id,
                        header,
                        field.as_str()
                    );
                }
                assert!(resolved.is_complete(), "{}/{} not complete", study_id, header);
            }
        }
    }

    /// Assert a lookup failed because the cache has never been populated.
    pub fn assert_source_unresponsive<T: std::fmt::Debug>(result: &Result<T, LookupError>) {
        assert!(
            matches!(result, Err(LookupError::SourceUnresponsive)),
            "Expected SourceUnresponsive, got {:?}",
            result
        );
    }

    /// Assert a lookup failed listing exactly these column headers.
    pub fn assert_attributes_not_found<T: std::fmt::Debug>(
        result: &Result<T, LookupError>,
        expected: &[&str],
    ) {
        match result {
            Err(LookupError::AttributesNotFound { column_headers }) => {
                assert_eq!(column_headers, &expected.iter().map(|s| s.to_string()).collect::<Vec<_>>());
            }
            other => panic!("Expected AttributesNotFound, got {:?}", other),
        }
    }
}
