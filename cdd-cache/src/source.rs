//! Metadata source trait.
//!
//! The source is the remote repository holding the dictionary. It is only
//! ever called from the refresh path.

use async_trait::async_trait;
use cdd_core::{AttributeRecord, SourceError};
use std::collections::HashMap;

/// Raw per-study override lists: study id -> unresolved override records.
pub type StudyOverrideLists = HashMap<String, Vec<AttributeRecord>>;

/// Supplies the full default attribute list and the per-study overrides.
///
/// Implementations may be slow or fail; the cache bounds every call with a
/// timeout. No ordering is guaranteed on returned lists.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Fetch every default attribute record.
    async fn fetch_defaults(&self) -> Result<Vec<AttributeRecord>, SourceError>;

    /// Fetch the override records of every study that has any.
    async fn fetch_overrides(&self) -> Result<StudyOverrideLists, SourceError>;
}
