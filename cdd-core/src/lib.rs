//! CDD Core - Clinical Attribute Types
//!
//! Pure data structures and the override resolution rule. All other crates
//! depend on this. Nothing in here performs I/O.

pub mod attribute;
pub mod clock;
pub mod error;
pub mod resolver;

pub use attribute::{
    build_default_table, AttributeField, AttributeRecord, DefaultTable, OverrideTable,
    StudyOverrides,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{
    CddError, CddResult, ConfigError, LookupError, NotifyError, RefreshError, SourceError,
};
pub use resolver::{resolve, resolve_against, Resolution};
