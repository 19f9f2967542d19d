//! Override resolution.
//!
//! An override record only has to carry the fields a study wants to change.
//! Resolution fills every empty field from the default record with the same
//! column header, so readers never see a partially-filled override.

use crate::attribute::{AttributeField, AttributeRecord, DefaultTable};

/// Fill each empty field of `overriding` from `fallback`.
///
/// Fields the override already sets are kept verbatim. The column header is
/// never touched.
pub fn resolve(mut overriding: AttributeRecord, fallback: &AttributeRecord) -> AttributeRecord {
    for field in AttributeField::ALL {
        if overriding.field(field).is_empty() {
            *overriding.field_mut(field) = fallback.field(field).to_string();
        }
    }
    overriding
}

/// Outcome of resolving one override against a default table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A default existed and its values filled the override's gaps.
    Resolved(AttributeRecord),
    /// No default shares this header; the override is kept exactly as the
    /// source sent it, unset fields included.
    Unmatched(AttributeRecord),
}

impl Resolution {
    pub fn record(&self) -> &AttributeRecord {
        match self {
            Resolution::Resolved(record) | Resolution::Unmatched(record) => record,
        }
    }

    pub fn into_record(self) -> AttributeRecord {
        match self {
            Resolution::Resolved(record) | Resolution::Unmatched(record) => record,
        }
    }

    pub fn is_unmatched(&self) -> bool {
        matches!(self, Resolution::Unmatched(_))
    }
}

/// Resolve `overriding` against the default with the same column header.
pub fn resolve_against(overriding: AttributeRecord, defaults: &DefaultTable) -> Resolution {
    match defaults.get(&overriding.column_header) {
        Some(fallback) => Resolution::Resolved(resolve(overriding, fallback)),
        None => Resolution::Unmatched(overriding),
    }
}
