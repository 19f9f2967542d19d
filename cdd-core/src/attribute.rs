//! Clinical attribute records and the tables that hold them.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Baseline dictionary: column header -> attribute record.
pub type DefaultTable = HashMap<String, AttributeRecord>;

/// Resolved overrides for one study: column header -> attribute record.
pub type StudyOverrides = HashMap<String, AttributeRecord>;

/// Per-study overrides: study id -> (column header -> resolved record).
pub type OverrideTable = HashMap<String, StudyOverrides>;

/// One clinical metadata entry, keyed by `column_header`.
///
/// Every descriptive field is a plain string. On an override record coming
/// from the source any of them may be empty, meaning "inherit from the
/// default record with the same header". A `null` or missing field on the
/// wire deserializes to the empty string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AttributeRecord {
    pub column_header: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub display_name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub datatype: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub attribute_type: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub priority: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// The five resolvable fields of an [`AttributeRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeField {
    DisplayName,
    Description,
    Datatype,
    AttributeType,
    Priority,
}

impl AttributeField {
    pub const ALL: [AttributeField; 5] = [
        AttributeField::DisplayName,
        AttributeField::Description,
        AttributeField::Datatype,
        AttributeField::AttributeType,
        AttributeField::Priority,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeField::DisplayName => "display_name",
            AttributeField::Description => "description",
            AttributeField::Datatype => "datatype",
            AttributeField::AttributeType => "attribute_type",
            AttributeField::Priority => "priority",
        }
    }
}

impl AttributeRecord {
    pub fn new(
        column_header: impl Into<String>,
        display_name: impl Into<String>,
        description: impl Into<String>,
        datatype: impl Into<String>,
        attribute_type: impl Into<String>,
        priority: impl Into<String>,
    ) -> Self {
        Self {
            column_header: column_header.into(),
            display_name: display_name.into(),
            description: description.into(),
            datatype: datatype.into(),
            attribute_type: attribute_type.into(),
            priority: priority.into(),
        }
    }

    /// A record carrying only its header; every other field is unset.
    pub fn header_only(column_header: impl Into<String>) -> Self {
        Self {
            column_header: column_header.into(),
            ..Default::default()
        }
    }

    pub fn field(&self, field: AttributeField) -> &str {
        match field {
            AttributeField::DisplayName => &self.display_name,
            AttributeField::Description => &self.description,
            AttributeField::Datatype => &self.datatype,
            AttributeField::AttributeType => &self.attribute_type,
            AttributeField::Priority => &self.priority,
        }
    }

    pub fn field_mut(&mut self, field: AttributeField) -> &mut String {
        match field {
            AttributeField::DisplayName => &mut self.display_name,
            AttributeField::Description => &mut self.description,
            AttributeField::Datatype => &mut self.datatype,
            AttributeField::AttributeType => &mut self.attribute_type,
            AttributeField::Priority => &mut self.priority,
        }
    }

    /// Fields that are still empty.
    pub fn unset_fields(&self) -> Vec<AttributeField> {
        AttributeField::ALL
            .into_iter()
            .filter(|f| self.field(*f).is_empty())
            .collect()
    }

    /// True when every descriptive field carries a value.
    pub fn is_complete(&self) -> bool {
        AttributeField::ALL
            .iter()
            .all(|f| !self.field(*f).is_empty())
    }
}

/// Build a [`DefaultTable`] from a source list.
///
/// Duplicate headers are resolved last-write-wins, in list order.
pub fn build_default_table(records: impl IntoIterator<Item = AttributeRecord>) -> DefaultTable {
    let mut table = DefaultTable::new();
    for record in records {
        table.insert(record.column_header.clone(), record);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_and_missing_fields_deserialize_empty() {
        let json = r#"{"column_header":"AGE","display_name":null,"priority":"1"}"#;
        let record: AttributeRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.column_header, "AGE");
        assert_eq!(record.display_name, "");
        assert_eq!(record.description, "");
        assert_eq!(record.priority, "1");
        assert_eq!(
            record.unset_fields(),
            vec![
                AttributeField::DisplayName,
                AttributeField::Description,
                AttributeField::Datatype,
                AttributeField::AttributeType,
            ]
        );
    }

    #[test]
    fn test_missing_column_header_is_rejected() {
        let json = r#"{"display_name":"Diagnosis Age"}"#;
        assert!(serde_json::from_str::<AttributeRecord>(json).is_err());
    }

    #[test]
    fn test_is_complete() {
        let full = AttributeRecord::new("AGE", "Diagnosis Age", "Age", "NUMBER", "PATIENT", "1");
        assert!(full.is_complete());
        assert!(!AttributeRecord::header_only("AGE").is_complete());
    }

    #[test]
    fn test_build_default_table_last_write_wins() {
        let table = build_default_table(vec![
            AttributeRecord::new("AGE", "First", "", "", "", "1"),
            AttributeRecord::new("SEX", "Sex", "", "", "", "1"),
            AttributeRecord::new("AGE", "Second", "", "", "", "2"),
        ]);
        assert_eq!(table.len(), 2);
        assert_eq!(table["AGE"].display_name, "Second");
        assert_eq!(table["AGE"].priority, "2");
    }

    #[test]
    fn test_field_mut_roundtrips_through_field() {
        let mut record = AttributeRecord::header_only("AGE");
        for field in AttributeField::ALL {
            *record.field_mut(field) = field.as_str().to_string();
        }
        for field in AttributeField::ALL {
            assert_eq!(record.field(field), field.as_str());
        }
    }
}
