//! Canonical outlet identities.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::record::{OutletRecord, TYPE_FIELD};

const PAIR_SEPARATOR: &str = "-";

/// Order-independent identity of one physical outlet.
///
/// Derived by sorting the record's field names and joining `name:value`
/// pairs with `-`. The `type` field is excluded, so two drivers configured
/// with identical remaining fields derive the same key. Names and values
/// are not escaped, so distinct records can share a key; holders of a key
/// compare the records themselves before reusing anything bound to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutletKey(String);

impl OutletKey {
    /// Derives the identity of a configuration record.
    #[must_use]
    pub fn derive(record: &OutletRecord) -> Self {
        let pairs: Vec<String> = record
            .iter()
            .filter(|(name, _)| name.as_str() != TYPE_FIELD)
            .map(|(name, value)| format!("{name}:{value}"))
            .collect();
        Self(pairs.join(PAIR_SEPARATOR))
    }

    /// Borrowed view of the canonical string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OutletKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}
