// Compaction Request Domain Model

use crate::domain::ServerName;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// One major compaction to run against one region hosted by `server`.
///
/// `stores` names the column families to compact; an empty set means the
/// whole region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactionRequest {
    pub server: ServerName,
    pub region: String,
    #[serde(default)]
    pub stores: BTreeSet<String>,
}

impl CompactionRequest {
    pub fn new(server: ServerName, region: impl Into<String>) -> Self {
        Self {
            server,
            region: region.into(),
            stores: BTreeSet::new(),
        }
    }

    /// Restrict the compaction to the given column families
    pub fn with_stores<I, S>(mut self, stores: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stores.extend(stores.into_iter().map(Into::into));
        self
    }

    /// Comma-joined store list, empty when compacting the whole region
    pub fn stores_csv(&self) -> String {
        self.stores.iter().cloned().collect::<Vec<_>>().join(",")
    }
}

impl fmt::Display for CompactionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.stores.is_empty() {
            write!(f, "{}@{}", self.region, self.server)
        } else {
            write!(f, "{}[{}]@{}", self.region, self.stores_csv(), self.server)
        }
    }
}
