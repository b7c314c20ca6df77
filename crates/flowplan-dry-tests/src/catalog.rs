// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory catalog fake.

use std::collections::{BTreeMap, BTreeSet};

use flowplan_core::Catalog;
use flowplan_model::{ObjectIdentifier, TableSnapshot, TypeDescriptor};

/// Catalog holding a fixed set of tables and functions.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    tables: BTreeMap<ObjectIdentifier, TableSnapshot>,
    functions: BTreeSet<ObjectIdentifier>,
}

impl InMemoryCatalog {
    /// Empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a table.
    pub fn with_table(mut self, identifier: ObjectIdentifier, schema: TypeDescriptor) -> Self {
        self.tables.insert(identifier, TableSnapshot::new(schema));
        self
    }

    /// Registers a function.
    pub fn with_function(mut self, identifier: ObjectIdentifier) -> Self {
        self.functions.insert(identifier);
        self
    }

    /// Drops a table, simulating a `DROP TABLE` between compile and restore.
    pub fn without_table(mut self, identifier: &ObjectIdentifier) -> Self {
        self.tables.remove(identifier);
        self
    }
}

impl Catalog for InMemoryCatalog {
    fn table(&self, identifier: &ObjectIdentifier) -> Option<TableSnapshot> {
        self.tables.get(identifier).cloned()
    }

    fn has_function(&self, identifier: &ObjectIdentifier) -> bool {
        self.functions.contains(identifier)
    }
}
