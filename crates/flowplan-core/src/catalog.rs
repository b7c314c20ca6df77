// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Catalog port consulted for live-resolved references.

use flowplan_model::{ObjectIdentifier, TableSnapshot};

/// Read-only view of the catalog configured at restore time.
///
/// Passed explicitly to the restore validator; nothing in this crate keeps a
/// global catalog.
pub trait Catalog {
    /// Current description of a table, if it exists.
    fn table(&self, identifier: &ObjectIdentifier) -> Option<TableSnapshot>;

    /// Whether a function with this identifier is registered.
    fn has_function(&self, identifier: &ObjectIdentifier) -> bool;
}

/// Catalog with no objects. Plans that only use persisted references
/// restore against it.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyCatalog;

impl Catalog for EmptyCatalog {
    fn table(&self, _identifier: &ObjectIdentifier) -> Option<TableSnapshot> {
        None
    }

    fn has_function(&self, _identifier: &ObjectIdentifier) -> bool {
        false
    }
}
