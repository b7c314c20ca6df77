// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Catalog read from a JSON file.
//!
//! ```json
//! {
//!   "tables": [{ "identifier": {"catalog": "c", "database": "d", "object": "T"},
//!                "schema": {"type": "row", "fields": [...]} }],
//!   "functions": [{"catalog": "c", "database": "d", "object": "f"}]
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{Context, Result};
use flowplan_core::Catalog;
use flowplan_model::{ObjectIdentifier, TableSnapshot, TypeDescriptor};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogFile {
    #[serde(default)]
    tables: Vec<TableEntry>,
    #[serde(default)]
    functions: Vec<ObjectIdentifier>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TableEntry {
    identifier: ObjectIdentifier,
    schema: TypeDescriptor,
    #[serde(default)]
    options: BTreeMap<String, String>,
}

/// Tables and functions loaded from disk.
#[derive(Debug, Default)]
pub struct JsonCatalog {
    tables: BTreeMap<ObjectIdentifier, TableSnapshot>,
    functions: BTreeSet<ObjectIdentifier>,
}

impl JsonCatalog {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read catalog {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid catalog {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let file: CatalogFile = serde_json::from_str(text)?;
        let mut catalog = Self::default();
        for entry in file.tables {
            let snapshot = TableSnapshot {
                schema: entry.schema,
                options: entry.options,
            };
            snapshot.validate()?;
            catalog.tables.insert(entry.identifier, snapshot);
        }
        catalog.functions.extend(file.functions);
        Ok(catalog)
    }
}

impl Catalog for JsonCatalog {
    fn table(&self, identifier: &ObjectIdentifier) -> Option<TableSnapshot> {
        self.tables.get(identifier).cloned()
    }

    fn has_function(&self, identifier: &ObjectIdentifier) -> bool {
        self.functions.contains(identifier)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_tables_and_functions() {
        let catalog = JsonCatalog::parse(
            r#"{
                "tables": [{
                    "identifier": {"catalog": "c", "database": "d", "object": "T"},
                    "schema": {"type": "row", "fields": [
                        {"name": "a", "type": {"type": "primitive", "name": "INT", "nullable": true}}
                    ]}
                }],
                "functions": [{"catalog": "c", "database": "d", "object": "f"}]
            }"#,
        )
        .unwrap();
        let t = ObjectIdentifier::new("c", "d", "T");
        assert_eq!(catalog.table(&t).unwrap().schema.arity(), Some(1));
        assert!(catalog.has_function(&ObjectIdentifier::new("c", "d", "f")));
        assert!(!catalog.has_function(&t));
    }

    #[test]
    fn non_row_schema_is_rejected() {
        let err = JsonCatalog::parse(
            r#"{"tables": [{
                "identifier": {"catalog": "c", "database": "d", "object": "T"},
                "schema": {"type": "primitive", "name": "INT", "nullable": true}
            }]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("row type"), "{err}");
    }
}
