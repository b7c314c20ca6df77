// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! References from plan nodes to catalog tables and functions.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::types::TypeDescriptor;

/// Fully qualified `catalog.database.object` name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectIdentifier {
    /// Catalog name.
    pub catalog: String,
    /// Database name within the catalog.
    pub database: String,
    /// Table or function name within the database.
    pub object: String,
}

impl ObjectIdentifier {
    /// Builds an identifier from its three parts.
    pub fn new(
        catalog: impl Into<String>,
        database: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            catalog: catalog.into(),
            database: database.into(),
            object: object.into(),
        }
    }
}

impl fmt::Display for ObjectIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}`.`{}`.`{}`", self.catalog, self.database, self.object)
    }
}

/// How a referenced object is obtained when a plan is restored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionMode {
    /// Use the snapshot persisted in the plan; never consult the catalog.
    AsPersistedSnapshot,
    /// Look the object up in the catalog configured at restore time.
    ResolveFromLiveCatalog,
}

/// Persisted description of a table, embedded in the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSnapshot {
    /// Full physical schema of the table (a row type).
    pub schema: TypeDescriptor,
    /// Connector options, sorted by key.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, String>,
}

impl TableSnapshot {
    /// Snapshot with the given schema and no options.
    pub fn new(schema: TypeDescriptor) -> Self {
        Self {
            schema,
            options: BTreeMap::new(),
        }
    }

    /// Adds a connector option.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Checks that the schema is a well-formed row type.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.schema.fields().is_none() {
            return Err(ModelError::MalformedType(format!(
                "table snapshot schema must be a row type, got {}",
                self.schema
            )));
        }
        self.schema.validate()
    }
}

/// A table or function referenced by a node, plus its resolution mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogObjectRef {
    /// Qualified name.
    pub identifier: ObjectIdentifier,
    /// Restore-time resolution mode.
    pub resolution: ResolutionMode,
    /// Persisted table description; required for persisted table refs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<TableSnapshot>,
}

impl CatalogObjectRef {
    /// Self-contained reference carrying its own snapshot.
    pub fn persisted(identifier: ObjectIdentifier, snapshot: TableSnapshot) -> Self {
        Self {
            identifier,
            resolution: ResolutionMode::AsPersistedSnapshot,
            snapshot: Some(snapshot),
        }
    }

    /// Reference resolved against the live catalog at restore time.
    pub fn live(identifier: ObjectIdentifier) -> Self {
        Self {
            identifier,
            resolution: ResolutionMode::ResolveFromLiveCatalog,
            snapshot: None,
        }
    }

    /// Persisted reference without a snapshot (functions keep their body in
    /// the operator payload instead).
    pub fn persisted_function(identifier: ObjectIdentifier) -> Self {
        Self {
            identifier,
            resolution: ResolutionMode::AsPersistedSnapshot,
            snapshot: None,
        }
    }

    /// Copy with the snapshot stripped; identity fingerprints use this form.
    pub fn identifier_only(&self) -> Self {
        Self {
            identifier: self.identifier.clone(),
            resolution: self.resolution,
            snapshot: None,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ModelError> {
        match &self.snapshot {
            Some(snapshot) => snapshot.validate(),
            None => Ok(()),
        }
    }
}
