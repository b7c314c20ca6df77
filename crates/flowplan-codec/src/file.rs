// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Plan file persistence.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;

use flowplan_model::PlanGraph;
use tracing::{debug, info};

use crate::{deserialize_with, serialize, CodecError, DecodeOptions};

/// Writes the document for `graph` to `path`.
///
/// The file is created exclusively. If it already exists the call fails with
/// [`CodecError::PlanFileExists`], or does nothing when `ignore_if_exists`
/// is set.
pub fn write_to_file(
    graph: &PlanGraph,
    path: &Path,
    ignore_if_exists: bool,
) -> Result<(), CodecError> {
    let text = serialize(graph)?;
    let io_err = |source: std::io::Error| CodecError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::AlreadyExists => {
            if ignore_if_exists {
                debug!(path = %path.display(), "plan file exists; leaving it untouched");
                return Ok(());
            }
            return Err(CodecError::PlanFileExists(path.to_path_buf()));
        }
        Err(err) => return Err(io_err(err)),
    };
    file.write_all(text.as_bytes()).map_err(io_err)?;
    file.flush().map_err(io_err)?;
    info!(path = %path.display(), nodes = graph.nodes().len(), "wrote plan file");
    Ok(())
}

/// Reads and decodes the plan file at `path`.
pub fn read_from_file(path: &Path, options: &DecodeOptions) -> Result<PlanGraph, CodecError> {
    let text = fs::read_to_string(path).map_err(|source| CodecError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    deserialize_with(&text, options)
}
