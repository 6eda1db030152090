//! Tag-storage substrate interface.
//!
//! The registry and the translation graph persist everything through the host
//! repository's generic tagging substrate. The substrate itself is an
//! external collaborator; this module only defines the contract (`TagStore`)
//! and ships an in-memory implementation used by tests and the demo server.

use anyhow::{bail, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// One row in the tagging substrate.
#[derive(Debug, Clone)]
pub struct TagRow {
    /// Substrate-assigned identifier, stable for the lifetime of the row
    pub id: i64,

    /// Row type, e.g. "language" or "translations:post"
    pub row_type: String,

    /// Opaque payload; the schema is owned by whichever module wrote the row
    pub payload: Value,
}

/// Persistence contract between the core and the tagging substrate.
///
/// Calls are synchronous from the core's point of view. `update_tag` exists
/// so denormalized rows can be rewritten in place without changing their id;
/// anchor rows must keep their ids stable across updates.
pub trait TagStore: Send + Sync {
    /// All rows of one type, in insertion order.
    fn read_tags(&self, row_type: &str) -> Result<Vec<TagRow>>;

    /// Insert a new row, returning its id.
    fn write_tag(&self, row_type: &str, payload: Value) -> Result<i64>;

    /// Replace the payload of an existing row.
    fn update_tag(&self, id: i64, payload: Value) -> Result<()>;

    /// Remove a row. Removing an unknown id is an error.
    fn delete_tag(&self, id: i64) -> Result<()>;
}

#[derive(Debug)]
struct MemoryInner {
    rows: BTreeMap<i64, TagRow>,
    next_id: i64,
}

/// In-memory `TagStore` for tests and the demo binary.
#[derive(Debug, Clone)]
pub struct MemoryTagStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryTagStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryInner {
                rows: BTreeMap::new(),
                next_id: 1,
            })),
        }
    }

    /// Number of rows currently stored, across all types.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryTagStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TagStore for MemoryTagStore {
    fn read_tags(&self, row_type: &str) -> Result<Vec<TagRow>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .rows
            .values()
            .filter(|row| row.row_type == row_type)
            .cloned()
            .collect())
    }

    fn write_tag(&self, row_type: &str, payload: Value) -> Result<i64> {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.rows.insert(
            id,
            TagRow {
                id,
                row_type: row_type.to_string(),
                payload,
            },
        );
        Ok(id)
    }

    fn update_tag(&self, id: i64, payload: Value) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        match inner.rows.get_mut(&id) {
            Some(row) => {
                row.payload = payload;
                Ok(())
            }
            None => bail!("no tag row with id {}", id),
        }
    }

    fn delete_tag(&self, id: i64) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.rows.remove(&id).is_none() {
            bail!("no tag row with id {}", id);
        }
        Ok(())
    }
}
