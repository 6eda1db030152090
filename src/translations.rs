//! Translation graph: language assignments and translation groups.
//!
//! Every content object carries at most one language and belongs to at most
//! one translation group per object type. Group mappings are denormalized
//! onto every member for O(1) reads; all writes go through one merge path
//! (`save_group`) that recomputes the union and rewrites every member, so
//! concurrent overlapping saves converge instead of losing updates.

use crate::error::{Error, Result};
use crate::registry::{Language, LanguageRegistry};
use crate::store::TagStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Enumeration of content objects, owned by the repository's query layer.
/// The graph only stores language data; candidate ids for mass assignment
/// come from here.
pub trait ContentCatalog: Send + Sync {
    /// Ids of one object type, ascending, starting after `after` (exclusive).
    fn list_ids(
        &self,
        object_type: &str,
        after: Option<i64>,
        limit: usize,
    ) -> anyhow::Result<Vec<i64>>;
}

/// Persisted language/group data for one object.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TranslationRecord {
    object_id: i64,
    language: String,
    #[serde(default)]
    group: BTreeMap<String, i64>,
}

fn row_type(object_type: &str) -> String {
    format!("translations:{}", object_type)
}

/// The translation graph, backed by the tagging substrate.
pub struct TranslationGraph {
    store: Arc<dyn TagStore>,
    registry: Arc<LanguageRegistry>,
    batch_size: usize,
}

impl TranslationGraph {
    pub fn new(store: Arc<dyn TagStore>, registry: Arc<LanguageRegistry>, batch_size: usize) -> Self {
        Self {
            store,
            registry,
            batch_size,
        }
    }

    /// The language assigned to an object, if any.
    pub fn get_language(&self, object_type: &str, id: i64) -> Result<Option<Language>> {
        match self.find(object_type, id)? {
            Some((_, record)) => self.registry.get(&record.language),
            None => Ok(None),
        }
    }

    /// Assign a language to an object. Fails when the language is not in the
    /// registry. Reassigning moves the object's entry inside its group and
    /// propagates the change to every member.
    pub fn set_language(&self, object_type: &str, id: i64, language: &str) -> Result<()> {
        let lang = self
            .registry
            .get(language)?
            .ok_or_else(|| Error::InvalidLanguage(language.to_string()))?;

        match self.find(object_type, id)? {
            None => {
                self.insert(object_type, id, &lang.slug, BTreeMap::new())?;
            }
            Some((row_id, mut record)) => {
                if record.language == lang.slug {
                    return Ok(());
                }
                let old_slug = std::mem::replace(&mut record.language, lang.slug.clone());
                record.group.retain(|slug, &mut oid| !(slug == &old_slug && oid == id));
                let mapping = record.group.clone();
                self.write(object_type, row_id, &record)?;
                // Re-key the object inside its group and fan the new map out.
                self.save_group(object_type, id, &mapping)?;
            }
        }
        debug!(object_type, id, language, "language assigned");
        Ok(())
    }

    /// The id of the object's translation in `language`, if one exists.
    pub fn get_translation(
        &self,
        object_type: &str,
        id: i64,
        language: &str,
    ) -> Result<Option<i64>> {
        Ok(self.get_group(object_type, id)?.get(language).copied())
    }

    /// The full group mapping from this object's perspective. Contains the
    /// object's own entry as soon as it has a language; empty for objects
    /// with no language.
    pub fn get_group(&self, object_type: &str, id: i64) -> Result<BTreeMap<String, i64>> {
        match self.find(object_type, id)? {
            None => Ok(BTreeMap::new()),
            Some((_, record)) => {
                let mut group = record.group;
                group.entry(record.language).or_insert(id);
                Ok(group)
            }
        }
    }

    /// Merge `mapping` into the group of `id` and rewrite every member.
    ///
    /// Semantics: slug-keyed union of the incoming mapping with every
    /// reachable member's stored group, the incoming mapping winning per-slug
    /// conflicts; members named by the mapping but still unassigned get their
    /// language set in the same pass. Idempotent, and two concurrent
    /// overlapping saves converge to the union of their mappings.
    pub fn save_group(
        &self,
        object_type: &str,
        id: i64,
        mapping: &BTreeMap<String, i64>,
    ) -> Result<()> {
        let languages = self.registry.list()?;
        let known = |slug: &str| languages.iter().any(|lang| lang.slug == slug);

        let mut merged: BTreeMap<String, i64> = BTreeMap::new();
        for (slug, &oid) in mapping {
            if known(slug) {
                merged.insert(slug.clone(), oid);
            } else {
                warn!(slug = %slug, "dropping group entry for unregistered language");
            }
        }

        // The caller is always part of its own group.
        if let Some((_, record)) = self.find(object_type, id)? {
            if !merged.values().any(|&oid| oid == id) {
                merged.entry(record.language).or_insert(id);
            }
        }

        // Union transitively with the stored groups of every member reached.
        loop {
            let mut additions: BTreeMap<String, i64> = BTreeMap::new();
            for &oid in merged.values() {
                if let Some((_, record)) = self.find(object_type, oid)? {
                    for (slug, &linked) in &record.group {
                        // An object belongs under exactly one slug; entries
                        // already represented (under any slug) are superseded.
                        if known(slug)
                            && !merged.contains_key(slug)
                            && !merged.values().any(|&present| present == linked)
                            && !additions.values().any(|&pending| pending == linked)
                        {
                            additions.insert(slug.clone(), linked);
                        }
                    }
                }
            }
            if additions.is_empty() {
                break;
            }
            merged.extend(additions);
        }

        // Fan the merged map out to every member, creating records for
        // members that have no language yet.
        for (slug, &oid) in &merged {
            match self.find(object_type, oid)? {
                Some((row_id, mut record)) => {
                    record.group = merged.clone();
                    // A reassigned slug supersedes the stored one.
                    if &record.language != slug {
                        record.language = slug.clone();
                    }
                    self.write(object_type, row_id, &record)?;
                }
                None => {
                    self.insert(object_type, oid, slug, merged.clone())?;
                }
            }
        }

        debug!(object_type, id, members = merged.len(), "group saved");
        Ok(())
    }

    /// Detach an object from its group: the remaining members keep a pruned
    /// mapping, the object keeps its language in a singleton group.
    pub fn remove_from_group(&self, object_type: &str, id: i64) -> Result<()> {
        let Some((row_id, mut record)) = self.find(object_type, id)? else {
            return Ok(());
        };

        let mut rest = record.group.clone();
        rest.retain(|_, &mut oid| oid != id);
        for &oid in rest.values() {
            if let Some((other_row, mut other)) = self.find(object_type, oid)? {
                other.group = rest.clone();
                self.write(object_type, other_row, &other)?;
            }
        }

        record.group = BTreeMap::from([(record.language.clone(), id)]);
        self.write(object_type, row_id, &record)
    }

    /// Assign `language` to objects of the given types that have none yet,
    /// at most one batch per type per call. Returns the number of objects
    /// assigned; calling repeatedly converges to zero and stays there.
    pub fn set_language_in_mass(
        &self,
        language: &str,
        object_types: &[String],
        catalog: &dyn ContentCatalog,
    ) -> Result<usize> {
        let lang = self
            .registry
            .get(language)?
            .ok_or_else(|| Error::InvalidLanguage(language.to_string()))?;

        let mut assigned = 0;
        for object_type in object_types {
            let mut after = None;
            while assigned < self.batch_size {
                let ids = catalog
                    .list_ids(object_type, after, self.batch_size)
                    .map_err(Error::Store)?;
                if ids.is_empty() {
                    break;
                }
                after = ids.last().copied();

                for id in ids {
                    if self.find(object_type, id)?.is_none() {
                        self.insert(object_type, id, &lang.slug, BTreeMap::new())?;
                        assigned += 1;
                        if assigned == self.batch_size {
                            break;
                        }
                    }
                }
            }
        }

        if assigned > 0 {
            debug!(language, assigned, "mass language assignment batch");
        }
        Ok(assigned)
    }

    // ==================== internals ====================

    fn find(&self, object_type: &str, id: i64) -> Result<Option<(i64, TranslationRecord)>> {
        let rows = self
            .store
            .read_tags(&row_type(object_type))
            .map_err(Error::Store)?;
        for row in rows {
            if let Ok(record) = serde_json::from_value::<TranslationRecord>(row.payload) {
                if record.object_id == id {
                    return Ok(Some((row.id, record)));
                }
            }
        }
        Ok(None)
    }

    fn insert(
        &self,
        object_type: &str,
        id: i64,
        language: &str,
        group: BTreeMap<String, i64>,
    ) -> Result<()> {
        let record = TranslationRecord {
            object_id: id,
            language: language.to_string(),
            group,
        };
        let payload = serde_json::to_value(&record).map_err(|e| Error::Store(e.into()))?;
        self.store
            .write_tag(&row_type(object_type), payload)
            .map_err(Error::Store)?;
        Ok(())
    }

    fn write(&self, _object_type: &str, row_id: i64, record: &TranslationRecord) -> Result<()> {
        let payload = serde_json::to_value(record).map_err(|e| Error::Store(e.into()))?;
        self.store.update_tag(row_id, payload).map_err(Error::Store)
    }
}
