//! Language registry: single source of truth for configured languages.
//!
//! Languages live in the host repository's tagging substrate (one row per
//! language plus one anchor row per translatable object type) and are served
//! from a generation-counted cache. The cache is read-mostly: languages
//! change rarely, and invalidation is a pure in-memory bump with the
//! substrate always remaining the source of truth.

use crate::config::Settings;
use crate::error::{Error, Result, ValidationError};
use crate::scheme::UrlScheme;
use crate::store::TagStore;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, RwLock};
use tracing::debug;

/// Row type for language entities.
const LANGUAGE_ROW: &str = "language";

/// Row type for per-object-type anchor rows.
const ANCHOR_ROW: &str = "language_anchor";

static SLUG_REGEX: OnceLock<Regex> = OnceLock::new();
static LOCALE_REGEX: OnceLock<Regex> = OnceLock::new();

fn slug_regex() -> &'static Regex {
    SLUG_REGEX.get_or_init(|| Regex::new(r"^[a-z][a-z0-9_-]+$").unwrap())
}

fn locale_regex() -> &'static Regex {
    LOCALE_REGEX.get_or_init(|| Regex::new(r"^[a-z]{2,3}(?:[_-][A-Za-z0-9]{2,8})*$").unwrap())
}

/// Persisted form of a language entity.
///
/// URL fields are not stored; they are derived from the active URL scheme at
/// load time so permalink and site-URL changes only require a cache
/// invalidation, never a data migration.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LanguageRecord {
    slug: String,
    locale: String,
    name: String,
    #[serde(default)]
    is_rtl: bool,
    #[serde(default)]
    is_default: bool,
    #[serde(default)]
    order: i64,
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    fallbacks: Vec<String>,
}

/// Payload of an anchor row: ties a language to its backing row for one
/// translatable object type.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct AnchorRecord {
    slug: String,
    object_type: String,
}

/// A configured language, as served by the registry.
///
/// Immutable value object: mutation goes through `LanguageRegistry::update`
/// and comes back as a fresh entity after a cache rebuild.
#[derive(Debug, Clone, Serialize)]
pub struct Language {
    pub slug: String,
    pub locale: String,
    pub name: String,
    pub is_rtl: bool,
    pub is_default: bool,
    pub order: i64,

    /// Resolved home URL for this language, cached at registry load
    pub home_url: String,

    /// Resolved search URL for this language, cached at registry load
    pub search_url: String,

    /// Configured host, used only by the distinct-host scheme
    pub host: Option<String>,

    /// Ordered locale aliases tried when no exact client preference matches
    pub fallbacks: Vec<String>,

    /// Backing anchor row per object type this language classifies
    pub anchors: HashMap<String, i64>,

    /// Substrate row id of the language entity itself
    #[serde(skip)]
    pub(crate) row_id: i64,
}

impl Language {
    /// The primary subtag of the locale (`en` for `en_US`).
    pub fn primary_subtag(&self) -> &str {
        self.locale
            .split(['_', '-'])
            .next()
            .unwrap_or(&self.locale)
    }

    /// Whether `identifier` names this language by slug, locale, or one of
    /// its substrate row ids.
    pub fn matches(&self, identifier: &str) -> bool {
        if self.slug == identifier || self.locale == identifier {
            return true;
        }
        match identifier.parse::<i64>() {
            Ok(id) => id == self.row_id || self.anchors.values().any(|&a| a == id),
            Err(_) => false,
        }
    }
}

/// Input to `add`/`update`.
#[derive(Debug, Clone)]
pub struct LanguageSpec {
    pub slug: String,
    pub locale: String,
    pub name: String,
    pub is_rtl: bool,
    pub is_default: bool,
    pub order: i64,
    pub host: Option<String>,
    pub fallbacks: Vec<String>,
}

impl LanguageSpec {
    /// Minimal spec with everything optional defaulted.
    pub fn new(slug: &str, locale: &str, name: &str) -> Self {
        Self {
            slug: slug.to_string(),
            locale: locale.to_string(),
            name: name.to_string(),
            is_rtl: false,
            is_default: false,
            order: 0,
            host: None,
            fallbacks: Vec::new(),
        }
    }

    pub fn default_language(mut self) -> Self {
        self.is_default = true;
        self
    }

    pub fn rtl(mut self) -> Self {
        self.is_rtl = true;
        self
    }

    pub fn with_host(mut self, host: &str) -> Self {
        self.host = Some(host.trim_end_matches('/').to_string());
        self
    }

    pub fn with_fallbacks(mut self, fallbacks: &[&str]) -> Self {
        self.fallbacks = fallbacks.iter().map(|s| s.to_string()).collect();
        self
    }

    fn into_record(self) -> LanguageRecord {
        LanguageRecord {
            slug: self.slug,
            locale: self.locale,
            name: self.name,
            is_rtl: self.is_rtl,
            is_default: self.is_default,
            order: self.order,
            host: self.host,
            fallbacks: self.fallbacks,
        }
    }
}

struct CachedList {
    generation: u64,
    languages: Arc<Vec<Language>>,
}

/// Registry of configured languages, backed by the tagging substrate.
pub struct LanguageRegistry {
    store: Arc<dyn TagStore>,
    settings: Settings,
    codec: UrlScheme,
    cache: RwLock<Option<CachedList>>,
    generation: AtomicU64,
}

impl LanguageRegistry {
    pub fn new(store: Arc<dyn TagStore>, settings: Settings) -> Self {
        let codec = UrlScheme::from_settings(&settings);
        Self {
            store,
            settings,
            codec,
            cache: RwLock::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// The URL scheme codec this registry derives URLs with.
    pub fn codec(&self) -> &UrlScheme {
        &self.codec
    }

    /// All configured languages, ordered by `order` then slug.
    ///
    /// Served from cache; rebuilt from the substrate after `invalidate`.
    /// Empty before any language has been added.
    pub fn list(&self) -> Result<Arc<Vec<Language>>> {
        let generation = self.generation.load(Ordering::Acquire);

        if let Some(cached) = self.cache.read().unwrap().as_ref() {
            if cached.generation == generation {
                return Ok(Arc::clone(&cached.languages));
            }
        }

        let languages = Arc::new(self.load()?);
        let mut cache = self.cache.write().unwrap();
        // A concurrent invalidation may have bumped the generation while we
        // were loading; last writer wins, stale reads are acceptable.
        *cache = Some(CachedList {
            generation,
            languages: Arc::clone(&languages),
        });
        Ok(languages)
    }

    /// Look a language up by slug, locale, or substrate row id.
    pub fn get(&self, identifier: &str) -> Result<Option<Language>> {
        Ok(self
            .list()?
            .iter()
            .find(|lang| lang.matches(identifier))
            .cloned())
    }

    /// The default language, if any language is configured at all.
    pub fn get_default(&self) -> Result<Option<Language>> {
        Ok(self.list()?.iter().find(|lang| lang.is_default).cloned())
    }

    /// Drop the cache. The next `list`/`get` rebuilds from the substrate.
    ///
    /// Called on locale edits and on permalink-structure or site-URL changes.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        debug!("language cache invalidated");
    }

    /// Add a language. Validates the spec fully before anything is written;
    /// on success the cache is invalidated and, if the new language is the
    /// default, every other default flag is cleared in the same operation.
    pub fn add(&self, spec: LanguageSpec) -> Result<Language> {
        let current = self.list()?;
        self.validate(&spec, &current, None)?;

        let is_default = spec.is_default;
        let slug = spec.slug.clone();
        let record = spec.into_record();

        let payload = serde_json::to_value(&record).map_err(|e| Error::Store(e.into()))?;
        self.store
            .write_tag(LANGUAGE_ROW, payload)
            .map_err(Error::Store)?;

        // One anchor per translatable object type.
        for object_type in &self.settings.object_types {
            let anchor = AnchorRecord {
                slug: slug.clone(),
                object_type: object_type.clone(),
            };
            let payload = serde_json::to_value(&anchor).map_err(|e| Error::Store(e.into()))?;
            self.store
                .write_tag(ANCHOR_ROW, payload)
                .map_err(Error::Store)?;
        }

        if is_default {
            self.clear_other_defaults(&slug)?;
        }

        self.invalidate();
        debug!(slug = %slug, "language added");

        self.get(&slug)?
            .ok_or_else(|| Error::InvalidLanguage(slug))
    }

    /// Update the language currently known as `slug`. The spec may rename
    /// the slug or change the locale; anchors stay stable. Never partially
    /// applies: validation happens against the full spec first.
    pub fn update(&self, slug: &str, spec: LanguageSpec) -> Result<Language> {
        let current = self.list()?;
        let existing = current
            .iter()
            .find(|lang| lang.slug == slug)
            .ok_or_else(|| Error::InvalidLanguage(slug.to_string()))?
            .clone();

        self.validate(&spec, &current, Some(slug))?;

        let is_default = spec.is_default;
        let new_slug = spec.slug.clone();
        let record = spec.into_record();

        let payload = serde_json::to_value(&record).map_err(|e| Error::Store(e.into()))?;
        self.store
            .update_tag(existing.row_id, payload)
            .map_err(Error::Store)?;

        if new_slug != slug {
            self.rename_anchors(slug, &new_slug)?;
        }

        if is_default {
            self.clear_other_defaults(&new_slug)?;
        }

        self.invalidate();
        debug!(old = %slug, new = %new_slug, "language updated");

        self.get(&new_slug)?
            .ok_or_else(|| Error::InvalidLanguage(new_slug))
    }

    /// Remove a language and its anchors. The default language cannot be
    /// removed; make another language default first.
    pub fn delete(&self, slug: &str) -> Result<()> {
        let existing = self
            .get(slug)?
            .ok_or_else(|| Error::InvalidLanguage(slug.to_string()))?;

        if existing.is_default {
            let mut err = ValidationError::new();
            err.push("slug", "cannot remove the default language");
            return err.into_result();
        }

        for &anchor_id in existing.anchors.values() {
            self.store.delete_tag(anchor_id).map_err(Error::Store)?;
        }
        self.store
            .delete_tag(existing.row_id)
            .map_err(Error::Store)?;

        self.invalidate();
        debug!(slug = %slug, "language removed");
        Ok(())
    }

    // ==================== internals ====================

    fn load(&self) -> Result<Vec<Language>> {
        let rows = self.store.read_tags(LANGUAGE_ROW).map_err(Error::Store)?;
        let anchor_rows = self.store.read_tags(ANCHOR_ROW).map_err(Error::Store)?;

        let mut anchors_by_slug: HashMap<String, HashMap<String, i64>> = HashMap::new();
        for row in anchor_rows {
            if let Ok(anchor) = serde_json::from_value::<AnchorRecord>(row.payload) {
                anchors_by_slug
                    .entry(anchor.slug)
                    .or_default()
                    .insert(anchor.object_type, row.id);
            }
        }

        let mut languages = Vec::with_capacity(rows.len());
        for row in rows {
            let record: LanguageRecord =
                serde_json::from_value(row.payload).map_err(|e| Error::Store(e.into()))?;
            let anchors = anchors_by_slug.remove(&record.slug).unwrap_or_default();

            let mut language = Language {
                slug: record.slug,
                locale: record.locale,
                name: record.name,
                is_rtl: record.is_rtl,
                is_default: record.is_default,
                order: record.order,
                home_url: String::new(),
                search_url: String::new(),
                host: record.host,
                fallbacks: record.fallbacks,
                anchors,
                row_id: row.id,
            };
            language.home_url = self.codec.home_url(&language, &self.settings);
            language.search_url = self.codec.build(&language, "/search/", &self.settings);
            languages.push(language);
        }

        languages.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.slug.cmp(&b.slug)));
        Ok(languages)
    }

    fn validate(
        &self,
        spec: &LanguageSpec,
        current: &[Language],
        updating: Option<&str>,
    ) -> Result<()> {
        let mut err = ValidationError::new();

        if !slug_regex().is_match(&spec.slug) {
            err.push(
                "slug",
                format!(
                    "'{}' must be lowercase letters, digits, '-' or '_', at least two characters",
                    spec.slug
                ),
            );
        }
        if !locale_regex().is_match(&spec.locale) {
            err.push(
                "locale",
                format!("'{}' is not a valid locale identifier", spec.locale),
            );
        }
        if spec.name.trim().is_empty() {
            err.push("name", "display name must not be empty");
        }

        // Uniqueness, excluding the language being updated.
        let others = current.iter().filter(|lang| Some(lang.slug.as_str()) != updating);
        for other in others {
            if other.slug == spec.slug {
                err.push("slug", format!("'{}' is already used", spec.slug));
            }
            if other.locale == spec.locale {
                err.push("locale", format!("'{}' is already used", spec.locale));
            }
        }

        err.into_result()
    }

    /// Clear `is_default` on every language except `keep`. Part of the same
    /// logical operation as the add/update that set the new default: callers
    /// invalidate the cache only after this returns.
    fn clear_other_defaults(&self, keep: &str) -> Result<()> {
        let rows = self.store.read_tags(LANGUAGE_ROW).map_err(Error::Store)?;
        for row in rows {
            let Ok(mut record) = serde_json::from_value::<LanguageRecord>(row.payload) else {
                continue;
            };
            if record.slug != keep && record.is_default {
                record.is_default = false;
                let payload = serde_json::to_value(&record).map_err(|e| Error::Store(e.into()))?;
                self.store.update_tag(row.id, payload).map_err(Error::Store)?;
            }
        }
        Ok(())
    }

    fn rename_anchors(&self, old_slug: &str, new_slug: &str) -> Result<()> {
        let rows = self.store.read_tags(ANCHOR_ROW).map_err(Error::Store)?;
        for row in rows {
            let Ok(mut anchor) = serde_json::from_value::<AnchorRecord>(row.payload) else {
                continue;
            };
            if anchor.slug == old_slug {
                anchor.slug = new_slug.to_string();
                let payload = serde_json::to_value(&anchor).map_err(|e| Error::Store(e.into()))?;
                self.store.update_tag(row.id, payload).map_err(Error::Store)?;
            }
        }
        Ok(())
    }
}
