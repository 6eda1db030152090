//! URL scheme codecs: how a language is carried in a URL.
//!
//! Four interchangeable strategies, selected once at startup from
//! configuration and dispatched through the `UrlScheme` enum:
//!
//! - `query_param`: reserved query key (`?lang=fr`)
//! - `path_prefix`: leading path segment (`/fr/...`)
//! - `sub_host`: leftmost DNS label (`fr.example.com`)
//! - `distinct_host`: explicit per-language host table
//!
//! Every variant obeys the same edge-case policy: `parse` on an absent or
//! unrecognized language marker returns `None` and never errors; callers
//! fall back to preference negotiation.

mod distinct_host;
mod path_prefix;
mod query_param;
mod sub_host;

pub use distinct_host::DistinctHostScheme;
pub use path_prefix::PathPrefixScheme;
pub use query_param::QueryParamScheme;
pub use sub_host::SubHostScheme;

use crate::config::{Settings, UrlSchemeKind};
use crate::registry::Language;
use serde::Serialize;
use url::Url;

/// Reserved query key for the query-parameter scheme.
pub const LANG_QUERY_KEY: &str = "lang";

/// A URL scheme codec, resolved once from configuration.
#[derive(Debug, Clone)]
pub enum UrlScheme {
    QueryParam(QueryParamScheme),
    PathPrefix(PathPrefixScheme),
    SubHost(SubHostScheme),
    DistinctHost(DistinctHostScheme),
}

impl UrlScheme {
    pub fn from_settings(settings: &Settings) -> Self {
        match settings.url_scheme {
            UrlSchemeKind::QueryParam => Self::QueryParam(QueryParamScheme),
            UrlSchemeKind::PathPrefix => Self::PathPrefix(PathPrefixScheme),
            UrlSchemeKind::SubHost => Self::SubHost(SubHostScheme),
            UrlSchemeKind::DistinctHost => Self::DistinctHost(DistinctHostScheme),
        }
    }

    /// Build a language-qualified absolute URL for `path`.
    pub fn build(&self, language: &Language, path: &str, settings: &Settings) -> String {
        match self {
            Self::QueryParam(s) => s.build(language, path, settings),
            Self::PathPrefix(s) => s.build(language, path, settings),
            Self::SubHost(s) => s.build(language, path, settings),
            Self::DistinctHost(s) => s.build(language, path, settings),
        }
    }

    /// Extract the language marker from an inbound URL (absolute or
    /// path-only). Returns the slug when it names a registered language,
    /// plus the path with the marker stripped.
    pub fn parse(
        &self,
        raw: &str,
        languages: &[Language],
        settings: &Settings,
    ) -> (Option<String>, String) {
        match self {
            Self::QueryParam(s) => s.parse(raw, languages),
            Self::PathPrefix(s) => s.parse(raw, languages),
            Self::SubHost(s) => s.parse(raw, languages, settings),
            Self::DistinctHost(s) => s.parse(raw, languages, settings),
        }
    }

    /// The home URL of a language under this scheme.
    pub fn home_url(&self, language: &Language, settings: &Settings) -> String {
        self.build(language, "/", settings)
    }
}

/// One entry of the language-switcher link list.
#[derive(Debug, Clone, Serialize)]
pub struct SwitcherEntry {
    pub slug: String,
    pub name: String,
    pub url: String,
    pub is_current: bool,
}

/// The per-language link list rendered wherever a language switch is
/// offered. `current_path` is the language-neutral path of the page being
/// viewed; `current` the slug of the resolved language, if any.
pub fn switcher(
    languages: &[Language],
    codec: &UrlScheme,
    settings: &Settings,
    current_path: &str,
    current: Option<&str>,
) -> Vec<SwitcherEntry> {
    languages
        .iter()
        .map(|lang| SwitcherEntry {
            slug: lang.slug.clone(),
            name: lang.name.clone(),
            url: codec.build(lang, current_path, settings),
            is_current: Some(lang.slug.as_str()) == current,
        })
        .collect()
}

// ==================== shared URL plumbing ====================

/// An inbound URL decomposed far enough for the codecs.
#[derive(Debug, Clone)]
pub(crate) struct UrlParts {
    pub host: Option<String>,
    pub path: String,
    pub query: Vec<(String, String)>,
}

/// Split an absolute URL or a bare path(+query) into parts. Never fails:
/// anything unparseable is treated as a bare path.
pub(crate) fn split_url(raw: &str) -> UrlParts {
    if raw.contains("://") {
        if let Ok(parsed) = Url::parse(raw) {
            return UrlParts {
                host: parsed.host_str().map(|h| h.to_string()),
                path: normalize_path(parsed.path()),
                query: parsed
                    .query_pairs()
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect(),
            };
        }
    }

    let (path, query) = match raw.split_once('?') {
        Some((p, q)) => (p, parse_query(q)),
        None => (raw, Vec::new()),
    };
    UrlParts {
        host: None,
        path: normalize_path(path),
        query,
    }
}

fn parse_query(q: &str) -> Vec<(String, String)> {
    q.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (k.to_string(), v.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect()
}

/// Empty paths mean the site root.
pub(crate) fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        "/".to_string()
    } else if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

/// Reattach query pairs to a path.
pub(crate) fn join_query(path: &str, query: &[(String, String)]) -> String {
    if query.is_empty() {
        return path.to_string();
    }
    let encoded: Vec<String> = query
        .iter()
        .map(|(k, v)| {
            if v.is_empty() {
                k.clone()
            } else {
                format!("{}={}", k, v)
            }
        })
        .collect();
    format!("{}?{}", path, encoded.join("&"))
}

/// Find the language a path's first segment names, if any.
pub(crate) fn match_leading_segment<'a>(
    path: &str,
    languages: &'a [Language],
) -> Option<(&'a Language, String)> {
    let trimmed = path.strip_prefix('/')?;
    let (first, rest) = match trimmed.split_once('/') {
        Some((first, rest)) => (first, format!("/{}", rest)),
        None => (trimmed, "/".to_string()),
    };
    let language = languages.iter().find(|lang| lang.slug == first)?;
    Some((language, rest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::registry::{LanguageRegistry, LanguageSpec};
    use crate::store::MemoryTagStore;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn languages(settings: &Settings) -> Vec<Language> {
        let reg = LanguageRegistry::new(Arc::new(MemoryTagStore::new()), settings.clone());
        reg.add(
            LanguageSpec::new("en", "en_US", "English")
                .default_language()
                .with_host("https://example.com"),
        )
        .unwrap();
        reg.add(LanguageSpec::new("fr", "fr_FR", "Français").with_host("https://example.fr"))
            .unwrap();
        reg.add(LanguageSpec::new("ar", "ar_SA", "العربية").rtl()).unwrap();
        reg.list().unwrap().as_ref().clone()
    }

    fn settings_for(kind: UrlSchemeKind, hide_default: bool) -> Settings {
        let mut settings = Settings {
            site_url: "https://example.com".to_string(),
            url_scheme: kind,
            hide_default,
            ..Settings::default()
        };
        settings
            .hosts
            .insert("ar".to_string(), "https://example-ar.test".to_string());
        settings
    }

    // ==================== Split / Join Tests ====================

    #[test]
    fn test_split_absolute_url() {
        let parts = split_url("https://fr.example.com/a/b?x=1&lang=fr");
        assert_eq!(parts.host.as_deref(), Some("fr.example.com"));
        assert_eq!(parts.path, "/a/b");
        assert_eq!(parts.query.len(), 2);
    }

    #[test]
    fn test_split_bare_path() {
        let parts = split_url("/a/b?x=1");
        assert!(parts.host.is_none());
        assert_eq!(parts.path, "/a/b");
        assert_eq!(parts.query, vec![("x".to_string(), "1".to_string())]);
    }

    #[test]
    fn test_split_empty_is_root() {
        let parts = split_url("");
        assert_eq!(parts.path, "/");
    }

    #[test]
    fn test_join_query_roundtrip() {
        let joined = join_query("/p", &[("x".to_string(), "1".to_string())]);
        assert_eq!(joined, "/p?x=1");
        assert_eq!(join_query("/p", &[]), "/p");
    }

    // ==================== Switcher Tests ====================

    #[test]
    fn test_switcher_links_every_language() {
        let settings = settings_for(UrlSchemeKind::PathPrefix, true);
        let langs = languages(&settings);
        let codec = UrlScheme::from_settings(&settings);

        let entries = switcher(&langs, &codec, &settings, "/about/", Some("fr"));
        assert_eq!(entries.len(), 3);

        let fr = entries.iter().find(|e| e.slug == "fr").unwrap();
        assert!(fr.is_current);
        assert_eq!(fr.url, "https://example.com/fr/about/");

        let en = entries.iter().find(|e| e.slug == "en").unwrap();
        assert!(!en.is_current);
        assert_eq!(en.url, "https://example.com/about/");
    }

    // ==================== Round-Trip Properties ====================

    fn path_strategy() -> impl Strategy<Value = String> {
        proptest::collection::vec("[a-z0-9-]{1,8}", 0..4)
            .prop_map(|segments| {
                if segments.is_empty() {
                    "/".to_string()
                } else {
                    format!("/{}/", segments.join("/"))
                }
            })
    }

    proptest! {
        #[test]
        fn prop_roundtrip_all_variants(path in path_strategy(), lang_idx in 0usize..3) {
            for kind in [
                UrlSchemeKind::QueryParam,
                UrlSchemeKind::PathPrefix,
                UrlSchemeKind::SubHost,
                UrlSchemeKind::DistinctHost,
            ] {
                // hide_default off so the marker is present for every
                // language, the default included.
                let settings = settings_for(kind, false);
                let langs = languages(&settings);
                let codec = UrlScheme::from_settings(&settings);
                let lang = &langs[lang_idx % langs.len()];

                let built = codec.build(lang, &path, &settings);
                let (slug, parsed_path) = codec.parse(&built, &langs, &settings);

                prop_assert_eq!(slug.as_deref(), Some(lang.slug.as_str()), "variant {:?}", kind);
                prop_assert_eq!(&parsed_path, &path, "variant {:?} url {}", kind, built);
            }
        }
    }

    #[test]
    fn test_roundtrip_home_and_empty_path() {
        for kind in [
            UrlSchemeKind::QueryParam,
            UrlSchemeKind::PathPrefix,
            UrlSchemeKind::SubHost,
            UrlSchemeKind::DistinctHost,
        ] {
            let settings = settings_for(kind, false);
            let langs = languages(&settings);
            let codec = UrlScheme::from_settings(&settings);
            let fr = langs.iter().find(|l| l.slug == "fr").unwrap();

            for path in ["", "/"] {
                let built = codec.build(fr, path, &settings);
                let (slug, parsed) = codec.parse(&built, &langs, &settings);
                assert_eq!(slug.as_deref(), Some("fr"), "variant {:?}", kind);
                assert_eq!(parsed, "/", "variant {:?}", kind);
            }
        }
    }
}
