use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::str::FromStr;

/// Which URL scheme codec the site runs with. Selected once at startup and
/// injected into the resolver; never re-chosen per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlSchemeKind {
    /// Language carried in a reserved query parameter (`?lang=fr`)
    QueryParam,
    /// Language carried as a leading path segment (`/fr/...`)
    PathPrefix,
    /// Language carried as the leftmost DNS label (`fr.example.com`)
    SubHost,
    /// Each language bound to an explicitly configured host
    DistinctHost,
}

impl FromStr for UrlSchemeKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "query" => Ok(Self::QueryParam),
            "path" => Ok(Self::PathPrefix),
            "subhost" => Ok(Self::SubHost),
            "host" => Ok(Self::DistinctHost),
            other => bail!(
                "unknown URL scheme '{}' (expected query|path|subhost|host)",
                other
            ),
        }
    }
}

/// Which top-level resolution strategy runs per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveStrategyKind {
    /// Defer until the queried content is known
    Content,
    /// Read the language out of the URL via the configured codec
    Url,
    /// Read the language from the request host (distinct-host setups)
    Host,
}

impl FromStr for ResolveStrategyKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "content" => Ok(Self::Content),
            "url" => Ok(Self::Url),
            "host" => Ok(Self::Host),
            other => bail!(
                "unknown resolve strategy '{}' (expected content|url|host)",
                other
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    // Site
    pub site_url: String,

    // Resolution
    pub url_scheme: UrlSchemeKind,
    pub resolve_strategy: ResolveStrategyKind,
    pub hide_default: bool,

    // Preference cookie
    pub cookie_name: String,
    pub cookie_enabled: bool,
    pub cookie_max_age_days: i64,

    // Translation graph
    pub object_types: Vec<String>,
    pub mass_assign_batch: usize,

    // Distinct-host scheme: slug -> absolute host URL
    pub hosts: HashMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            site_url: "http://localhost:8080".to_string(),
            url_scheme: UrlSchemeKind::PathPrefix,
            resolve_strategy: ResolveStrategyKind::Url,
            hide_default: true,
            cookie_name: "preferred_language".to_string(),
            cookie_enabled: true,
            cookie_max_age_days: 365,
            object_types: vec!["post".to_string(), "term".to_string()],
            mass_assign_batch: 50,
            hosts: HashMap::new(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            site_url: std::env::var("MULTILANG_SITE_URL").unwrap_or(defaults.site_url),

            url_scheme: std::env::var("MULTILANG_URL_SCHEME")
                .map(|v| v.parse())
                .unwrap_or(Ok(defaults.url_scheme))
                .context("MULTILANG_URL_SCHEME invalid")?,
            resolve_strategy: std::env::var("MULTILANG_STRATEGY")
                .map(|v| v.parse())
                .unwrap_or(Ok(defaults.resolve_strategy))
                .context("MULTILANG_STRATEGY invalid")?,
            hide_default: std::env::var("MULTILANG_HIDE_DEFAULT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.hide_default),

            cookie_name: std::env::var("MULTILANG_COOKIE_NAME").unwrap_or(defaults.cookie_name),
            cookie_enabled: std::env::var("MULTILANG_COOKIE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.cookie_enabled),
            cookie_max_age_days: std::env::var("MULTILANG_COOKIE_MAX_AGE_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.cookie_max_age_days),

            object_types: std::env::var("MULTILANG_OBJECT_TYPES")
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.object_types),
            mass_assign_batch: std::env::var("MULTILANG_MASS_ASSIGN_BATCH")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.mass_assign_batch),

            hosts: std::env::var("MULTILANG_HOSTS")
                .map(|v| parse_host_table(&v))
                .unwrap_or_default(),
        })
    }

    /// The site host without scheme, used by the sub-host codec.
    pub fn site_host(&self) -> &str {
        let without_scheme = self
            .site_url
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.site_url);
        without_scheme.trim_end_matches('/')
    }
}

/// Parse `fr=https://example.fr,de=https://example.de` into a host table.
/// Malformed entries are skipped rather than failing startup.
fn parse_host_table(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .filter_map(|entry| {
            let (slug, host) = entry.split_once('=')?;
            let slug = slug.trim();
            let host = host.trim().trim_end_matches('/');
            if slug.is_empty() || host.is_empty() {
                return None;
            }
            Some((slug.to_string(), host.to_string()))
        })
        .collect()
}
