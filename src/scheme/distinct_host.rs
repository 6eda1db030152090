//! Distinct-host scheme: each language lives on its own configured host.
//!
//! Hosts are an explicit table (per-language configuration plus the
//! `Settings::hosts` fallback), never derived from the slug. Building a URL
//! for a language with no configured host fails closed: the URL lands on the
//! site host, which in distinct-host deployments is the default language's
//! host.

use crate::config::Settings;
use crate::registry::Language;
use crate::scheme::{join_query, split_url};
use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub struct DistinctHostScheme;

/// The configured host URL for a language, if any.
fn host_for<'a>(language: &'a Language, settings: &'a Settings) -> Option<&'a str> {
    language
        .host
        .as_deref()
        .or_else(|| settings.hosts.get(&language.slug).map(|h| h.as_str()))
}

/// Bare host portion of a configured host URL (`example.fr` from
/// `https://example.fr`).
fn bare_host(configured: &str) -> &str {
    configured
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(configured)
        .trim_end_matches('/')
}

impl DistinctHostScheme {
    pub fn build(&self, language: &Language, path: &str, settings: &Settings) -> String {
        let parts = split_url(path);
        let tail = join_query(&parts.path, &parts.query);

        match host_for(language, settings) {
            Some(host) => format!("{}{}", host.trim_end_matches('/'), tail),
            None => {
                warn!(slug = %language.slug, "no host configured, using the site host");
                format!("{}{}", settings.site_url.trim_end_matches('/'), tail)
            }
        }
    }

    pub fn parse(
        &self,
        raw: &str,
        languages: &[Language],
        settings: &Settings,
    ) -> (Option<String>, String) {
        let parts = split_url(raw);
        let tail = join_query(&parts.path, &parts.query);

        let Some(host) = &parts.host else {
            return (None, tail);
        };

        let matched = languages.iter().find(|lang| {
            host_for(lang, settings).is_some_and(|configured| bare_host(configured) == host)
        });

        (matched.map(|lang| lang.slug.clone()), tail)
    }
}
