//! Query-parameter scheme: the language travels in a reserved query key.
//!
//! The scheme of last resort, used when the site has no clean permalink
//! structure. When "hide default" is active the default language carries no
//! marker at all.

use crate::config::Settings;
use crate::registry::Language;
use crate::scheme::{join_query, split_url, LANG_QUERY_KEY};

#[derive(Debug, Clone, Copy)]
pub struct QueryParamScheme;

impl QueryParamScheme {
    pub fn build(&self, language: &Language, path: &str, settings: &Settings) -> String {
        let base = settings.site_url.trim_end_matches('/');
        let parts = split_url(path);

        if language.is_default && settings.hide_default {
            return format!("{}{}", base, join_query(&parts.path, &parts.query));
        }

        let mut query = parts.query;
        query.retain(|(k, _)| k != LANG_QUERY_KEY);
        query.push((LANG_QUERY_KEY.to_string(), language.slug.clone()));
        format!("{}{}", base, join_query(&parts.path, &query))
    }

    pub fn parse(&self, raw: &str, languages: &[Language]) -> (Option<String>, String) {
        let parts = split_url(raw);

        let marker = parts
            .query
            .iter()
            .find(|(k, _)| k == LANG_QUERY_KEY)
            .map(|(_, v)| v.clone());

        match marker {
            Some(value) if languages.iter().any(|lang| lang.slug == value) => {
                let remaining: Vec<(String, String)> = parts
                    .query
                    .into_iter()
                    .filter(|(k, _)| k != LANG_QUERY_KEY)
                    .collect();
                (Some(value), join_query(&parts.path, &remaining))
            }
            // Unknown marker values pass through untouched; the caller
            // falls back to preference negotiation.
            _ => (None, join_query(&parts.path, &parts.query)),
        }
    }
}
