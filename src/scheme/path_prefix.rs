//! Path-prefix scheme: the language is a leading path segment.
//!
//! `/fr/some/path` is French; the default language drops its prefix when
//! "hide default" is active.

use crate::config::Settings;
use crate::registry::Language;
use crate::scheme::{join_query, match_leading_segment, split_url};

#[derive(Debug, Clone, Copy)]
pub struct PathPrefixScheme;

impl PathPrefixScheme {
    pub fn build(&self, language: &Language, path: &str, settings: &Settings) -> String {
        let base = settings.site_url.trim_end_matches('/');
        let parts = split_url(path);
        let tail = join_query(&parts.path, &parts.query);

        if language.is_default && settings.hide_default {
            format!("{}{}", base, tail)
        } else {
            format!("{}/{}{}", base, language.slug, tail)
        }
    }

    pub fn parse(&self, raw: &str, languages: &[Language]) -> (Option<String>, String) {
        let parts = split_url(raw);

        match match_leading_segment(&parts.path, languages) {
            Some((language, rest)) => (
                Some(language.slug.clone()),
                join_query(&rest, &parts.query),
            ),
            None => (None, join_query(&parts.path, &parts.query)),
        }
    }
}
