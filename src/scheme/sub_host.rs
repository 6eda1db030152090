//! Sub-host scheme: the language slug is the leftmost DNS label.
//!
//! `fr.example.com` is French. When the leftmost label of an inbound host
//! names no registered language, parsing falls back to path-prefix rules so
//! mixed setups (and bare paths) still resolve.

use crate::config::Settings;
use crate::registry::Language;
use crate::scheme::{join_query, match_leading_segment, split_url};

#[derive(Debug, Clone, Copy)]
pub struct SubHostScheme;

impl SubHostScheme {
    pub fn build(&self, language: &Language, path: &str, settings: &Settings) -> String {
        let parts = split_url(path);
        let tail = join_query(&parts.path, &parts.query);

        if language.is_default && settings.hide_default {
            return format!("{}{}", settings.site_url.trim_end_matches('/'), tail);
        }

        let scheme = settings
            .site_url
            .split_once("://")
            .map(|(scheme, _)| scheme)
            .unwrap_or("http");
        format!("{}://{}.{}{}", scheme, language.slug, settings.site_host(), tail)
    }

    pub fn parse(
        &self,
        raw: &str,
        languages: &[Language],
        _settings: &Settings,
    ) -> (Option<String>, String) {
        let parts = split_url(raw);

        if let Some(host) = &parts.host {
            if let Some(label) = host.split('.').next() {
                if let Some(language) = languages.iter().find(|lang| lang.slug == label) {
                    return (
                        Some(language.slug.clone()),
                        join_query(&parts.path, &parts.query),
                    );
                }
            }
        }

        // No host, or its first label names no language: path-prefix rules.
        match match_leading_segment(&parts.path, languages) {
            Some((language, rest)) => (
                Some(language.slug.clone()),
                join_query(&rest, &parts.query),
            ),
            None => (None, join_query(&parts.path, &parts.query)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UrlSchemeKind;
    use crate::registry::{LanguageRegistry, LanguageSpec};
    use crate::store::MemoryTagStore;
    use std::sync::Arc;

    fn fixture(hide_default: bool) -> (Vec<Language>, Settings) {
        let settings = Settings {
            site_url: "https://example.com".to_string(),
            url_scheme: UrlSchemeKind::SubHost,
            hide_default,
            ..Settings::default()
        };
        let reg = LanguageRegistry::new(Arc::new(MemoryTagStore::new()), settings.clone());
        reg.add(LanguageSpec::new("en", "en_US", "English").default_language())
            .unwrap();
        reg.add(LanguageSpec::new("fr", "fr_FR", "Français")).unwrap();
        (reg.list().unwrap().as_ref().clone(), settings)
    }

    #[test]
    fn test_build_prepends_label() {
        let (langs, settings) = fixture(true);
        let fr = langs.iter().find(|l| l.slug == "fr").unwrap();
        assert_eq!(
            SubHostScheme.build(fr, "/some/path/", &settings),
            "https://fr.example.com/some/path/"
        );
    }

    #[test]
    fn test_build_default_stays_on_bare_host() {
        let (langs, settings) = fixture(true);
        let en = langs.iter().find(|l| l.slug == "en").unwrap();
        assert_eq!(
            SubHostScheme.build(en, "/", &settings),
            "https://example.com/"
        );
    }

    #[test]
    fn test_build_default_labelled_when_not_hidden() {
        let (langs, settings) = fixture(false);
        let en = langs.iter().find(|l| l.slug == "en").unwrap();
        assert_eq!(
            SubHostScheme.build(en, "/", &settings),
            "https://en.example.com/"
        );
    }

    #[test]
    fn test_parse_reads_first_label() {
        let (langs, settings) = fixture(true);
        let (slug, path) = SubHostScheme.parse("https://fr.example.com/a/", &langs, &settings);
        assert_eq!(slug.as_deref(), Some("fr"));
        assert_eq!(path, "/a/");
    }

    #[test]
    fn test_parse_unknown_label_falls_back_to_path_rules() {
        let (langs, settings) = fixture(true);
        let (slug, path) =
            SubHostScheme.parse("https://www.example.com/fr/a/", &langs, &settings);
        assert_eq!(slug.as_deref(), Some("fr"));
        assert_eq!(path, "/a/");
    }

    #[test]
    fn test_parse_bare_path_uses_path_rules() {
        let (langs, settings) = fixture(true);
        let (slug, path) = SubHostScheme.parse("/fr/a/", &langs, &settings);
        assert_eq!(slug.as_deref(), Some("fr"));
        assert_eq!(path, "/a/");
    }

    #[test]
    fn test_parse_nothing_matches() {
        let (langs, settings) = fixture(true);
        let (slug, path) = SubHostScheme.parse("https://www.example.com/a/", &langs, &settings);
        assert!(slug.is_none());
        assert_eq!(path, "/a/");
    }
}
