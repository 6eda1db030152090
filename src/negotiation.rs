//! Client language-preference negotiation.
//!
//! Parses the weighted `Accept-Language` header and ranks it against the
//! configured languages. A persisted cookie preference always wins over the
//! header: a returning visitor's explicit choice must not be overridden by
//! browser header drift.

use crate::registry::Language;

/// Parse an `Accept-Language` header value into `(tag, quality)` pairs,
/// sorted descending by quality. The sort is stable: entries of equal
/// quality keep their header order, which makes tie-breaking deterministic.
pub fn parse_accept_language(header: &str) -> Vec<(String, f32)> {
    let mut prefs: Vec<(String, f32)> = header
        .split(',')
        .filter_map(|entry| {
            let mut parts = entry.split(';');
            let tag = parts.next()?.trim();
            if tag.is_empty() {
                return None;
            }

            let mut quality = 1.0f32;
            for param in parts {
                if let Some((key, value)) = param.trim().split_once('=') {
                    if key.trim() == "q" {
                        if let Ok(q) = value.trim().parse::<f32>() {
                            quality = q.clamp(0.0, 1.0);
                        }
                    }
                }
            }
            Some((tag.to_string(), quality))
        })
        .collect();

    // Stable: ties keep header order.
    prefs.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    prefs
}

/// Case- and separator-insensitive locale comparison key.
fn normalize(tag: &str) -> String {
    tag.to_lowercase().replace('-', "_")
}

fn primary_subtag(tag: &str) -> &str {
    tag.split(['-', '_']).next().unwrap_or(tag)
}

/// Walk ranked preferences against the available languages: exact locale
/// match first (the language's `fallbacks` count as exact aliases), then a
/// primary-subtag match (`en` matches `en_US`). First hit wins.
pub fn find_best_match(prefs: &[(String, f32)], available: &[Language]) -> Option<String> {
    for (tag, _) in prefs {
        let wanted = normalize(tag);

        let exact = available.iter().find(|lang| {
            normalize(&lang.locale) == wanted
                || lang.fallbacks.iter().any(|f| normalize(f) == wanted)
        });
        if let Some(lang) = exact {
            return Some(lang.slug.clone());
        }

        let primary = primary_subtag(&wanted);
        let partial = available.iter().find(|lang| {
            lang.primary_subtag() == primary || lang.slug == primary
        });
        if let Some(lang) = partial {
            return Some(lang.slug.clone());
        }
    }
    None
}

/// Outcome of `get_preferred`: the chosen language and whether it came from
/// the visitor's cookie.
#[derive(Debug, Clone)]
pub struct Preferred {
    pub language: Language,
    pub from_cookie: bool,
}

/// Decide the preferred language for a request.
///
/// A cookie naming a known language wins outright, without consulting the
/// header. Otherwise the header is negotiated; if that yields nothing, the
/// registry default is used. Returns `None` only when no language is
/// configured at all.
pub fn get_preferred(
    cookie: Option<&str>,
    header: Option<&str>,
    available: &[Language],
) -> Option<Preferred> {
    if let Some(value) = cookie {
        if let Some(lang) = available.iter().find(|lang| lang.slug == value) {
            return Some(Preferred {
                language: lang.clone(),
                from_cookie: true,
            });
        }
    }

    let negotiated = header.and_then(|h| {
        let prefs = parse_accept_language(h);
        find_best_match(&prefs, available)
    });

    let language = match negotiated {
        Some(slug) => available.iter().find(|lang| lang.slug == slug).cloned(),
        None => available.iter().find(|lang| lang.is_default).cloned(),
    }?;

    Some(Preferred {
        language,
        from_cookie: false,
    })
}
