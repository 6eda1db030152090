//! Per-request language resolution.
//!
//! The resolver runs once per request and decides the current language
//! through one of three strategies chosen at startup: URL-derived,
//! host-derived, or content-derived (which defers until the queried content
//! is known). The decision lands in a `ResolutionContext` whose current
//! language can be written exactly once; whichever code path resolves first
//! wins and everything later reads that value.

use crate::config::{ResolveStrategyKind, Settings, UrlSchemeKind};
use crate::error::Result;
use crate::negotiation::{get_preferred, Preferred};
use crate::registry::{Language, LanguageRegistry};
use crate::scheme::{split_url, UrlScheme};
use std::sync::{Arc, Mutex, OnceLock};
use tracing::debug;

/// Resolution lifecycle of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionState {
    Unset,
    Resolving,
    Set,
}

/// Request-scoped language state. Created empty at request start, written at
/// most once by the resolver, read by everything downstream, discarded at
/// request end.
#[derive(Default)]
pub struct ResolutionContext {
    current: OnceLock<Language>,
    preferred: OnceLock<Preferred>,
    filter: Mutex<Option<Language>>,
    resolving: Mutex<bool>,
    overrides: Mutex<Vec<Language>>,
}

impl ResolutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// The resolved language, honouring any active scoped override.
    pub fn current_language(&self) -> Option<Language> {
        let overrides = self.overrides.lock().unwrap();
        if let Some(lang) = overrides.last() {
            return Some(lang.clone());
        }
        self.current.get().cloned()
    }

    /// The negotiated preference (cookie/header/default), available even
    /// while resolution is still deferred.
    pub fn preferred(&self) -> Option<&Preferred> {
        self.preferred.get()
    }

    /// Admin-side narrowing; not decided by the resolver but consumed
    /// alongside the current language.
    pub fn set_filter_language(&self, language: Option<Language>) {
        *self.filter.lock().unwrap() = language;
    }

    pub fn filter_language(&self) -> Option<Language> {
        self.filter.lock().unwrap().clone()
    }

    pub fn state(&self) -> ResolutionState {
        if self.current.get().is_some() {
            ResolutionState::Set
        } else if *self.resolving.lock().unwrap() {
            ResolutionState::Resolving
        } else {
            ResolutionState::Unset
        }
    }

    /// Text direction of the resolved language; LTR until resolution.
    pub fn text_direction(&self) -> &'static str {
        match self.current_language() {
            Some(lang) if lang.is_rtl => "rtl",
            _ => "ltr",
        }
    }

    /// First write wins; returns whether this call performed the write.
    fn set_current(&self, language: Language) -> bool {
        self.current.set(language).is_ok()
    }

    fn set_preferred(&self, preferred: Preferred) {
        let _ = self.preferred.set(preferred);
    }

    /// Temporarily switch the visible language, e.g. while synchronizing
    /// data across a translation group. The previous state is restored when
    /// the returned guard drops.
    pub fn scoped_language(&self, language: Language) -> LanguageScope<'_> {
        self.overrides.lock().unwrap().push(language);
        LanguageScope { ctx: self }
    }
}

/// RAII guard for a scoped language override.
pub struct LanguageScope<'a> {
    ctx: &'a ResolutionContext,
}

impl Drop for LanguageScope<'_> {
    fn drop(&mut self) {
        self.ctx.overrides.lock().unwrap().pop();
    }
}

/// What the HTTP layer knows about a request before any content is queried.
#[derive(Debug, Clone, Default)]
pub struct RequestFacts {
    /// Path plus query string, e.g. `/fr/some-slug?x=1`
    pub url: String,
    pub host: Option<String>,
    pub accept_language: Option<String>,
    /// Value of the preference cookie, if present
    pub cookie: Option<String>,
    pub referrer: Option<String>,
    /// A shared cache sits in front of the app; per-visitor cookies would
    /// poison it
    pub shared_cache: bool,
}

impl RequestFacts {
    fn request_url(&self) -> String {
        match &self.host {
            Some(host) => format!("http://{}{}", host, self.url),
            None => self.url.clone(),
        }
    }

    fn referrer_is_same_site(&self, settings: &Settings) -> bool {
        let Some(referrer) = &self.referrer else {
            return false;
        };
        let site = settings.site_host();
        let site_apex = site.split(':').next().unwrap_or(site);
        split_url(referrer)
            .host
            .is_some_and(|host| host == site_apex || host.ends_with(&format!(".{}", site_apex)))
    }
}

/// What the content layer learned while running the query; feeds the
/// deferred (content-derived) strategy.
#[derive(Debug, Clone, Default)]
pub struct ContentFacts {
    /// Explicit language marker carried by the query itself
    pub explicit_language: Option<String>,
    /// Language of the singular object the query resolved to
    pub object_language: Option<String>,
    /// Languages of the classification tags on the query, in encounter order
    pub tag_languages: Vec<String>,
    pub is_404: bool,
}

/// Cookie write the HTTP layer should perform, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookiePlan {
    pub name: String,
    pub value: String,
    pub max_age_days: i64,
    pub domain: Option<String>,
    pub same_site: &'static str,
}

/// Outcome of one resolution attempt.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// The language decided on, absent while deferred (or with no languages
    /// configured at all)
    pub language: Option<Language>,
    /// Redirect the request instead of serving it
    pub redirect: Option<String>,
    /// Persist the preference
    pub cookie: Option<CookiePlan>,
}

type Listener = Box<dyn Fn(&Language) + Send + Sync>;

/// The per-request resolver. Strategy and codec are fixed at construction
/// from configuration.
pub struct LanguageResolver {
    registry: Arc<LanguageRegistry>,
    settings: Settings,
    strategy: ResolveStrategyKind,
    codec: UrlScheme,
    listeners: Mutex<Vec<Listener>>,
}

impl LanguageResolver {
    pub fn new(registry: Arc<LanguageRegistry>, settings: Settings) -> Self {
        let codec = UrlScheme::from_settings(&settings);
        Self {
            registry,
            strategy: settings.resolve_strategy,
            settings,
            codec,
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn codec(&self) -> &UrlScheme {
        &self.codec
    }

    /// Subscribe to the "language defined" notification, fired once per
    /// request when resolution completes.
    pub fn on_language_defined(&self, listener: impl Fn(&Language) + Send + Sync + 'static) {
        self.listeners.lock().unwrap().push(Box::new(listener));
    }

    /// Early, request-start resolution. URL- and host-derived strategies
    /// always finish here; the content-derived strategy finishes only for
    /// requests it can decide without content (explicit marker, home page)
    /// and otherwise leaves the context unset for `resolve_content`.
    pub fn resolve(&self, ctx: &ResolutionContext, facts: &RequestFacts) -> Result<Resolution> {
        // First resolution wins: a second attempt is a no-op before any
        // strategy-specific logic runs.
        if let Some(language) = ctx.current_language() {
            return Ok(Resolution {
                language: Some(language),
                ..Resolution::default()
            });
        }

        *ctx.resolving.lock().unwrap() = true;
        let outcome = self.resolve_inner(ctx, facts);
        *ctx.resolving.lock().unwrap() = false;
        outcome
    }

    fn resolve_inner(&self, ctx: &ResolutionContext, facts: &RequestFacts) -> Result<Resolution> {
        let languages = self.registry.list()?;
        if languages.is_empty() {
            return Ok(Resolution::default());
        }

        let preferred = get_preferred(
            facts.cookie.as_deref(),
            facts.accept_language.as_deref(),
            &languages,
        )
        .unwrap_or_else(|| Preferred {
            language: languages[0].clone(),
            from_cookie: false,
        });
        ctx.set_preferred(preferred.clone());

        let (marker, remaining) = self
            .codec
            .parse(&facts.request_url(), &languages, &self.settings);
        let marker_language = marker.and_then(|slug| {
            languages.iter().find(|lang| lang.slug == slug).cloned()
        });

        match self.strategy {
            ResolveStrategyKind::Url => {
                if let Some(language) = marker_language {
                    return Ok(self.settle(ctx, facts, language));
                }
                if let Some(outcome) = self.home_policy(ctx, facts, &remaining, &preferred) {
                    return Ok(outcome);
                }
                Ok(self.settle(ctx, facts, preferred.language))
            }
            ResolveStrategyKind::Host => {
                // The host is authoritative: no cookie, no negotiation
                // redirects, and only the distinct-host codec applies.
                let language = match (&self.codec, marker_language) {
                    (UrlScheme::DistinctHost(_), Some(language)) => language,
                    _ => preferred.language,
                };
                let set = ctx.set_current(language.clone());
                if set {
                    self.notify(&language);
                }
                Ok(Resolution {
                    language: Some(language),
                    ..Resolution::default()
                })
            }
            ResolveStrategyKind::Content => {
                if let Some(language) = marker_language {
                    return Ok(self.settle(ctx, facts, language));
                }
                if let Some(outcome) = self.home_policy(ctx, facts, &remaining, &preferred) {
                    return Ok(outcome);
                }
                // Deferred: the content layer calls `resolve_content` once
                // the query ran.
                debug!("content strategy deferring resolution");
                Ok(Resolution::default())
            }
        }
    }

    /// Late, content-aware resolution for the content-derived strategy.
    /// Precedence: explicit marker, then the object's own language, then the
    /// first translated classification tag; a 404 always resolves to the
    /// preferred language.
    pub fn resolve_content(
        &self,
        ctx: &ResolutionContext,
        facts: &RequestFacts,
        content: &ContentFacts,
    ) -> Result<Resolution> {
        if let Some(language) = ctx.current_language() {
            return Ok(Resolution {
                language: Some(language),
                ..Resolution::default()
            });
        }

        let languages = self.registry.list()?;
        if languages.is_empty() {
            return Ok(Resolution::default());
        }

        let preferred = match ctx.preferred() {
            Some(preferred) => preferred.clone(),
            None => {
                let preferred = get_preferred(
                    facts.cookie.as_deref(),
                    facts.accept_language.as_deref(),
                    &languages,
                )
                .unwrap_or_else(|| Preferred {
                    language: languages[0].clone(),
                    from_cookie: false,
                });
                ctx.set_preferred(preferred.clone());
                preferred
            }
        };

        let by_slug = |slug: &str| languages.iter().find(|lang| lang.slug == slug).cloned();

        let language = if content.is_404 {
            preferred.language
        } else {
            content
                .explicit_language
                .as_deref()
                .and_then(by_slug)
                .or_else(|| content.object_language.as_deref().and_then(by_slug))
                .or_else(|| {
                    content
                        .tag_languages
                        .iter()
                        .find_map(|slug| by_slug(slug))
                })
                .unwrap_or(preferred.language)
        };

        Ok(self.settle(ctx, facts, language))
    }

    // ==================== internals ====================

    /// Home-page special case: on the bare home URL with nothing else in the
    /// query, either redirect to the preferred language's home or stay and
    /// adopt the preference. Visitors who navigated in from this site are
    /// never bounced.
    fn home_policy(
        &self,
        ctx: &ResolutionContext,
        facts: &RequestFacts,
        remaining: &str,
        preferred: &Preferred,
    ) -> Option<Resolution> {
        let parts = split_url(remaining);
        if parts.path != "/" || !parts.query.is_empty() {
            return None;
        }

        let requested_home = format!("{}/", self.settings.site_url.trim_end_matches('/'));
        let target = &preferred.language.home_url;

        if target != &requested_home && !facts.referrer_is_same_site(&self.settings) {
            debug!(target = %target, "redirecting home request to preferred language");
            return Some(Resolution {
                language: None,
                redirect: Some(target.clone()),
                cookie: None,
            });
        }

        Some(self.settle(ctx, facts, preferred.language.clone()))
    }

    /// Enter the terminal state: store the language, fire the notification,
    /// plan the cookie write.
    fn settle(
        &self,
        ctx: &ResolutionContext,
        facts: &RequestFacts,
        language: Language,
    ) -> Resolution {
        let set = ctx.set_current(language.clone());
        if set {
            debug!(slug = %language.slug, "language defined");
            self.notify(&language);
        }

        Resolution {
            cookie: if set { self.cookie_plan(facts, &language) } else { None },
            language: Some(language),
            redirect: None,
        }
    }

    fn notify(&self, language: &Language) {
        for listener in self.listeners.lock().unwrap().iter() {
            listener(language);
        }
    }

    fn cookie_plan(&self, facts: &RequestFacts, language: &Language) -> Option<CookiePlan> {
        if !self.settings.cookie_enabled
            || self.strategy == ResolveStrategyKind::Host
            || facts.shared_cache
        {
            return None;
        }
        if facts.cookie.as_deref() == Some(language.slug.as_str()) {
            return None;
        }

        // Sub-host setups need the cookie to span every language host.
        let domain = match self.settings.url_scheme {
            UrlSchemeKind::SubHost => {
                let host = self.settings.site_host();
                Some(format!(".{}", host.split(':').next().unwrap_or(host)))
            }
            _ => None,
        };

        Some(CookiePlan {
            name: self.settings.cookie_name.clone(),
            value: language.slug.clone(),
            max_age_days: self.settings.cookie_max_age_days,
            domain,
            same_site: "Lax",
        })
    }
}
