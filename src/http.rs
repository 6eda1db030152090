//! HTTP wiring: request facts, the resolution middleware, and the cookie.
//!
//! The middleware runs the resolver once per request, exposes the
//! `ResolutionContext` as a request extension for everything downstream, and
//! performs the resolver's side effects: redirects and the preference
//! cookie. Detecting a shared cache in front of the app suppresses the
//! cookie entirely; a per-visitor `Set-Cookie` through a shared cache would
//! poison it for everyone.

use crate::config::Settings;
use crate::registry::LanguageRegistry;
use crate::resolver::{CookiePlan, LanguageResolver, RequestFacts, ResolutionContext};
use axum::{
    extract::{Request, State},
    http::header::{HeaderMap, HeaderValue, SET_COOKIE},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::warn;

/// Shared state for the middleware and handlers.
pub struct AppState {
    pub registry: Arc<LanguageRegistry>,
    pub resolver: Arc<LanguageResolver>,
    pub settings: Settings,
}

/// Request headers that reveal a shared caching layer in front of the app.
const CACHE_HEADERS: [&str; 3] = ["via", "x-cache", "cdn-loop"];

/// Extract the facts the resolver needs from an inbound request.
pub fn gather_facts(req: &Request, settings: &Settings) -> RequestFacts {
    let headers = req.headers();
    RequestFacts {
        url: req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string()),
        host: header_str(headers, "host"),
        accept_language: header_str(headers, "accept-language"),
        cookie: cookie_value(headers, &settings.cookie_name),
        referrer: header_str(headers, "referer"),
        shared_cache: CACHE_HEADERS
            .iter()
            .any(|name| headers.contains_key(*name)),
    }
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
}

/// Pull one cookie's value out of the `Cookie` header.
fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = header_str(headers, "cookie")?;
    raw.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

/// Render a cookie plan as a `Set-Cookie` header value.
fn render_cookie(plan: &CookiePlan) -> String {
    let expires = (Utc::now() + Duration::days(plan.max_age_days))
        .format("%a, %d %b %Y %H:%M:%S GMT");
    let mut cookie = format!(
        "{}={}; Path=/; Max-Age={}; Expires={}; SameSite={}",
        plan.name,
        plan.value,
        plan.max_age_days * 86_400,
        expires,
        plan.same_site,
    );
    if let Some(domain) = &plan.domain {
        cookie.push_str("; Domain=");
        cookie.push_str(domain);
    }
    cookie
}

/// Axum middleware: resolve the language once, expose the context, apply
/// side effects.
pub async fn resolve_language(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let facts = gather_facts(&req, &state.settings);
    let ctx = Arc::new(ResolutionContext::new());

    let resolution = match state.resolver.resolve(&ctx, &facts) {
        Ok(resolution) => resolution,
        Err(err) => {
            // Resolution failure must not fail the request; serve it
            // language-less and let downstream fall back.
            warn!(error = %err, "language resolution failed");
            Default::default()
        }
    };

    if let Some(target) = &resolution.redirect {
        return Redirect::temporary(target).into_response();
    }

    req.extensions_mut().insert(Arc::clone(&ctx));
    let mut response = next.run(req).await;

    if let Some(plan) = &resolution.cookie {
        match HeaderValue::from_str(&render_cookie(plan)) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(err) => warn!(error = %err, "preference cookie not set"),
        }
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ResolveStrategyKind, UrlSchemeKind};
    use crate::registry::LanguageSpec;
    use crate::store::MemoryTagStore;
    use axum::{body::Body, extract::Extension, http, routing::get, Router};
    use tower::util::ServiceExt;

    async fn current_slug(Extension(ctx): Extension<Arc<ResolutionContext>>) -> String {
        ctx.current_language()
            .map(|lang| lang.slug)
            .unwrap_or_else(|| "none".to_string())
    }

    fn app() -> Router {
        let settings = Settings {
            site_url: "https://example.com".to_string(),
            url_scheme: UrlSchemeKind::PathPrefix,
            resolve_strategy: ResolveStrategyKind::Url,
            ..Settings::default()
        };
        let store = Arc::new(MemoryTagStore::new());
        let registry = Arc::new(LanguageRegistry::new(store, settings.clone()));
        registry
            .add(LanguageSpec::new("en", "en_US", "English").default_language())
            .unwrap();
        registry.add(LanguageSpec::new("fr", "fr_FR", "Français")).unwrap();
        let resolver = Arc::new(LanguageResolver::new(registry.clone(), settings.clone()));
        let state = Arc::new(AppState {
            registry,
            resolver,
            settings,
        });

        Router::new()
            .route("/", get(current_slug))
            .route("/*path", get(current_slug))
            .layer(axum::middleware::from_fn_with_state(state, resolve_language))
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_prefix_resolves_and_sets_cookie() {
        let response = app()
            .oneshot(
                http::Request::builder()
                    .uri("/fr/some-slug/")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), http::StatusCode::OK);
        let cookie = response
            .headers()
            .get(SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(cookie.starts_with("preferred_language=fr"));
        assert!(cookie.contains("SameSite=Lax"));
        assert_eq!(body_string(response).await, "fr");
    }

    #[tokio::test]
    async fn test_home_redirects_to_preferred_language() {
        let response = app()
            .oneshot(
                http::Request::builder()
                    .uri("/")
                    .header("accept-language", "fr")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), http::StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            response.headers().get(http::header::LOCATION).unwrap(),
            "https://example.com/fr/"
        );
    }

    #[tokio::test]
    async fn test_cookie_preference_beats_header() {
        let response = app()
            .oneshot(
                http::Request::builder()
                    .uri("/untagged/")
                    .header("accept-language", "en")
                    .header("cookie", "other=1; preferred_language=fr")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(body_string(response).await, "fr");
    }

    #[tokio::test]
    async fn test_shared_cache_suppresses_cookie() {
        let response = app()
            .oneshot(
                http::Request::builder()
                    .uri("/fr/some-slug/")
                    .header("via", "1.1 varnish")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response.headers().get(SET_COOKIE).is_none());
        assert_eq!(body_string(response).await, "fr");
    }

    #[test]
    fn test_render_cookie_attributes() {
        let plan = CookiePlan {
            name: "preferred_language".to_string(),
            value: "fr".to_string(),
            max_age_days: 1,
            domain: Some(".example.com".to_string()),
            same_site: "Lax",
        };
        let rendered = render_cookie(&plan);
        assert!(rendered.starts_with("preferred_language=fr; Path=/; Max-Age=86400; Expires="));
        assert!(rendered.ends_with("; SameSite=Lax; Domain=.example.com"));
    }

    #[test]
    fn test_cookie_value_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "cookie",
            HeaderValue::from_static("a=1; preferred_language=fr; b=2"),
        );
        assert_eq!(
            cookie_value(&headers, "preferred_language").as_deref(),
            Some("fr")
        );
        assert!(cookie_value(&headers, "missing").is_none());
    }
}
