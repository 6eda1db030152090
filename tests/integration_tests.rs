//! Integration tests for the multilingual resolution core.
//!
//! These tests verify the interaction between the registry, the translation
//! graph, the resolver and the query translator — the full path a request
//! takes from URL to language-scoped query.

use multilang::http::{resolve_language, AppState};
use multilang::{
    ContentFacts, LanguageRegistry, LanguageResolver, LanguageSpec, MemoryTagStore,
    QueryDescription, QueryTranslator, RequestFacts, ResolutionContext, ResolveStrategyKind,
    Settings, TranslationGraph, UrlSchemeKind,
};
use std::collections::BTreeMap;
use std::sync::Arc;

// ==================== Test Helpers ====================

struct World {
    registry: Arc<LanguageRegistry>,
    graph: Arc<TranslationGraph>,
    resolver: LanguageResolver,
    settings: Settings,
}

/// Registry {en (default), fr}; post #10 in en with #20 as its fr sibling.
fn world(settings: Settings) -> World {
    let store = Arc::new(MemoryTagStore::new());
    let registry = Arc::new(LanguageRegistry::new(store.clone(), settings.clone()));
    registry
        .add(LanguageSpec::new("en", "en_US", "English").default_language())
        .unwrap();
    registry
        .add(LanguageSpec::new("fr", "fr_FR", "Français"))
        .unwrap();

    let graph = Arc::new(TranslationGraph::new(
        store,
        registry.clone(),
        settings.mass_assign_batch,
    ));
    graph.set_language("post", 10, "en").unwrap();
    graph
        .save_group(
            "post",
            10,
            &BTreeMap::from([("en".to_string(), 10), ("fr".to_string(), 20)]),
        )
        .unwrap();

    let resolver = LanguageResolver::new(registry.clone(), settings.clone());
    World {
        registry,
        graph,
        resolver,
        settings,
    }
}

fn path_prefix_settings() -> Settings {
    Settings {
        site_url: "https://example.com".to_string(),
        url_scheme: UrlSchemeKind::PathPrefix,
        resolve_strategy: ResolveStrategyKind::Url,
        ..Settings::default()
    }
}

// ==================== End-to-End Scenario ====================

#[test]
fn test_request_to_translated_query() {
    let w = world(path_prefix_settings());

    // Request /fr/some-fr-slug: the path-prefix codec resolves fr.
    let ctx = ResolutionContext::new();
    let facts = RequestFacts {
        url: "/fr/some-fr-slug".to_string(),
        ..RequestFacts::default()
    };
    let resolution = w.resolver.resolve(&ctx, &facts).unwrap();
    let language = resolution.language.unwrap();
    assert_eq!(language.slug, "fr");

    // The query for post 10 is rewritten to its fr sibling.
    let translator = QueryTranslator::new(w.graph.clone(), None);
    let query = QueryDescription {
        object_id: Some(10),
        ..QueryDescription::default()
    };
    let translated = translator.translate(&query, &language.slug).unwrap();
    assert_eq!(translated.object_id, Some(20));
    assert_eq!(translated.language.as_deref(), Some("fr"));
}

#[test]
fn test_group_visible_from_both_sides_after_resolution() {
    let w = world(path_prefix_settings());
    assert_eq!(w.graph.get_translation("post", 20, "en").unwrap(), Some(10));
    assert_eq!(w.graph.get_translation("post", 10, "fr").unwrap(), Some(20));
}

#[test]
fn test_content_strategy_full_request_cycle() {
    let settings = Settings {
        site_url: "https://example.com".to_string(),
        url_scheme: UrlSchemeKind::QueryParam,
        resolve_strategy: ResolveStrategyKind::Content,
        ..Settings::default()
    };
    let w = world(settings);

    // Early resolution defers; nothing distinguishes the request yet.
    let ctx = ResolutionContext::new();
    let facts = RequestFacts {
        url: "/some-slug/".to_string(),
        accept_language: Some("fr;q=0.8, en;q=0.9".to_string()),
        ..RequestFacts::default()
    };
    assert!(w.resolver.resolve(&ctx, &facts).unwrap().language.is_none());

    // The query layer finds the object and its language; resolution lands.
    let object_language = w
        .graph
        .get_language("post", 20)
        .unwrap()
        .map(|lang| lang.slug);
    let content = ContentFacts {
        object_language,
        ..ContentFacts::default()
    };
    let resolution = w.resolver.resolve_content(&ctx, &facts, &content).unwrap();
    assert_eq!(resolution.language.unwrap().slug, "fr");
    assert_eq!(ctx.current_language().unwrap().slug, "fr");
}

#[test]
fn test_switcher_urls_follow_the_scheme() {
    let w = world(path_prefix_settings());
    let languages = w.registry.list().unwrap();
    let entries = multilang::switcher(
        &languages,
        w.resolver.codec(),
        &w.settings,
        "/some-fr-slug",
        Some("fr"),
    );

    let en = entries.iter().find(|e| e.slug == "en").unwrap();
    let fr = entries.iter().find(|e| e.slug == "fr").unwrap();
    assert_eq!(en.url, "https://example.com/some-fr-slug");
    assert_eq!(fr.url, "https://example.com/fr/some-fr-slug");
    assert!(fr.is_current);
}

// ==================== Middleware Round Trip ====================

mod middleware {
    use super::*;
    use axum::{body::Body, extract::Extension, http, routing::get, Router};
    use tower::util::ServiceExt;

    async fn handler(Extension(ctx): Extension<Arc<ResolutionContext>>) -> String {
        ctx.current_language()
            .map(|lang| format!("{}:{}", lang.slug, ctx.text_direction()))
            .unwrap_or_else(|| "none".to_string())
    }

    fn app() -> Router {
        let w = world(path_prefix_settings());
        let state = Arc::new(AppState {
            registry: w.registry,
            resolver: Arc::new(w.resolver),
            settings: w.settings,
        });
        Router::new()
            .route("/*path", get(handler))
            .layer(axum::middleware::from_fn_with_state(state, resolve_language))
    }

    #[tokio::test]
    async fn test_resolved_language_reaches_the_handler() {
        let response = app()
            .oneshot(
                http::Request::builder()
                    .uri("/fr/some-fr-slug")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), http::StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&bytes[..], b"fr:ltr");
    }

    #[tokio::test]
    async fn test_unsupported_header_serves_default_silently() {
        let response = app()
            .oneshot(
                http::Request::builder()
                    .uri("/some-slug")
                    .header("accept-language", "ja, zh;q=0.9")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), http::StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&bytes[..], b"en:ltr");
    }
}

// ==================== Invariants Across Components ====================

#[test]
fn test_default_change_is_visible_after_invalidation() {
    let w = world(path_prefix_settings());
    w.registry
        .update(
            "fr",
            LanguageSpec::new("fr", "fr_FR", "Français").default_language(),
        )
        .unwrap();

    // add/update invalidate internally; the new default is immediately
    // served and uniqueness holds.
    let defaults: Vec<String> = w
        .registry
        .list()
        .unwrap()
        .iter()
        .filter(|lang| lang.is_default)
        .map(|lang| lang.slug.clone())
        .collect();
    assert_eq!(defaults, vec!["fr".to_string()]);
}

#[test]
fn test_signed_exclusions_survive_translation() {
    let w = world(path_prefix_settings());
    let translator = QueryTranslator::new(w.graph, None);
    let query = QueryDescription {
        object_ids: vec![-10, 10],
        ..QueryDescription::default()
    };
    let translated = translator.translate(&query, "fr").unwrap();
    assert_eq!(translated.object_ids, vec![-20, 20]);
}
