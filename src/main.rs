use anyhow::Result;
use axum::{
    extract::{Extension, State},
    response::Json,
    routing::get,
    Router,
};
use multilang::http::{resolve_language, AppState};
use multilang::{
    scheme, LanguageRegistry, LanguageResolver, LanguageSpec, MemoryTagStore, ResolutionContext,
    Settings,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored in production)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("multilang=info".parse()?),
        )
        .init();

    let settings = Settings::from_env()?;
    info!(scheme = ?settings.url_scheme, strategy = ?settings.resolve_strategy, "starting");

    let store = Arc::new(MemoryTagStore::new());
    let registry = Arc::new(LanguageRegistry::new(store, settings.clone()));

    // Demo languages; real deployments manage these through the admin
    // collaborator.
    if registry.list()?.is_empty() {
        registry.add(LanguageSpec::new("en", "en_US", "English").default_language())?;
        registry.add(LanguageSpec::new("fr", "fr_FR", "Français"))?;
    }

    let resolver = Arc::new(LanguageResolver::new(registry.clone(), settings.clone()));
    resolver.on_language_defined(|language| {
        info!(slug = %language.slug, locale = %language.locale, "language defined");
    });

    let state = Arc::new(AppState {
        registry,
        resolver,
        settings,
    });

    let app = Router::new()
        .route("/", get(show))
        .route("/*path", get(show))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            resolve_language,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8080);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("listening on port {}", port);
    axum::serve(listener, app).await?;
    Ok(())
}

/// Show the resolved language and the switcher links for the request.
async fn show(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<Arc<ResolutionContext>>,
) -> Json<serde_json::Value> {
    let current = ctx.current_language();
    let languages = state.registry.list().unwrap_or_default();
    let entries = scheme::switcher(
        &languages,
        state.resolver.codec(),
        &state.settings,
        "/",
        current.as_ref().map(|lang| lang.slug.as_str()),
    );

    Json(serde_json::json!({
        "language": current.as_ref().map(|lang| &lang.slug),
        "direction": ctx.text_direction(),
        "switcher": entries,
    }))
}
