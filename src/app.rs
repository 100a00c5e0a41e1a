use crate::catalog::{self, CatalogOutcome, CatalogResult, CatalogState, CatalogView, SessionRegistry};
use crate::config::Config;
use crate::models::ContentType;
use crate::playback::{self, PlaybackSelector};
use crate::render;
use crate::tmdb::{parse_tmdb_id, TmdbApi, TmdbClient, TmdbError};
use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use axum_extra::TypedHeader;
use headers::CacheControl;
use serde::Deserialize;
use std::{sync::Arc, time::Duration};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{debug, info, warn};

const MAX_BODY_BYTES: usize = 16 * 1024; // GET-only surface
const REVALIDATE_SECS: u64 = 3600;

#[derive(Clone)]
pub struct AppState {
    pub tmdb: Arc<dyn TmdbApi>,
    pub config: Arc<Config>,
    pub sessions: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(tmdb: Arc<dyn TmdbApi>, config: Config) -> Self {
        let sessions = Arc::new(SessionRegistry::new(tmdb.clone(), config.search_debounce));
        Self {
            tmdb,
            config: Arc::new(config),
            sessions,
        }
    }
}

pub async fn run_server(config: Config) -> Result<()> {
    let tmdb: Arc<dyn TmdbApi> = Arc::new(TmdbClient::new(&config)?);
    let addr = config.bind_addr;
    let state = AppState::new(tmdb, config);
    let app = build_router(state);

    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(catalog_page))
        .route("/api/catalog", get(catalog_json))
        .route("/catalog/live", get(catalog_live))
        .route("/movie/:id", get(movie_detail))
        .route("/tv/:id", get(show_detail))
        .route("/watch/:id", get(watch_movie))
        .route("/watch/tv/:id", get(watch_show))
        .route("/health", get(health))
        .fallback(fallback)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

async fn fallback() -> Response {
    not_found()
}

fn revalidate_hint() -> TypedHeader<CacheControl> {
    TypedHeader(
        CacheControl::new()
            .with_public()
            .with_max_age(Duration::from_secs(REVALIDATE_SECS)),
    )
}

fn page(html: String) -> Response {
    (revalidate_hint(), Html(html)).into_response()
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Html(render::not_found_page())).into_response()
}

/// Every fetch failure on the detail and watch routes renders as not found.
fn detail_failure(what: &str, id: u64, err: TmdbError) -> Response {
    match err {
        TmdbError::NotFound(_) => info!("{} {} not found on TMDB", what, id),
        other => warn!("Failed to fetch {} {}: {}", what, id, other),
    }
    not_found()
}

#[derive(Debug, Default, Deserialize)]
pub struct CatalogParams {
    #[serde(rename = "type")]
    pub content_type: Option<String>,
    pub q: Option<String>,
    pub page: Option<String>,
}

impl CatalogParams {
    /// Lenient: unknown types fall back to movies, bad or zero pages to 1.
    pub fn state(&self) -> CatalogState {
        let content_type = self
            .content_type
            .as_deref()
            .and_then(|t| t.parse::<ContentType>().ok())
            .unwrap_or_default();
        let page = self
            .page
            .as_deref()
            .and_then(|p| p.trim().parse::<u32>().ok())
            .unwrap_or(1);
        CatalogState::new(content_type, self.q.as_deref().unwrap_or_default(), page)
    }
}

async fn load_view(state: &AppState, params: &CatalogParams) -> CatalogView {
    let catalog_state = params.state();
    let result = catalog::load(state.tmdb.as_ref(), &catalog_state.request()).await;
    CatalogView {
        state: catalog_state,
        result,
    }
}

async fn catalog_page(State(state): State<AppState>, Query(params): Query<CatalogParams>) -> Response {
    let view = load_view(&state, &params).await;
    let html = render::catalog_page(&view, &state.config.image_base_url);
    if matches!(view.result, CatalogResult::Failed { .. }) {
        // Keep the page usable but don't let the failure be cached.
        return Html(html).into_response();
    }
    page(html)
}

async fn catalog_json(State(state): State<AppState>, Query(params): Query<CatalogParams>) -> Response {
    let view = load_view(&state, &params).await;
    if matches!(view.result, CatalogResult::Failed { .. }) {
        return (StatusCode::BAD_GATEWAY, Json(view)).into_response();
    }
    (revalidate_hint(), Json(view)).into_response()
}

/// `type`/`q`/`page` describe the view the client currently shows. `action`
/// is `next`, `prev` or `type`; without one the request is a keystroke.
#[derive(Debug, Deserialize)]
struct LiveParams {
    session: String,
    action: Option<String>,
    #[serde(flatten)]
    view: CatalogParams,
}

async fn catalog_live(State(state): State<AppState>, Query(params): Query<LiveParams>) -> Response {
    let Some(browser) = state.sessions.browser(&params.session).await else {
        return (StatusCode::BAD_REQUEST, "invalid session").into_response();
    };
    let shown = params.view.state();
    let outcome = match params.action.as_deref() {
        None | Some("search") => {
            let query = shown.query.clone();
            browser.restore(shown).await;
            browser.input(&query).await
        }
        Some("next") => {
            browser.restore(shown).await;
            browser.next_page().await
        }
        Some("prev") => {
            browser.restore(shown).await;
            browser.prev_page().await
        }
        Some("type") => browser.switch_content_type(shown.content_type).await,
        Some(other) => {
            debug!("Unknown live catalog action {:?}", other);
            return (StatusCode::BAD_REQUEST, "unknown action").into_response();
        }
    };
    match outcome {
        CatalogOutcome::Current(view) => {
            Html(render::catalog_results(&view, &state.config.image_base_url)).into_response()
        }
        CatalogOutcome::Superseded | CatalogOutcome::Unchanged => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn movie_detail(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let Some(id) = parse_tmdb_id(&id) else {
        return not_found();
    };
    match state.tmdb.movie(id).await {
        Ok(movie) => page(render::movie_detail_page(&movie, &state.config.image_base_url)),
        Err(e) => detail_failure("movie", id, e),
    }
}

async fn show_detail(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let Some(id) = parse_tmdb_id(&id) else {
        return not_found();
    };
    match state.tmdb.show(id).await {
        Ok(show) => page(render::show_detail_page(&show, &state.config.image_base_url)),
        Err(e) => detail_failure("show", id, e),
    }
}

async fn watch_movie(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let Some(id) = parse_tmdb_id(&id) else {
        return not_found();
    };
    match state.tmdb.movie(id).await {
        Ok(movie) => {
            let embed = playback::movie_embed_url(&state.config.embed_base_url, id);
            page(render::watch_movie_page(&movie, &embed))
        }
        Err(e) => detail_failure("movie", id, e),
    }
}

#[derive(Debug, Default, Deserialize)]
struct WatchParams {
    season: Option<String>,
    episode: Option<String>,
}

async fn watch_show(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<WatchParams>,
) -> Response {
    let Some(id) = parse_tmdb_id(&id) else {
        return not_found();
    };
    let show = match state.tmdb.show(id).await {
        Ok(show) => show,
        Err(e) => return detail_failure("show", id, e),
    };
    let season = params.season.as_deref().and_then(|s| s.trim().parse().ok());
    let episode = params.episode.as_deref().and_then(|e| e.trim().parse().ok());
    let selector = PlaybackSelector::from_query(&show.seasons, season, episode);
    let embed = selector.embed_url(&state.config.embed_base_url, id);
    page(render::watch_show_page(&show, &selector, &embed))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal received (Ctrl+C)");
        }
        _ = terminate => {
            info!("Shutdown signal received (SIGTERM)");
        }
    }
}
