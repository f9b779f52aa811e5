use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::controllers::paste::PasteService;
use crate::counter::VisitCounter;
use crate::error::ApiError;
use crate::storage::PasteStore;
use crate::types::api::{CreatePaste, DeleteParams, ListParams, VisitStats};
use crate::App;

pub async fn run(app: App) -> anyhow::Result<()> {
    let addr = app.config.server.bind;

    let sweeper = match app.config.sweep.interval_secs {
        0 => None,
        secs => Some(spawn_sweeper(app.pastes.clone(), Duration::from_secs(secs))),
    };

    info!("listening on {addr}");
    axum::Server::try_bind(&addr)?
        .serve(router(app.clone()).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    app.persist_visits().await?;
    info!("shut down");

    Ok(())
}

pub fn router(app: App) -> Router {
    let cors = cors_layer(&app.config);

    Router::new()
        .route("/api/health", get(health))
        .route("/api/pastes", get(list_pastes).post(create_paste))
        .route("/api/pastes/:id", get(get_paste).delete(delete_paste))
        .route("/api/stats/visits", get(visit_stats).post(record_visit))
        // oversized bodies surface as a JSON rejection, answered like any other bad input
        .layer(DefaultBodyLimit::max(app.config.limits.max_request_size))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("ignoring invalid CORS origin '{origin}'");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
}

fn spawn_sweeper(pastes: PasteService, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if let Err(err) = pastes.purge_expired().await {
                warn!("expired paste sweep failed: {err}");
            }
        }
    })
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "healthy" }))
}

async fn create_paste(
    State(pastes): State<PasteService>,
    payload: Result<Json<CreatePaste>, JsonRejection>,
) -> crate::ApiResult<impl IntoResponse> {
    let Json(request) = payload?;
    let created = pastes.create(request).await?;
    let path = format!("/api/pastes/{}", created.paste.id);

    Ok((StatusCode::CREATED, [(header::LOCATION, path)], Json(created)))
}

async fn get_paste(
    State(pastes): State<PasteService>,
    Path(id): Path<String>,
) -> crate::ApiResult<impl IntoResponse> {
    Ok(Json(pastes.fetch(&id).await?))
}

async fn delete_paste(
    State(pastes): State<PasteService>,
    Query(params): Query<DeleteParams>,
    Path(id): Path<String>,
) -> crate::ApiResult<impl IntoResponse> {
    let secret_key = params
        .secret_key
        .filter(|key| !key.is_empty())
        .ok_or(ApiError::MissingSecretKey)?;

    pastes.delete(&id, &secret_key).await?;
    Ok(Json(json!({ "message": "Paste deleted" })))
}

async fn list_pastes(
    State(pastes): State<PasteService>,
    Query(params): Query<ListParams>,
) -> crate::ApiResult<impl IntoResponse> {
    if !pastes.listing_enabled() {
        return Err(ApiError::NotFound);
    }
    Ok(Json(pastes.list_recent(params.limit).await?))
}

async fn visit_stats(
    State(pastes): State<PasteService>,
    State(visits): State<Arc<VisitCounter>>,
) -> crate::ApiResult<Json<VisitStats>> {
    Ok(Json(VisitStats {
        visit_count: visits.current(),
        paste_count: pastes.count().await?,
    }))
}

async fn record_visit(
    State(pastes): State<PasteService>,
    State(visits): State<Arc<VisitCounter>>,
) -> crate::ApiResult<Json<VisitStats>> {
    let visit_count = visits.increment();
    pastes.store().save_visit_count(visit_count).await?;

    Ok(Json(VisitStats {
        visit_count,
        paste_count: pastes.count().await?,
    }))
}
