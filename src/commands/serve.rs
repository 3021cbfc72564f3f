use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};

use crate::{
    ServeArgs,
    config::Config,
    postprod::{Postprod, PostprodRequest, PublishResult, PuzzleMetadata, Rejection},
};

type Response = Result<(StatusCode, Json<PublishResult>), (StatusCode, String)>;

pub async fn run(args: &ServeArgs) -> Result<(), anyhow::Error> {
    let config = Config::load_from_arg(args.config_file.as_deref())?;
    let repository = config.repository.url.clone();
    let postprod = tokio::task::spawn_blocking(move || Postprod::from_config(config)).await??;

    let app = router(Arc::new(postprod));
    let addr: SocketAddr = format!("{}:{}", args.bind, args.port).parse()?;

    println!("Publishing to {repository}");
    println!("Listening on http://{addr}");
    println!("Press Ctrl+C to stop\n");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(postprod: Arc<Postprod>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/postprod", post(postprod_handler))
        .route("/export", post(export_handler))
        .with_state(postprod)
}

async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn postprod_handler(
    State(postprod): State<Arc<Postprod>>,
    Json(request): Json<PostprodRequest>,
) -> Response {
    let result = tokio::task::spawn_blocking(move || postprod.run(request)).await;
    respond(result)
}

async fn export_handler(
    State(postprod): State<Arc<Postprod>>,
    Json(records): Json<Vec<PuzzleMetadata>>,
) -> Response {
    let result = tokio::task::spawn_blocking(move || postprod.export(records)).await;
    respond(result)
}

fn respond(result: Result<PublishResult, tokio::task::JoinError>) -> Response {
    match result {
        Ok(result) => Ok((status_of(&result), Json(result))),
        Err(e) => {
            tracing::error!("postprod task panicked: {e}");
            Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

fn status_of(result: &PublishResult) -> StatusCode {
    match result {
        PublishResult::Published { .. } => StatusCode::OK,
        PublishResult::Rejected {
            rejection: Rejection::Busy,
            ..
        } => StatusCode::CONFLICT,
        PublishResult::Rejected {
            rejection: Rejection::Invalid,
            ..
        } => StatusCode::UNPROCESSABLE_ENTITY,
        PublishResult::Failed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
