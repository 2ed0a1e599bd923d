//! Router and shared state

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::services::ServeDir;

use crate::config::RelayConfig;
use crate::hub::Hub;
use crate::{sensors, transcribe, ws};

#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<Hub>,
    pub config: Arc<RelayConfig>,
    /// Aligner client; redirects are inspected rather than followed
    pub aligner: reqwest::Client,
}

impl AppState {
    pub fn new(config: RelayConfig) -> reqwest::Result<Self> {
        let aligner = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self {
            hub: Arc::new(Hub::new()),
            config: Arc::new(config),
            aligner,
        })
    }
}

pub fn router(state: AppState) -> Router {
    let upload_limit = state.config.max_upload_bytes();
    Router::new()
        .route("/ws", get(ws::handler))
        .route("/sensors", post(sensors::handler))
        .route(
            "/transcribe",
            post(transcribe::handler).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .nest_service("/uploads", ServeDir::new(&state.config.upload_dir))
        .with_state(state)
}
