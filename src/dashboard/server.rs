// The HTTP surface of the dashboard.

use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::OnceCell;

use crate::dashboard::*;

/// Shared by all the handlers. The table is loaded by the first request
/// that needs it and is read-only afterwards.
#[derive(Clone)]
pub struct AppState {
    settings: Arc<Settings>,
    table: Arc<OnceCell<Arc<ObjectionTable>>>,
}

impl AppState {
    pub fn new(settings: Settings) -> AppState {
        AppState {
            settings: Arc::new(settings),
            table: Arc::new(OnceCell::new()),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Returns the loaded table, loading it if needed. A failed load leaves
    /// the cell empty: the next call tries again.
    pub async fn table(&self) -> DashResult<Arc<ObjectionTable>> {
        let table = self
            .table
            .get_or_try_init(|| async {
                let settings = Arc::clone(&self.settings);
                let loaded = tokio::task::spawn_blocking(move || load_table(&settings))
                    .await
                    .context(BackgroundTaskSnafu {})??;
                Ok::<_, DashboardError>(Arc::new(loaded))
            })
            .await?;
        Ok(Arc::clone(table))
    }
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<DashboardError> for ApiError {
    fn from(err: DashboardError) -> Self {
        let message = error_chain(&err);
        warn!("request failed: {}", message);
        ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message,
        }
    }
}

impl ApiError {
    fn bad_request(message: String) -> Self {
        debug!("bad request: {}", message);
        ApiError {
            status: StatusCode::BAD_REQUEST,
            message,
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DataParams {
    pub muni: Option<String>,
    pub dept: Option<String>,
    #[serde(rename = "type")]
    pub objection_type: Option<String>,
}

impl DataParams {
    /// The query decoder replaces invalid UTF-8 sequences with U+FFFD.
    /// Such values are refused rather than matched.
    fn check_decoded(&self) -> Result<(), ApiError> {
        for (name, value) in [
            ("muni", &self.muni),
            ("dept", &self.dept),
            ("type", &self.objection_type),
        ] {
            if let Some(v) = value {
                if v.contains(char::REPLACEMENT_CHARACTER) {
                    return Err(ApiError::bad_request(format!(
                        "query parameter {} is not valid UTF-8",
                        name
                    )));
                }
            }
        }
        Ok(())
    }

    fn filters(&self) -> Filters {
        Filters {
            municipality: Selection::from_param(self.muni.as_deref()),
            department: Selection::from_param(self.dept.as_deref()),
            objection_type: Selection::from_param(self.objection_type.as_deref()),
        }
    }
}

async fn options_handler(State(state): State<AppState>) -> Result<Json<Options>, ApiError> {
    let table = state.table().await?;
    Ok(Json(build_options(&table)))
}

async fn data_handler(
    State(state): State<AppState>,
    params: Result<Query<DataParams>, QueryRejection>,
) -> Result<Json<ReportData>, ApiError> {
    let Query(params) = params?;
    params.check_decoded()?;
    let filters = params.filters();
    let table = state.table().await?;
    let report = build_report(&table, &filters);
    debug!(
        "data: filters {:?} -> {} cards",
        filters,
        report.cards.len()
    );
    Ok(Json(report))
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/options", get(options_handler))
        .route("/data", get(data_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Serves the dashboard API until the process is stopped.
pub async fn serve(settings: Settings) -> DashResult<()> {
    let addr = settings.bind;
    info!(
        "serve: input {:?}, cutoff {}",
        settings.input_path, settings.rules.cutoff
    );
    let app = build_router(AppState::new(settings));
    let listener = TcpListener::bind(addr).await.context(BindSnafu {
        addr: addr.to_string(),
    })?;
    match listener.local_addr() {
        Ok(local) => info!("Objection dashboard listening on http://{}", local),
        Err(_) => info!("Objection dashboard listening on http://{}", addr),
    }
    axum::serve(listener, app).await.context(ServeSnafu {})
}
