use std::{collections::HashMap, path::Path, sync::Arc};

use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::{
    bus::DeviceBus,
    modbus::{self, ModbusError},
    types::{ConfigError, ErrorBody, ScanConfig, WriteAck, WriteRequest},
};

#[derive(Clone)]
pub struct AppState {
    bus: Arc<dyn DeviceBus>,
    // one lock per serial port; a port carries one transaction at a time
    port_locks: Arc<RwLock<HashMap<String, Arc<Mutex<()>>>>>,
}

impl AppState {
    pub fn new(bus: impl DeviceBus) -> Self {
        Self {
            bus: Arc::new(bus),
            port_locks: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    async fn port_lock(&self, port: &str) -> Arc<Mutex<()>> {
        if let Some(lock) = self.port_locks.read().await.get(port) {
            return lock.clone();
        }
        let mut locks = self.port_locks.write().await;
        // entries only the map still holds are idle
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry(port.to_string()).or_default().clone()
    }

    /// Run a blocking bus operation on `port`, serialized with every other
    /// operation on the same port.
    async fn on_port<T, F>(&self, port: &str, f: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn DeviceBus) -> Result<T, ModbusError> + Send + 'static,
    {
        let guard = self.port_lock(port).await.lock_owned().await;
        let bus = self.bus.clone();
        // held until the transaction ends, even if the request is dropped
        let out = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            f(bus.as_ref())
        })
        .await
        .map_err(|e| ApiError::Internal(format!("device task failed: {e}")))??;
        Ok(out)
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    BadRequest(#[from] ConfigError),
    #[error(transparent)]
    Device(#[from] ModbusError),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Device(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(%status, "request failed: {}", self);
        } else {
            warn!(%status, "request rejected: {}", self);
        }
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Build the application: JSON API under `/api`, static UI everywhere else.
pub fn router(state: AppState, ui_dir: impl AsRef<Path>) -> Router {
    let api = Router::new()
        .route("/ports", get(get_ports))
        .route("/scan", post(post_scan))
        .route("/write", post(post_write))
        .with_state(state);

    let static_svc = ServeDir::new(ui_dir.as_ref()).append_index_html_on_directories(true);

    Router::new()
        .nest("/api", api)
        .fallback_service(static_svc)
        .layer(TraceLayer::new_for_http())
}

/// Serve until `shutdown` is cancelled.
pub async fn spawn_server(
    bind: &str,
    state: AppState,
    ui_dir: &Path,
    shutdown: CancellationToken,
) -> Result<()> {
    let app = router(state, ui_dir);
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("Serving UI on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    info!("server stopped");
    Ok(())
}

async fn get_ports(State(app): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    let bus = app.bus.clone();
    let ports = tokio::task::spawn_blocking(move || bus.list_ports())
        .await
        .map_err(|e| ApiError::Internal(format!("port listing task failed: {e}")))?
        .map_err(|e| ApiError::Internal(format!("{e:#}")))?;
    info!(count = ports.len(), "listed serial ports");
    Ok(Json(ports))
}

async fn post_scan(
    State(app): State<AppState>,
    Json(cfg): Json<ScanConfig>,
) -> Result<Json<Vec<String>>, ApiError> {
    let link = cfg.link_settings()?;
    let plan = cfg.read_plan()?;
    info!(
        port = %link.port,
        slave = plan.slave_id,
        function = ?plan.function,
        start = plan.start,
        count = plan.count,
        "scan requested"
    );

    let port = link.port.clone();
    let values = app
        .on_port(&port, move |bus| bus.read(&link, &plan))
        .await?;
    if values.len() < plan.count as usize {
        warn!(
            port = %port,
            expected = plan.count,
            got = values.len(),
            "device returned fewer values than requested"
        );
    }
    Ok(Json(modbus::format_lines(plan.start, plan.count, &values)))
}

async fn post_write(
    State(app): State<AppState>,
    Json(req): Json<WriteRequest>,
) -> Result<Json<WriteAck>, ApiError> {
    let link = req.link_settings()?;
    let (slave_id, register, value) = (req.slave_id, req.register, req.value);
    info!(port = %link.port, slave = slave_id, register, value, "write requested");

    let port = link.port.clone();
    app.on_port(&port, move |bus| bus.write(&link, slave_id, register, value))
        .await?;
    Ok(Json(WriteAck {
        message: format!("Write successful (value {value} to register {register})"),
    }))
}
