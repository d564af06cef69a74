use crate::gui_bridge::model::ReportModel;
use crate::workflow::config::WorkflowConfig;
use crate::workflow::runner::{Runner, WorkflowResult};
use anyhow::Context;
use log::{info, warn};
use serde_json::json;
use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::{Arc, PoisonError, RwLock},
    thread,
};
use tokio::runtime::Builder;
use tokio::task;
use warp::{
    http::StatusCode,
    reply::{Json, WithStatus},
    Filter,
};

type SharedModel = Arc<RwLock<ReportModel>>;

pub fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9000))
}

fn apply(state: &SharedModel, outcome: anyhow::Result<WorkflowResult>) -> WithStatus<Json> {
    let mut guard = state.write().unwrap_or_else(PoisonError::into_inner);
    match outcome {
        Ok(result) => {
            let body = json!({
                "status": "ok",
                "units": result.stats.units,
                "laser": result.stats.laser,
            });
            guard.record(result);
            warp::reply::with_status(warp::reply::json(&body), StatusCode::OK)
        }
        Err(err) => {
            let message = format!("{:#}", err);
            warn!("ingest failed: {}", message);
            guard.record_failure(message.clone());
            warp::reply::with_status(
                warp::reply::json(&json!({ "status": "error", "message": message })),
                StatusCode::UNPROCESSABLE_ENTITY,
            )
        }
    }
}

/// Runs the workflow on the blocking pool so the server keeps answering.
async fn run_blocking(state: SharedModel, runner: Arc<Runner>) -> WithStatus<Json> {
    let outcome = match task::spawn_blocking(move || runner.execute()).await {
        Ok(outcome) => outcome,
        Err(err) => Err(anyhow::Error::new(err).context("ingest task did not complete")),
    };
    apply(&state, outcome)
}

/// Resolves the requested log against `root`; the result must stay inside it.
fn confine(root: &Path, mut config: WorkflowConfig) -> Result<WorkflowConfig, WithStatus<Json>> {
    let reject = |status: StatusCode, message: String| {
        warn!("ingest rejected: {}", message);
        warp::reply::with_status(
            warp::reply::json(&json!({ "status": "rejected", "message": message })),
            status,
        )
    };
    let root = root.canonicalize().map_err(|err| {
        reject(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("ingest root unavailable: {}", err),
        )
    })?;
    let requested = root.join(&config.log);
    let resolved = requested.canonicalize().map_err(|err| {
        reject(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("cannot resolve {}: {}", requested.display(), err),
        )
    })?;
    if !resolved.starts_with(&root) {
        return Err(reject(
            StatusCode::FORBIDDEN,
            format!("{} is outside {}", resolved.display(), root.display()),
        ));
    }
    config.log = resolved;
    Ok(config)
}

/// HTTP endpoint exposing the latest ingest to plotting clients.
///
/// `GET /report` returns the current [`ReportModel`], `POST /ingest` runs a
/// workflow described by a JSON [`WorkflowConfig`] and `POST /rerun` repeats
/// the bridge's own workflow. Ingested logs must live under `ingest_root`;
/// relative paths are taken from there.
pub struct ReportBridge {
    state: SharedModel,
    runner: Arc<Runner>,
    ingest_root: Arc<PathBuf>,
}

impl ReportBridge {
    pub fn new(runner: Arc<Runner>, ingest_root: PathBuf) -> Self {
        Self {
            state: Arc::new(RwLock::new(ReportModel::default())),
            runner,
            ingest_root: Arc::new(ingest_root),
        }
    }

    pub fn routes(
        &self,
    ) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
        let state = self.state.clone();
        let state_filter = warp::any().map(move || state.clone());
        let runner = self.runner.clone();
        let runner_filter = warp::any().map(move || runner.clone());
        let root = self.ingest_root.clone();
        let root_filter = warp::any().map(move || root.clone());

        let report_route = warp::path("report")
            .and(warp::path::end())
            .and(warp::get())
            .and(state_filter.clone())
            .map(|state: SharedModel| {
                let model = state.read().unwrap_or_else(PoisonError::into_inner).clone();
                warp::reply::json(&model)
            });

        let ingest_route = warp::path("ingest")
            .and(warp::path::end())
            .and(warp::post())
            .and(warp::body::json())
            .and(state_filter.clone())
            .and(root_filter)
            .and_then(
                |config: WorkflowConfig, state: SharedModel, root: Arc<PathBuf>| async move {
                    let reply = match confine(&root, config) {
                        Ok(config) => run_blocking(state, Arc::new(Runner::new(config))).await,
                        Err(rejected) => rejected,
                    };
                    Ok::<_, warp::Rejection>(reply)
                },
            );

        let rerun_route = warp::path("rerun")
            .and(warp::path::end())
            .and(warp::post())
            .and(state_filter)
            .and(runner_filter)
            .and_then(|state: SharedModel, runner: Arc<Runner>| async move {
                Ok::<_, warp::Rejection>(run_blocking(state, runner).await)
            });

        report_route.or(ingest_route).or(rerun_route)
    }

    /// Serves the routes on a dedicated thread until the process exits.
    pub fn serve(&self, address: SocketAddr) -> thread::JoinHandle<anyhow::Result<()>> {
        let routes = self.routes();
        thread::spawn(move || {
            let runtime = Builder::new_current_thread()
                .enable_all()
                .build()
                .context("building report bridge runtime")?;
            info!("report bridge listening on {}", address);
            runtime.block_on(warp::serve(routes).run(address));
            Ok(())
        })
    }

    pub fn publish(&self, result: WorkflowResult) {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        guard.record(result);
        info!("report bridge: {}", guard.status);
    }

    pub fn snapshot(&self) -> ReportModel {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
