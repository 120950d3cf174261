use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::error::Error;
use crate::models::{Run, RunStats, RunStatus, Setup, SetupStatus};
use crate::service::Service;

/// Builds the REST router over the service layer.
pub fn router(service: Arc<Service>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/setups", post(create_setup).get(list_setups))
        .route("/api/setups/:id", get(get_setup).delete(delete_setup))
        .route("/api/runs", post(start_run).get(list_runs))
        .route("/api/runs/:id", get(get_run))
        .route("/api/runs/:id/stats", get(run_stats))
        .route("/api/runs/:id/cancel", post(cancel_run))
        .with_state(service)
        .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
pub struct CreateSetupRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    pub rps: u32,
    /// Human-readable span, e.g. "10s" or "1m30s".
    pub duration: String,
}

#[derive(Debug, Deserialize)]
pub struct StartRunRequest {
    pub setup_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ListRunsQuery {
    pub setup_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SetupDto {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub method: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub body: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
    pub rps: u32,
    pub duration: String,
    pub status: SetupStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Setup> for SetupDto {
    fn from(setup: &Setup) -> Self {
        Self {
            id: setup.id,
            name: setup.name.clone(),
            description: setup.description.clone(),
            method: setup.method.clone(),
            url: setup.url.clone(),
            body: String::from_utf8_lossy(&setup.body).into_owned(),
            headers: setup.headers.clone(),
            rps: setup.rps,
            duration: humantime::format_duration(setup.duration).to_string(),
            status: setup.status,
            created_at: setup.created_at,
            updated_at: setup.updated_at,
        }
    }
}

impl TryFrom<SetupDto> for Setup {
    type Error = Error;

    fn try_from(dto: SetupDto) -> Result<Self, Error> {
        let duration = humantime::parse_duration(&dto.duration)
            .map_err(|err| Error::Validation(format!("invalid duration format: {err}")))?;
        Ok(Setup {
            id: dto.id,
            name: dto.name,
            description: dto.description,
            method: dto.method,
            url: dto.url,
            body: dto.body.into_bytes(),
            headers: dto.headers,
            rps: dto.rps,
            duration,
            status: dto.status,
            created_at: dto.created_at,
            updated_at: dto.updated_at,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RunDto {
    pub id: Uuid,
    pub setup_id: Uuid,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub stats: Option<RunStats>,
}

impl From<&Run> for RunDto {
    fn from(run: &Run) -> Self {
        Self {
            id: run.id,
            setup_id: run.setup_id,
            status: run.status,
            started_at: run.started_at,
            ended_at: run.ended_at,
            error: run.error.clone(),
            stats: run.stats.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Maps core errors onto REST status codes with a JSON error body.
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::SetupNotFound(_) | Error::RunNotFound(_) => StatusCode::NOT_FOUND,
            Error::SetupAlreadyExists(_) | Error::RunAlreadyExists(_) => StatusCode::CONFLICT,
            Error::Validation(_) | Error::SetupNotActive | Error::RunNotActive(_) => {
                StatusCode::BAD_REQUEST
            }
        };
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

async fn create_setup(
    State(service): State<Arc<Service>>,
    Json(req): Json<CreateSetupRequest>,
) -> Result<(StatusCode, Json<SetupDto>), ApiError> {
    let duration = humantime::parse_duration(&req.duration)
        .map_err(|_| Error::Validation("invalid duration format".to_string()))?;

    let setup = service.create_setup(
        req.name,
        req.description,
        req.method,
        req.url,
        req.body.into_bytes(),
        req.headers,
        req.rps,
        duration,
    )?;

    Ok((StatusCode::CREATED, Json(SetupDto::from(&setup))))
}

async fn list_setups(State(service): State<Arc<Service>>) -> Json<Vec<SetupDto>> {
    Json(service.list_setups().iter().map(SetupDto::from).collect())
}

async fn get_setup(
    State(service): State<Arc<Service>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SetupDto>, ApiError> {
    let setup = service.get_setup(id)?;
    Ok(Json(SetupDto::from(&setup)))
}

async fn delete_setup(
    State(service): State<Arc<Service>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    service.delete_setup(id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn start_run(
    State(service): State<Arc<Service>>,
    Json(req): Json<StartRunRequest>,
) -> Result<(StatusCode, Json<RunDto>), ApiError> {
    let run = service.start_run(req.setup_id)?;
    Ok((StatusCode::CREATED, Json(RunDto::from(&run))))
}

async fn list_runs(
    State(service): State<Arc<Service>>,
    Query(query): Query<ListRunsQuery>,
) -> Json<Vec<RunDto>> {
    let runs = match query.setup_id {
        Some(setup_id) => service.list_runs_by_setup(setup_id),
        None => service.list_runs(),
    };
    Json(runs.iter().map(RunDto::from).collect())
}

async fn get_run(
    State(service): State<Arc<Service>>,
    Path(id): Path<Uuid>,
) -> Result<Json<RunDto>, ApiError> {
    let run = service.get_run(id)?;
    Ok(Json(RunDto::from(&run)))
}

async fn run_stats(
    State(service): State<Arc<Service>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Option<RunStats>>, ApiError> {
    Ok(Json(service.run_stats(id)?))
}

async fn cancel_run(
    State(service): State<Arc<Service>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    service.cancel_run(id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::Collector;
    use crate::runner::Runner;
    use crate::storage::Repository;
    use axum::routing::get as axum_get;
    use serde_json::json;
    use std::net::SocketAddr;
    use std::time::Duration;
    use tokio::net::TcpListener;

    async fn spawn_app() -> String {
        let repo = Arc::new(Repository::new());
        let collector = Arc::new(Collector::new());
        let runner = Runner::new(Arc::clone(&repo), collector, reqwest::Client::new());
        let service = Arc::new(Service::new(repo, runner));
        let app = router(service);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn spawn_echo_target() -> SocketAddr {
        let app = Router::new()
            .route("/ok", axum_get(|| async { "hello" }))
            .route(
                "/fail",
                axum_get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
            );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn setup_payload(url: &str, rps: u32, duration: &str) -> serde_json::Value {
        json!({
            "name": "api-test",
            "description": "created from tests",
            "method": "GET",
            "url": url,
            "rps": rps,
            "duration": duration,
        })
    }

    async fn wait_for_status(
        client: &reqwest::Client,
        base: &str,
        run_id: &str,
        status: &str,
    ) -> RunDto {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let run: RunDto = client
                    .get(format!("{base}/api/runs/{run_id}"))
                    .send()
                    .await
                    .unwrap()
                    .json()
                    .await
                    .unwrap();
                if serde_json::to_value(run.status).unwrap() == status {
                    return run;
                }
                tokio::time::sleep(Duration::from_millis(25)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("run never reached {status}"))
    }

    #[tokio::test]
    async fn health_endpoint_responds() {
        let base = spawn_app().await;
        let resp = reqwest::get(format!("{base}/health")).await.unwrap();
        assert_eq!(resp.status(), 200);
    }

    #[tokio::test]
    async fn create_setup_returns_201_and_round_trips() {
        let base = spawn_app().await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{base}/api/setups"))
            .json(&setup_payload("http://127.0.0.1:9/ok", 100, "10s"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
        let dto: SetupDto = resp.json().await.unwrap();
        assert_eq!(dto.rps, 100);
        assert_eq!(dto.duration, "10s");
        assert_eq!(dto.status, SetupStatus::Active);

        let fetched: SetupDto = client
            .get(format!("{base}/api/setups/{}", dto.id))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(fetched.id, dto.id);

        // DTO -> model -> DTO keeps every field.
        let model = Setup::try_from(fetched).unwrap();
        let back = SetupDto::from(&model);
        assert_eq!(back.id, dto.id);
        assert_eq!(back.url, dto.url);
        assert_eq!(back.rps, dto.rps);
        assert_eq!(back.duration, dto.duration);
        assert_eq!(back.created_at, dto.created_at);
    }

    #[tokio::test]
    async fn zero_rps_is_rejected_with_400() {
        let base = spawn_app().await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{base}/api/setups"))
            .json(&setup_payload("http://127.0.0.1:9/", 0, "10s"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let body: ErrorResponse = resp.json().await.unwrap();
        assert!(body.error.contains("rps"));

        let setups: Vec<SetupDto> = client
            .get(format!("{base}/api/setups"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(setups.is_empty());
    }

    #[tokio::test]
    async fn malformed_duration_is_rejected_with_400() {
        let base = spawn_app().await;
        let resp = reqwest::Client::new()
            .post(format!("{base}/api/setups"))
            .json(&setup_payload("http://127.0.0.1:9/", 10, "soon"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
    }

    #[tokio::test]
    async fn missing_setup_returns_404() {
        let base = spawn_app().await;
        let resp = reqwest::get(format!("{base}/api/setups/{}", Uuid::new_v4()))
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
    }

    #[tokio::test]
    async fn delete_setup_then_404() {
        let base = spawn_app().await;
        let client = reqwest::Client::new();

        let dto: SetupDto = client
            .post(format!("{base}/api/setups"))
            .json(&setup_payload("http://127.0.0.1:9/", 10, "1s"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        let resp = client
            .delete(format!("{base}/api/setups/{}", dto.id))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 204);

        let resp = client
            .delete(format!("{base}/api/setups/{}", dto.id))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn run_flow_reaches_completed_with_stats() {
        let base = spawn_app().await;
        let target = spawn_echo_target().await;
        let client = reqwest::Client::new();

        let setup: SetupDto = client
            .post(format!("{base}/api/setups"))
            .json(&setup_payload(&format!("http://{target}/ok"), 100, "500ms"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        let resp = client
            .post(format!("{base}/api/runs"))
            .json(&json!({ "setup_id": setup.id }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
        let run: RunDto = resp.json().await.unwrap();
        assert_eq!(run.status, RunStatus::Pending);

        let finished = wait_for_status(&client, &base, &run.id.to_string(), "completed").await;
        let stats = finished.stats.expect("completed run has stats");
        assert!(stats.total > 0);
        assert_eq!(stats.success, stats.total);
        assert_eq!(stats.status_codes.get(&200), Some(&stats.total));
        assert!(stats.avg_latency > 0.0);
        assert!(finished.ended_at.is_some());

        // The filter returns the run; an unknown setup id returns none.
        let runs: Vec<RunDto> = client
            .get(format!("{base}/api/runs?setup_id={}", setup.id))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(runs.len(), 1);

        let runs: Vec<RunDto> = client
            .get(format!("{base}/api/runs?setup_id={}", Uuid::new_v4()))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(runs.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn run_against_erroring_target_completes_with_failures() {
        let base = spawn_app().await;
        let target = spawn_echo_target().await;
        let client = reqwest::Client::new();

        let setup: SetupDto = client
            .post(format!("{base}/api/setups"))
            .json(&setup_payload(&format!("http://{target}/fail"), 50, "400ms"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        let run: RunDto = client
            .post(format!("{base}/api/runs"))
            .json(&json!({ "setup_id": setup.id }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        let finished = wait_for_status(&client, &base, &run.id.to_string(), "completed").await;
        let stats = finished.stats.unwrap();
        assert_eq!(stats.success, 0);
        assert_eq!(stats.failed, stats.total);
        assert_eq!(stats.status_codes.get(&500), Some(&stats.total));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn cancel_flow_returns_204_then_400() {
        let base = spawn_app().await;
        let target = spawn_echo_target().await;
        let client = reqwest::Client::new();

        let setup: SetupDto = client
            .post(format!("{base}/api/setups"))
            .json(&setup_payload(&format!("http://{target}/ok"), 20, "10s"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        let run: RunDto = client
            .post(format!("{base}/api/runs"))
            .json(&json!({ "setup_id": setup.id }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;

        let resp = client
            .post(format!("{base}/api/runs/{}/cancel", run.id))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 204);

        wait_for_status(&client, &base, &run.id.to_string(), "cancelled").await;

        let resp = client
            .post(format!("{base}/api/runs/{}/cancel", run.id))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn stats_endpoint_serves_live_then_final_snapshots() {
        let base = spawn_app().await;
        let target = spawn_echo_target().await;
        let client = reqwest::Client::new();

        let setup: SetupDto = client
            .post(format!("{base}/api/setups"))
            .json(&setup_payload(&format!("http://{target}/ok"), 50, "2s"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        let run: RunDto = client
            .post(format!("{base}/api/runs"))
            .json(&json!({ "setup_id": setup.id }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        // A live snapshot appears once results start flowing.
        let live = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let stats: Option<RunStats> = client
                    .get(format!("{base}/api/runs/{}/stats", run.id))
                    .send()
                    .await
                    .unwrap()
                    .json()
                    .await
                    .unwrap();
                if let Some(stats) = stats {
                    if stats.total > 0 {
                        return stats;
                    }
                }
                tokio::time::sleep(Duration::from_millis(25)).await;
            }
        })
        .await
        .expect("no live stats observed");
        assert!(live.total > 0);

        let finished = wait_for_status(&client, &base, &run.id.to_string(), "completed").await;
        let final_stats: Option<RunStats> = client
            .get(format!("{base}/api/runs/{}/stats", run.id))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let final_stats = final_stats.expect("terminal snapshot stored");
        assert_eq!(Some(&final_stats), finished.stats.as_ref());
        assert!(final_stats.total >= live.total);
    }

    #[tokio::test]
    async fn stats_for_unknown_run_returns_404() {
        let base = spawn_app().await;
        let resp = reqwest::get(format!("{base}/api/runs/{}/stats", Uuid::new_v4()))
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
    }

    #[tokio::test]
    async fn starting_a_run_for_missing_setup_returns_404() {
        let base = spawn_app().await;
        let resp = reqwest::Client::new()
            .post(format!("{base}/api/runs"))
            .json(&json!({ "setup_id": Uuid::new_v4() }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
    }
}
