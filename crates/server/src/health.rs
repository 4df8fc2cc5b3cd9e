//! Parallel health aggregator over every downstream dependency.
//!
//! All probes fan out concurrently and are joined; one slow or failing
//! probe never delays or fails another. The response always carries the
//! full per-service breakdown next to the aggregate verdict.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use tracing::{error, warn};

use dicta_core::config::AppConfig;
use dicta_db::DbPool;

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
    client: reqwest::Client,
    targets: Vec<(&'static str, String)>,
    probe_timeout: Duration,
    slow_threshold: Duration,
}

impl HealthState {
    pub fn new(db_pool: DbPool, client: reqwest::Client, config: &AppConfig) -> Self {
        let base = |url: &str| url.trim_end_matches('/').to_string();
        Self {
            db_pool,
            client,
            targets: vec![
                ("stt", format!("{}/health", base(&config.speech.stt_base_url))),
                ("tts", format!("{}/health", base(&config.speech.tts_base_url))),
                ("ollama", format!("{}/api/tags", base(&config.llm.base_url))),
                ("n8n", format!("{}/healthz", base(&config.flows.n8n_base_url))),
            ],
            probe_timeout: Duration::from_secs(config.health.probe_timeout_secs),
            slow_threshold: Duration::from_secs(config.health.slow_threshold_secs),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Ok,
    Slow,
    Down,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ServiceHealth {
    pub status: ProbeStatus,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub services: BTreeMap<&'static str, ServiceHealth>,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn health(State(state): State<HealthState>) -> Json<HealthResponse> {
    let http_probes =
        join_all(state.targets.iter().map(|(name, url)| check_http(&state, name, url)));
    let (database, statuses) = tokio::join!(check_database(&state.db_pool), http_probes);

    let mut services = BTreeMap::new();
    services.insert("database", ServiceHealth { status: database });
    for ((name, _), status) in state.targets.iter().zip(statuses) {
        services.insert(*name, ServiceHealth { status });
    }

    let all_ok = services.values().all(|service| service.status == ProbeStatus::Ok);

    Json(HealthResponse {
        status: if all_ok { "ok" } else { "degraded" },
        services,
        checked_at: Utc::now().to_rfc3339(),
    })
}

async fn check_http(state: &HealthState, name: &str, url: &str) -> ProbeStatus {
    let started = Instant::now();
    let outcome = tokio::time::timeout(state.probe_timeout, state.client.get(url).send()).await;

    match outcome {
        Ok(Ok(response)) if response.status().is_success() => {
            let elapsed = started.elapsed();
            if elapsed > state.slow_threshold {
                warn!(
                    event_name = "health.probe.slow",
                    service = name,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "health probe exceeded slow threshold"
                );
                ProbeStatus::Slow
            } else {
                ProbeStatus::Ok
            }
        }
        Ok(Ok(response)) => {
            error!(
                event_name = "health.probe.failed",
                service = name,
                status = response.status().as_u16(),
                "health probe returned an unsuccessful status"
            );
            ProbeStatus::Down
        }
        Ok(Err(probe_error)) => {
            error!(
                event_name = "health.probe.failed",
                service = name,
                error = %probe_error,
                "health probe transport failure"
            );
            ProbeStatus::Down
        }
        Err(_) => {
            error!(
                event_name = "health.probe.timeout",
                service = name,
                timeout_ms = state.probe_timeout.as_millis() as u64,
                "health probe timed out"
            );
            ProbeStatus::Down
        }
    }
}

async fn check_database(pool: &DbPool) -> ProbeStatus {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await {
        Ok(_) => ProbeStatus::Ok,
        Err(probe_error) => {
            error!(
                event_name = "health.probe.failed",
                service = "database",
                error = %probe_error,
                "database probe failed"
            );
            ProbeStatus::Down
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::extract::State;
    use axum::Json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use dicta_db::connect_with_settings;

    use super::{health, HealthState, ProbeStatus};

    async fn mock_service(status: u16, delay: Duration) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(status).set_delay(delay))
            .mount(&server)
            .await;
        server
    }

    async fn state_with_targets(
        targets: Vec<(&'static str, String)>,
        probe_timeout: Duration,
        slow_threshold: Duration,
    ) -> HealthState {
        let db_pool =
            connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool should connect");
        HealthState {
            db_pool,
            client: reqwest::Client::new(),
            targets,
            probe_timeout,
            slow_threshold,
        }
    }

    #[tokio::test]
    async fn all_probes_healthy_aggregates_to_ok() {
        let stt = mock_service(200, Duration::ZERO).await;
        let n8n = mock_service(200, Duration::ZERO).await;
        let state = state_with_targets(
            vec![
                ("stt", format!("{}/health", stt.uri())),
                ("n8n", format!("{}/healthz", n8n.uri())),
            ],
            Duration::from_secs(2),
            Duration::from_secs(1),
        )
        .await;

        let Json(response) = health(State(state)).await;

        assert_eq!(response.status, "ok");
        assert_eq!(response.services["database"].status, ProbeStatus::Ok);
        assert_eq!(response.services["stt"].status, ProbeStatus::Ok);
        assert_eq!(response.services["n8n"].status, ProbeStatus::Ok);
        assert!(!response.checked_at.is_empty());
    }

    #[tokio::test]
    async fn one_failing_probe_degrades_the_aggregate_without_blocking_others() {
        let healthy = mock_service(200, Duration::ZERO).await;
        let broken = mock_service(500, Duration::ZERO).await;
        let state = state_with_targets(
            vec![
                ("stt", format!("{}/health", healthy.uri())),
                ("ollama", format!("{}/api/tags", broken.uri())),
            ],
            Duration::from_secs(2),
            Duration::from_secs(1),
        )
        .await;

        let Json(response) = health(State(state)).await;

        assert_eq!(response.status, "degraded");
        assert_eq!(response.services["stt"].status, ProbeStatus::Ok);
        assert_eq!(response.services["ollama"].status, ProbeStatus::Down);
        assert_eq!(response.services["database"].status, ProbeStatus::Ok);
    }

    #[tokio::test]
    async fn successful_but_slow_probe_reports_slow() {
        let sluggish = mock_service(200, Duration::from_millis(80)).await;
        let state = state_with_targets(
            vec![("tts", format!("{}/health", sluggish.uri()))],
            Duration::from_secs(2),
            Duration::from_millis(10),
        )
        .await;

        let Json(response) = health(State(state)).await;

        assert_eq!(response.services["tts"].status, ProbeStatus::Slow);
        assert_eq!(response.status, "degraded");
    }

    #[tokio::test]
    async fn probe_timeout_reports_down() {
        let stuck = mock_service(200, Duration::from_millis(500)).await;
        let state = state_with_targets(
            vec![("n8n", format!("{}/healthz", stuck.uri()))],
            Duration::from_millis(50),
            Duration::from_millis(10),
        )
        .await;

        let Json(response) = health(State(state)).await;

        assert_eq!(response.services["n8n"].status, ProbeStatus::Down);
        assert_eq!(response.status, "degraded");
    }

    #[tokio::test]
    async fn unreachable_target_reports_down() {
        // Bind an ephemeral port and release it so nothing listens there.
        let dead_url = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
            let port = listener.local_addr().expect("local addr").port();
            drop(listener);
            format!("http://127.0.0.1:{port}")
        };
        let state = state_with_targets(
            vec![("ollama", format!("{}/api/tags", dead_url))],
            Duration::from_secs(1),
            Duration::from_millis(500),
        )
        .await;

        let Json(response) = health(State(state)).await;

        assert_eq!(response.services["ollama"].status, ProbeStatus::Down);
    }

    #[tokio::test]
    async fn closed_database_pool_reports_down_while_http_probes_survive() {
        let healthy = mock_service(200, Duration::ZERO).await;
        let state = state_with_targets(
            vec![("stt", format!("{}/health", healthy.uri()))],
            Duration::from_secs(2),
            Duration::from_secs(1),
        )
        .await;
        state.db_pool.close().await;

        let Json(response) = health(State(state)).await;

        assert_eq!(response.status, "degraded");
        assert_eq!(response.services["database"].status, ProbeStatus::Down);
        assert_eq!(response.services["stt"].status, ProbeStatus::Ok);
    }

    #[tokio::test]
    async fn probe_path_matches_each_service_convention() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        let state = state_with_targets(
            vec![("ollama", format!("{}/api/tags", server.uri()))],
            Duration::from_secs(2),
            Duration::from_secs(1),
        )
        .await;

        let Json(response) = health(State(state)).await;

        assert_eq!(response.services["ollama"].status, ProbeStatus::Ok);
    }
}
