//! News routes: today's listing, article ingest, preferences, and the
//! refresh trigger.
//!
//! Articles arrive through `POST /api/news/ingest/article` after an external
//! RSS fetch; this service deduplicates by URL and serves back today's batch.
//! `POST /api/news/refresh` kicks the automation platform's fetch workflow
//! and is fire-and-wait: a single call, no retries.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

use dicta_core::config::FlowsConfig;
use dicta_core::domain::news::{NewsArticle, NewsPreferences};
use dicta_db::repositories::NewsRepository;
use dicta_http::{post_json, CallError};

use crate::api::{self, ApiError};

const REFRESH_WEBHOOK_PATH: &str = "/webhook/news-refresh";
const REFRESH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct NewsState {
    repository: Arc<dyn NewsRepository>,
    client: reqwest::Client,
    refresh_url: String,
}

impl NewsState {
    pub fn new(
        repository: Arc<dyn NewsRepository>,
        client: reqwest::Client,
        config: &FlowsConfig,
    ) -> Self {
        Self {
            repository,
            client,
            refresh_url: format!(
                "{}{REFRESH_WEBHOOK_PATH}",
                config.n8n_base_url.trim_end_matches('/')
            ),
        }
    }
}

pub fn router(state: NewsState) -> Router {
    Router::new()
        .route("/api/news/today", get(today))
        .route("/api/news/ingest/article", post(ingest_article))
        .route("/api/news/preferences", get(get_preferences))
        .route("/api/news/preferences", put(put_preferences))
        .route("/api/news/refresh", post(refresh))
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct ArticleView {
    pub id: String,
    pub source: String,
    pub title: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub audio_ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_quality: Option<&'static str>,
    pub published_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rendered_at: Option<DateTime<Utc>>,
}

impl From<NewsArticle> for ArticleView {
    fn from(article: NewsArticle) -> Self {
        Self {
            id: article.id.to_string(),
            audio_ready: article.audio_ready(),
            audio_quality: article.audio_quality(),
            source: article.source,
            title: article.title,
            url: article.url,
            description: article.description,
            published_at: article.published_at,
            rendered_at: article.rendered_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TodayResponse {
    pub date: String,
    pub articles: Vec<ArticleView>,
    pub total: usize,
    pub audio_ready_count: usize,
}

#[derive(Debug, Deserialize)]
pub struct IngestArticleRequest {
    pub source: String,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub description: Option<String>,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct IngestArticleResponse {
    pub id: String,
    pub duplicate: bool,
}

pub async fn today(
    State(state): State<NewsState>,
) -> Result<Json<TodayResponse>, (StatusCode, Json<ApiError>)> {
    let today = Utc::now().date_naive();
    let cutoff = today.and_time(NaiveTime::MIN).and_utc();

    let preferences = state.repository.preferences().await.map_err(api::storage_error)?;
    let mut articles = state.repository.created_since(cutoff).await.map_err(api::storage_error)?;
    articles.truncate(preferences.max_articles as usize);

    let audio_ready_count = articles.iter().filter(|article| article.audio_ready()).count();
    let views: Vec<ArticleView> = articles.into_iter().map(ArticleView::from).collect();

    Ok(Json(TodayResponse {
        date: today.to_string(),
        total: views.len(),
        audio_ready_count,
        articles: views,
    }))
}

pub async fn ingest_article(
    State(state): State<NewsState>,
    Json(request): Json<IngestArticleRequest>,
) -> Result<Json<IngestArticleResponse>, (StatusCode, Json<ApiError>)> {
    if request.url.trim().is_empty() {
        return Err(api::bad_request("Artikel-URL ontbreekt"));
    }

    if let Some(existing) =
        state.repository.find_by_url(&request.url).await.map_err(api::storage_error)?
    {
        info!(
            event_name = "news.ingest.duplicate",
            url = %request.url,
            article_id = %existing.id,
            "article already ingested"
        );
        return Ok(Json(IngestArticleResponse { id: existing.id.to_string(), duplicate: true }));
    }

    let article = NewsArticle::new(
        request.source,
        request.title,
        request.url,
        request.description,
        request.published_at,
    );
    state.repository.insert_article(article.clone()).await.map_err(api::storage_error)?;
    info!(
        event_name = "news.ingest.stored",
        article_id = %article.id,
        source = %article.source,
        "article ingested"
    );

    Ok(Json(IngestArticleResponse { id: article.id.to_string(), duplicate: false }))
}

pub async fn get_preferences(
    State(state): State<NewsState>,
) -> Result<Json<NewsPreferences>, (StatusCode, Json<ApiError>)> {
    let preferences = state.repository.preferences().await.map_err(api::storage_error)?;
    Ok(Json(preferences))
}

pub async fn put_preferences(
    State(state): State<NewsState>,
    Json(preferences): Json<NewsPreferences>,
) -> Result<Json<NewsPreferences>, (StatusCode, Json<ApiError>)> {
    if preferences.feeds.is_empty() {
        return Err(api::bad_request("Minstens één feed is vereist"));
    }

    state.repository.save_preferences(preferences.clone()).await.map_err(api::storage_error)?;
    info!(event_name = "news.preferences.updated", feeds = preferences.feeds.len(), "news preferences updated");
    Ok(Json(preferences))
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub status: String,
    pub message: String,
}

pub async fn refresh(
    State(state): State<NewsState>,
) -> Result<Json<RefreshResponse>, (StatusCode, Json<ApiError>)> {
    post_json(&state.client, &state.refresh_url, &json!({}), REFRESH_TIMEOUT)
        .await
        .map_err(refresh_error)?;

    info!(event_name = "news.refresh.triggered", "news refresh workflow triggered");
    Ok(Json(RefreshResponse {
        status: "ok".to_string(),
        message: "News refresh triggered".to_string(),
    }))
}

fn refresh_error(error: CallError) -> (StatusCode, Json<ApiError>) {
    match error {
        CallError::Transport { .. } => {
            error!(event_name = "news.refresh.unreachable", error = %error, "automation platform unreachable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiError { detail: "n8n niet beschikbaar".to_string() }),
            )
        }
        CallError::Status { .. } => {
            error!(event_name = "news.refresh.failed", error = %error, "news refresh webhook failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(ApiError { detail: "n8n webhook mislukt".to_string() }),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::Json;
    use chrono::{Duration, Utc};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use dicta_core::domain::news::{NewsArticle, NewsPreferences};
    use dicta_db::repositories::{InMemoryNewsRepository, NewsRepository};

    use super::{
        get_preferences, ingest_article, put_preferences, refresh, today, IngestArticleRequest,
        NewsState,
    };

    fn state_for(base_url: &str) -> NewsState {
        NewsState {
            repository: Arc::new(InMemoryNewsRepository::default()),
            client: reqwest::Client::new(),
            refresh_url: format!("{}/webhook/news-refresh", base_url.trim_end_matches('/')),
        }
    }

    fn ingest_request(url: &str) -> IngestArticleRequest {
        IngestArticleRequest {
            source: "nos".to_string(),
            title: "Kabinet presenteert begroting".to_string(),
            url: url.to_string(),
            description: Some("De hoofdlijnen van de miljoenennota".to_string()),
            published_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn ingested_article_shows_up_in_todays_listing() {
        let state = state_for("http://n8n.invalid");

        let Json(ingested) =
            ingest_article(State(state.clone()), Json(ingest_request("https://nos.nl/artikel/1")))
                .await
                .expect("ingest");
        assert!(!ingested.duplicate);

        let Json(listing) = today(State(state)).await.expect("today");

        assert_eq!(listing.total, 1);
        assert_eq!(listing.audio_ready_count, 0);
        assert_eq!(listing.articles[0].id, ingested.id);
        assert_eq!(listing.articles[0].url, "https://nos.nl/artikel/1");
        assert!(!listing.articles[0].audio_ready);
    }

    #[tokio::test]
    async fn reingesting_the_same_url_reports_the_existing_article() {
        let state = state_for("http://n8n.invalid");

        let Json(first) =
            ingest_article(State(state.clone()), Json(ingest_request("https://nos.nl/artikel/1")))
                .await
                .expect("first ingest");
        let Json(second) =
            ingest_article(State(state.clone()), Json(ingest_request("https://nos.nl/artikel/1")))
                .await
                .expect("second ingest");

        assert!(!first.duplicate);
        assert!(second.duplicate);
        assert_eq!(first.id, second.id);

        let Json(listing) = today(State(state)).await.expect("today");
        assert_eq!(listing.total, 1);
    }

    #[tokio::test]
    async fn ingest_without_url_is_rejected() {
        let state = state_for("http://n8n.invalid");

        let error = ingest_article(State(state), Json(ingest_request("  ")))
            .await
            .expect_err("must be rejected");

        assert_eq!(error.0, StatusCode::BAD_REQUEST);
        assert_eq!(error.1 .0.detail, "Artikel-URL ontbreekt");
    }

    #[tokio::test]
    async fn todays_listing_skips_older_days_and_orders_newest_first() {
        let state = state_for("http://n8n.invalid");
        let now = Utc::now();

        let mut stale =
            NewsArticle::new("nu", "Gisteren", "https://nu.nl/oud", None, now - Duration::days(1));
        stale.created_at = now - Duration::days(1);
        state.repository.insert_article(stale).await.expect("insert stale");

        let mut morning = NewsArticle::new(
            "nos",
            "Ochtendbericht",
            "https://nos.nl/ochtend",
            None,
            now - Duration::hours(6),
        );
        morning.audio_parkiet = Some("2026-08-28/ochtend_parkiet.mp3".to_string());
        state.repository.insert_article(morning).await.expect("insert morning");

        state
            .repository
            .insert_article(NewsArticle::new(
                "nos",
                "Middagbericht",
                "https://nos.nl/middag",
                None,
                now - Duration::hours(1),
            ))
            .await
            .expect("insert afternoon");

        let Json(listing) = today(State(state)).await.expect("today");

        assert_eq!(listing.total, 2);
        assert_eq!(listing.audio_ready_count, 1);
        assert_eq!(listing.articles[0].url, "https://nos.nl/middag");
        assert_eq!(listing.articles[1].url, "https://nos.nl/ochtend");
        assert_eq!(listing.articles[1].audio_quality, Some("parkiet"));
    }

    #[tokio::test]
    async fn todays_listing_is_capped_by_max_articles() {
        let state = state_for("http://n8n.invalid");
        state
            .repository
            .save_preferences(NewsPreferences { max_articles: 2, ..NewsPreferences::default() })
            .await
            .expect("save preferences");

        for index in 0..4 {
            state
                .repository
                .insert_article(NewsArticle::new(
                    "nos",
                    format!("Artikel {index}"),
                    format!("https://nos.nl/artikel/{index}"),
                    None,
                    Utc::now(),
                ))
                .await
                .expect("insert");
        }

        let Json(listing) = today(State(state)).await.expect("today");

        assert_eq!(listing.total, 2);
        assert_eq!(listing.articles.len(), 2);
    }

    #[tokio::test]
    async fn preferences_default_and_round_trip_through_update() {
        let state = state_for("http://n8n.invalid");

        let Json(defaults) = get_preferences(State(state.clone())).await.expect("defaults");
        assert_eq!(defaults, NewsPreferences::default());

        let updated = NewsPreferences {
            feeds: vec!["https://feeds.nos.nl/nosnieuwsalgemeen".to_string()],
            max_articles: 5,
            categories_exclude: vec!["sport".to_string()],
        };
        let Json(saved) =
            put_preferences(State(state.clone()), Json(updated.clone())).await.expect("save");
        assert_eq!(saved, updated);

        let Json(loaded) = get_preferences(State(state)).await.expect("reload");
        assert_eq!(loaded, updated);
    }

    #[tokio::test]
    async fn preferences_without_feeds_are_rejected() {
        let state = state_for("http://n8n.invalid");

        let error = put_preferences(
            State(state),
            Json(NewsPreferences { feeds: Vec::new(), ..NewsPreferences::default() }),
        )
        .await
        .expect_err("must be rejected");

        assert_eq!(error.0, StatusCode::BAD_REQUEST);
        assert_eq!(error.1 .0.detail, "Minstens één feed is vereist");
    }

    #[tokio::test]
    async fn refresh_triggers_the_workflow_webhook() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/webhook/news-refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;
        let state = state_for(&server.uri());

        let Json(response) = refresh(State(state)).await.expect("refresh");

        assert_eq!(response.status, "ok");
        assert_eq!(response.message, "News refresh triggered");
    }

    #[tokio::test]
    async fn refresh_against_unreachable_platform_is_service_unavailable() {
        // Bind an ephemeral port and release it so nothing listens there.
        let dead_url = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
            let port = listener.local_addr().expect("local addr").port();
            drop(listener);
            format!("http://127.0.0.1:{port}")
        };
        let state = state_for(&dead_url);

        let error = refresh(State(state)).await.expect_err("must fail");

        assert_eq!(error.0, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(error.1 .0.detail, "n8n niet beschikbaar");
    }

    #[tokio::test]
    async fn refresh_workflow_failure_is_a_bad_gateway() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/webhook/news-refresh"))
            .respond_with(ResponseTemplate::new(500).set_body_string("workflow crashed"))
            .expect(1)
            .mount(&server)
            .await;
        let state = state_for(&server.uri());

        let error = refresh(State(state)).await.expect_err("must fail");

        assert_eq!(error.0, StatusCode::BAD_GATEWAY);
        assert_eq!(error.1 .0.detail, "n8n webhook mislukt");
    }
}
