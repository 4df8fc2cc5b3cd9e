use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use dicta_core::domain::execution::{ExecutionId, ExecutionStatus, FlowExecution, Intent};

use super::{ExecutionRepository, RepositoryError};
use crate::DbPool;

pub struct SqlExecutionRepository {
    pool: DbPool,
}

impl SqlExecutionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ExecutionRepository for SqlExecutionRepository {
    async fn find_by_id(
        &self,
        id: &ExecutionId,
    ) -> Result<Option<FlowExecution>, RepositoryError> {
        let row = sqlx::query(
            "SELECT
                id,
                intent,
                params_json,
                source_text,
                status,
                result_json,
                error,
                created_at,
                updated_at
             FROM flow_execution
             WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(execution_from_row).transpose()
    }

    async fn save(&self, execution: FlowExecution) -> Result<(), RepositoryError> {
        let params_json = serde_json::to_string(&execution.params)
            .map_err(|error| RepositoryError::Decode(format!("unencodable params: {error}")))?;
        let result_json = execution
            .result
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|error| RepositoryError::Decode(format!("unencodable result: {error}")))?;

        sqlx::query(
            "INSERT INTO flow_execution (
                id,
                intent,
                params_json,
                source_text,
                status,
                result_json,
                error,
                created_at,
                updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                intent = excluded.intent,
                params_json = excluded.params_json,
                source_text = excluded.source_text,
                status = excluded.status,
                result_json = excluded.result_json,
                error = excluded.error,
                updated_at = excluded.updated_at",
        )
        .bind(&execution.id.0)
        .bind(execution.intent.as_str())
        .bind(&params_json)
        .bind(&execution.source_text)
        .bind(execution.status.as_str())
        .bind(result_json.as_deref())
        .bind(execution.error.as_deref())
        .bind(execution.created_at.to_rfc3339())
        .bind(execution.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn execution_from_row(row: SqliteRow) -> Result<FlowExecution, RepositoryError> {
    let intent_raw = row.try_get::<String, _>("intent")?;
    let intent = Intent::parse(&intent_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown intent `{intent_raw}`")))?;

    let status_raw = row.try_get::<String, _>("status")?;
    let status = ExecutionStatus::parse(&status_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown execution status `{status_raw}`"))
    })?;

    let params_raw = row.try_get::<String, _>("params_json")?;
    let params = serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(&params_raw)
        .map_err(|error| RepositoryError::Decode(format!("invalid params_json: {error}")))?;

    let result = row
        .try_get::<Option<String>, _>("result_json")?
        .map(|raw| serde_json::from_str::<serde_json::Value>(&raw))
        .transpose()
        .map_err(|error| RepositoryError::Decode(format!("invalid result_json: {error}")))?;

    Ok(FlowExecution {
        id: ExecutionId(row.try_get("id")?),
        intent,
        params,
        source_text: row.try_get("source_text")?,
        status,
        result,
        error: row.try_get("error")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}

fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use dicta_core::domain::execution::{ExecutionId, ExecutionStatus, Intent};
    use dicta_core::engine::FlowEngine;

    use super::SqlExecutionRepository;
    use crate::repositories::{ExecutionRepository, RepositoryError};
    use crate::{connect_with_settings, migrations};

    async fn setup_repo() -> SqlExecutionRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlExecutionRepository::new(pool)
    }

    fn whatsapp_params() -> serde_json::Map<String, serde_json::Value> {
        let mut params = serde_json::Map::new();
        params.insert("contact".to_string(), json!("Peter"));
        params.insert("bericht".to_string(), json!("ik kom later"));
        params
    }

    #[tokio::test]
    async fn save_then_find_round_trips_a_new_execution() {
        let repo = setup_repo().await;
        let execution =
            FlowEngine::new().create_execution(Intent::Whatsapp, whatsapp_params(), "app Peter");

        repo.save(execution.clone()).await.expect("save");
        let found = repo.find_by_id(&execution.id).await.expect("find");

        assert_eq!(found, Some(execution));
    }

    #[tokio::test]
    async fn upsert_overwrites_status_and_outcome() {
        let repo = setup_repo().await;
        let engine = FlowEngine::new();
        let execution = engine.create_execution(Intent::Whatsapp, whatsapp_params(), "app Peter");
        repo.save(execution.clone()).await.expect("save pending");

        let running = engine.begin(execution).expect("begin");
        repo.save(running.clone()).await.expect("save running");

        let done = engine.complete(running, json!({"delivered": true})).expect("complete");
        repo.save(done.clone()).await.expect("save success");

        let found = repo.find_by_id(&done.id).await.expect("find").expect("present");
        assert_eq!(found.status, ExecutionStatus::Success);
        assert_eq!(found.result, Some(json!({"delivered": true})));
        assert!(found.error.is_none());
        assert_eq!(found.created_at, done.created_at);
    }

    #[tokio::test]
    async fn find_missing_returns_none() {
        let repo = setup_repo().await;

        let found =
            repo.find_by_id(&ExecutionId("does-not-exist".to_string())).await.expect("find");

        assert_eq!(found, None);
    }

    #[tokio::test]
    async fn repeated_reads_observe_the_same_snapshot() {
        let repo = setup_repo().await;
        let execution = FlowEngine::new().create_execution(
            Intent::Aantekening,
            serde_json::Map::new(),
            "melk kopen",
        );
        repo.save(execution.clone()).await.expect("save");

        let first = repo.find_by_id(&execution.id).await.expect("first read");
        let second = repo.find_by_id(&execution.id).await.expect("second read");

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn drifted_intent_column_surfaces_as_decode_error() {
        let repo = setup_repo().await;
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO flow_execution (
                id, intent, params_json, source_text, status, created_at, updated_at
             ) VALUES ('X-1', 'email', '{}', 'mail iets', 'pending', ?, ?)",
        )
        .bind(&now)
        .bind(&now)
        .execute(&repo.pool)
        .await
        .expect("seed drifted row");

        let error = repo
            .find_by_id(&ExecutionId("X-1".to_string()))
            .await
            .expect_err("decode must fail");

        assert!(matches!(
            error,
            RepositoryError::Decode(ref message) if message.contains("email")
        ));
    }
}
