use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use dicta_core::domain::execution::{ExecutionId, FlowExecution};
use dicta_core::domain::news::{NewsArticle, NewsPreferences};

use super::{ExecutionRepository, NewsRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryExecutionRepository {
    executions: RwLock<HashMap<String, FlowExecution>>,
}

#[async_trait::async_trait]
impl ExecutionRepository for InMemoryExecutionRepository {
    async fn find_by_id(
        &self,
        id: &ExecutionId,
    ) -> Result<Option<FlowExecution>, RepositoryError> {
        let executions = self.executions.read().await;
        Ok(executions.get(&id.0).cloned())
    }

    async fn save(&self, execution: FlowExecution) -> Result<(), RepositoryError> {
        let mut executions = self.executions.write().await;
        executions.insert(execution.id.0.clone(), execution);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryNewsRepository {
    articles: RwLock<Vec<NewsArticle>>,
    preferences: RwLock<Option<NewsPreferences>>,
}

#[async_trait::async_trait]
impl NewsRepository for InMemoryNewsRepository {
    async fn insert_article(&self, article: NewsArticle) -> Result<(), RepositoryError> {
        let mut articles = self.articles.write().await;
        if articles.iter().any(|existing| existing.url == article.url) {
            return Err(RepositoryError::Decode(format!(
                "duplicate article url: {}",
                article.url
            )));
        }
        articles.push(article);
        Ok(())
    }

    async fn find_by_url(&self, url: &str) -> Result<Option<NewsArticle>, RepositoryError> {
        let articles = self.articles.read().await;
        Ok(articles.iter().find(|article| article.url == url).cloned())
    }

    async fn created_since(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<NewsArticle>, RepositoryError> {
        let articles = self.articles.read().await;
        let mut recent: Vec<NewsArticle> = articles
            .iter()
            .filter(|article| article.created_at >= cutoff)
            .cloned()
            .collect();
        recent.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        Ok(recent)
    }

    async fn preferences(&self) -> Result<NewsPreferences, RepositoryError> {
        let preferences = self.preferences.read().await;
        Ok(preferences.clone().unwrap_or_default())
    }

    async fn save_preferences(
        &self,
        preferences: NewsPreferences,
    ) -> Result<(), RepositoryError> {
        let mut stored = self.preferences.write().await;
        *stored = Some(preferences);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use dicta_core::domain::execution::{ExecutionStatus, Intent};
    use dicta_core::engine::FlowEngine;

    use super::InMemoryExecutionRepository;
    use crate::repositories::ExecutionRepository;

    #[tokio::test]
    async fn in_memory_execution_repo_round_trip() {
        let repo = InMemoryExecutionRepository::default();
        let execution = FlowEngine::new().create_execution(
            Intent::Aantekening,
            serde_json::Map::new(),
            "melk kopen",
        );

        repo.save(execution.clone()).await.expect("save execution");
        let found = repo.find_by_id(&execution.id).await.expect("find execution");

        assert_eq!(found, Some(execution));
    }

    #[tokio::test]
    async fn in_memory_execution_repo_upserts_latest_state() {
        let repo = InMemoryExecutionRepository::default();
        let engine = FlowEngine::new();
        let execution =
            engine.create_execution(Intent::Aantekening, serde_json::Map::new(), "notitie");
        repo.save(execution.clone()).await.expect("save pending");

        let done = engine.complete(execution, json!({"saved": true})).expect("complete");
        repo.save(done.clone()).await.expect("save success");

        let found = repo.find_by_id(&done.id).await.expect("find").expect("present");
        assert_eq!(found.status, ExecutionStatus::Success);
        assert_eq!(found.result, Some(json!({"saved": true})));
    }
}
