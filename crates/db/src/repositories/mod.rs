use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use dicta_core::domain::execution::{ExecutionId, FlowExecution};
use dicta_core::domain::news::{NewsArticle, NewsPreferences};

pub mod execution;
pub mod memory;
pub mod news;

pub use execution::SqlExecutionRepository;
pub use memory::{InMemoryExecutionRepository, InMemoryNewsRepository};
pub use news::SqlNewsRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Passive store for flow executions. Status transitions are decided by the
/// flow engine; `save` is an upsert that writes whatever record it is
/// handed, one atomic statement per call.
#[async_trait]
pub trait ExecutionRepository: Send + Sync {
    async fn find_by_id(&self, id: &ExecutionId)
        -> Result<Option<FlowExecution>, RepositoryError>;
    async fn save(&self, execution: FlowExecution) -> Result<(), RepositoryError>;
}

/// Store for ingested news articles and the single preferences row.
/// Duplicate detection is by URL; `save_preferences` is an upsert.
#[async_trait]
pub trait NewsRepository: Send + Sync {
    async fn insert_article(&self, article: NewsArticle) -> Result<(), RepositoryError>;
    async fn find_by_url(&self, url: &str) -> Result<Option<NewsArticle>, RepositoryError>;
    async fn created_since(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<NewsArticle>, RepositoryError>;
    async fn preferences(&self) -> Result<NewsPreferences, RepositoryError>;
    async fn save_preferences(&self, preferences: NewsPreferences)
        -> Result<(), RepositoryError>;
}
