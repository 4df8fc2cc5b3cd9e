use chrono::{DateTime, Utc};
use dicta_core::domain::news::{ArticleId, NewsArticle, NewsPreferences};
use sqlx::{sqlite::SqliteRow, Row};

use super::{NewsRepository, RepositoryError};
use crate::DbPool;

pub struct SqlNewsRepository {
    pool: DbPool,
}

impl SqlNewsRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl NewsRepository for SqlNewsRepository {
    async fn insert_article(&self, article: NewsArticle) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO news_article (
                id,
                source,
                title,
                url,
                description,
                audio_piper,
                audio_parkiet,
                published_at,
                rendered_at,
                created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&article.id.0)
        .bind(&article.source)
        .bind(&article.title)
        .bind(&article.url)
        .bind(article.description.as_deref())
        .bind(article.audio_piper.as_deref())
        .bind(article.audio_parkiet.as_deref())
        .bind(article.published_at.to_rfc3339())
        .bind(article.rendered_at.map(|timestamp| timestamp.to_rfc3339()))
        .bind(article.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_url(&self, url: &str) -> Result<Option<NewsArticle>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM news_article WHERE url = ?")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;

        row.map(article_from_row).transpose()
    }

    async fn created_since(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<NewsArticle>, RepositoryError> {
        // RFC 3339 UTC timestamps order lexicographically.
        let rows = sqlx::query(
            "SELECT * FROM news_article WHERE created_at >= ? ORDER BY published_at DESC",
        )
        .bind(cutoff.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(article_from_row).collect()
    }

    async fn preferences(&self) -> Result<NewsPreferences, RepositoryError> {
        let row = sqlx::query(
            "SELECT feeds_json, max_articles, categories_exclude_json
             FROM news_preferences
             WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => preferences_from_row(row),
            None => Ok(NewsPreferences::default()),
        }
    }

    async fn save_preferences(
        &self,
        preferences: NewsPreferences,
    ) -> Result<(), RepositoryError> {
        let feeds_json = serde_json::to_string(&preferences.feeds)
            .map_err(|error| RepositoryError::Decode(format!("unencodable feeds: {error}")))?;
        let categories_json = serde_json::to_string(&preferences.categories_exclude)
            .map_err(|error| {
                RepositoryError::Decode(format!("unencodable categories: {error}"))
            })?;

        sqlx::query(
            "INSERT INTO news_preferences (id, feeds_json, max_articles, categories_exclude_json)
             VALUES (1, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                feeds_json = excluded.feeds_json,
                max_articles = excluded.max_articles,
                categories_exclude_json = excluded.categories_exclude_json",
        )
        .bind(&feeds_json)
        .bind(preferences.max_articles)
        .bind(&categories_json)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn article_from_row(row: SqliteRow) -> Result<NewsArticle, RepositoryError> {
    Ok(NewsArticle {
        id: ArticleId(row.try_get("id")?),
        source: row.try_get("source")?,
        title: row.try_get("title")?,
        url: row.try_get("url")?,
        description: row.try_get("description")?,
        audio_piper: row.try_get("audio_piper")?,
        audio_parkiet: row.try_get("audio_parkiet")?,
        published_at: parse_timestamp("published_at", row.try_get("published_at")?)?,
        rendered_at: row
            .try_get::<Option<String>, _>("rendered_at")?
            .map(|raw| parse_timestamp("rendered_at", raw))
            .transpose()?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}

fn preferences_from_row(row: SqliteRow) -> Result<NewsPreferences, RepositoryError> {
    let feeds_raw = row.try_get::<String, _>("feeds_json")?;
    let feeds = serde_json::from_str(&feeds_raw)
        .map_err(|error| RepositoryError::Decode(format!("invalid feeds_json: {error}")))?;

    let categories_raw = row.try_get::<String, _>("categories_exclude_json")?;
    let categories_exclude = serde_json::from_str(&categories_raw).map_err(|error| {
        RepositoryError::Decode(format!("invalid categories_exclude_json: {error}"))
    })?;

    Ok(NewsPreferences {
        feeds,
        max_articles: row.try_get::<i64, _>("max_articles")? as u32,
        categories_exclude,
    })
}

fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}
