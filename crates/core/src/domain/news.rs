use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArticleId(pub String);

impl std::fmt::Display for ArticleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One ingested news article.
///
/// The automation backend feeds articles in after its RSS fetch; audio
/// rendering happens outside this core, so the audio path columns are read
/// here only to report readiness. Articles are keyed by URL for duplicate
/// detection and are never deleted by this core.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewsArticle {
    pub id: ArticleId,
    pub source: String,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub audio_piper: Option<String>,
    pub audio_parkiet: Option<String>,
    pub published_at: DateTime<Utc>,
    pub rendered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl NewsArticle {
    /// Mint a freshly ingested article: new identity, no audio yet.
    pub fn new(
        source: impl Into<String>,
        title: impl Into<String>,
        url: impl Into<String>,
        description: Option<String>,
        published_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ArticleId(Uuid::new_v4().to_string()),
            source: source.into(),
            title: title.into(),
            url: url.into(),
            description,
            audio_piper: None,
            audio_parkiet: None,
            published_at,
            rendered_at: None,
            created_at: Utc::now(),
        }
    }

    /// Best available audio engine, preferring the higher-quality render.
    pub fn audio_quality(&self) -> Option<&'static str> {
        if self.audio_parkiet.is_some() {
            Some("parkiet")
        } else if self.audio_piper.is_some() {
            Some("piper")
        } else {
            None
        }
    }

    pub fn audio_ready(&self) -> bool {
        self.audio_quality().is_some()
    }
}

/// The single row of news feed preferences.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsPreferences {
    pub feeds: Vec<String>,
    pub max_articles: u32,
    pub categories_exclude: Vec<String>,
}

impl Default for NewsPreferences {
    fn default() -> Self {
        Self {
            feeds: vec![
                "https://feeds.nos.nl/nosnieuwsalgemeen".to_string(),
                "https://www.nu.nl/rss/Algemeen".to_string(),
                "https://tweakers.net/feeds/mixed.xml".to_string(),
            ],
            max_articles: 20,
            categories_exclude: Vec::new(),
        }
    }
}
