pub mod config;
pub mod domain;
pub mod engine;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use domain::execution::{
    Dispatch, ExecutionId, ExecutionStatus, FlowExecution, Intent, TEXT_PARAM,
};
pub use domain::news::{ArticleId, NewsArticle, NewsPreferences};
pub use engine::{FlowEngine, TransitionError};
