use crate::commands::CommandResult;
use dicta_core::config::{AppConfig, LoadOptions};
use dicta_db::{connect_with_settings, migrations};

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "migrate",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "migrate",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.busy_timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        let before = migrations::applied_versions(&pool).await;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;
        let after = migrations::applied_versions(&pool).await;
        pool.close().await;

        let newly_applied: Vec<i64> =
            after.into_iter().filter(|version| !before.contains(version)).collect();
        Ok::<Vec<i64>, (&'static str, String, u8)>(newly_applied)
    });

    match result {
        Ok(newly_applied) if newly_applied.is_empty() => {
            CommandResult::success("migrate", "database schema is up to date")
        }
        Ok(newly_applied) => {
            let versions = newly_applied
                .iter()
                .map(|version| version.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            CommandResult::success(
                "migrate",
                format!("applied {} migration(s): {versions}", newly_applied.len()),
            )
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("migrate", error_class, message, exit_code)
        }
    }
}
