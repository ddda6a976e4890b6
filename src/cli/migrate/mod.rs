//! Migrate command - applies the embedded schema and exits

use tracing::info;

use crate::infrastructure::database::{run_migrations, ConnectionProvider, PostgresProvider};

pub async fn run() -> anyhow::Result<()> {
    let config = super::bootstrap()?;

    let provider = PostgresProvider::new(&config.database)?;
    let pool = provider.acquire().await?;

    let result = run_migrations(&pool).await;
    provider.close().await?;
    result?;

    info!("Migrations complete");

    Ok(())
}
