use crate::config::Config;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};

use super::create_schema;

pub type DbPool = DatabaseConnection;

pub async fn create_pool(config: &Config) -> Result<DbPool, anyhow::Error> {
    let url = config.database_url();
    let mut options = ConnectOptions::new(url);
    options
        .max_connections(config.database.max_connections)
        .sqlx_logging(false);

    let db = Database::connect(options).await?;
    create_schema(&db).await?;

    log::info!("Database schema ready ({:?})", db.get_database_backend());
    Ok(db)
}
