use sqlx::{migrate::MigrateError, postgres::PgPoolOptions, Pool, Postgres};

pub type Database = Pool<Postgres>;

pub async fn create_database_pool(database_url: &str) -> Result<Database, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    // Test the connection
    sqlx::query("SELECT 1")
        .execute(&pool)
        .await?;

    log::info!("Connected to database successfully");
    Ok(pool)
}

pub async fn run_migrations(pool: &Database) -> Result<(), MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    log::info!("Database migrations are up to date");
    Ok(())
}
