//! Command line entry points: the web server plus the maintenance commands.

use std::{env, sync::Arc};

use clap::{Parser, Subcommand};
use sqlx::migrate::MigrateError;

use crate::{
    config::{Config, ConfigError},
    create_router,
    database::{create_database_pool, run_migrations},
    identity::{DisabledVerifier, FirebaseVerifier, IdentityVerifier},
    models::{catalog::CatalogError, rbac::ADMIN, Catalog},
    seed::seed_roles_and_permissions,
    state::AppState,
    store::{MemoryStore, PgStore, RoleStore, Store, StoreError, UserStore},
};

#[derive(Debug, Parser)]
#[command(name = "halluapp", version, about = "Halluapp web server and maintenance commands")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the HTTP server
    Serve {
        /// Keep all data in process memory instead of Postgres
        #[arg(long)]
        in_memory: bool,
    },
    /// Grant the admin role to an existing user
    #[command(name = "user:make-admin")]
    MakeAdmin {
        /// Email address of the user to promote
        email: String,
    },
    /// Apply pending database migrations
    #[command(name = "db:migrate")]
    Migrate,
    /// Create the built-in roles and permissions
    #[command(name = "db:seed")]
    Seed,
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration failed: {0}")]
    Migrate(#[from] MigrateError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to load category catalog: {0}")]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    MakeAdmin(#[from] MakeAdminError),
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum MakeAdminError {
    #[error("User with email {0} not found.")]
    UserNotFound(String),
    #[error("Admin role not found. Please run db:seed first.")]
    AdminRoleMissing,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Promotes the user with `email` to admin. Promoting an existing admin is a no-op.
pub async fn make_admin<S>(store: &S, email: &str) -> Result<String, MakeAdminError>
where
    S: UserStore + RoleStore + ?Sized,
{
    let user = store
        .find_user_by_email(email)
        .await?
        .ok_or_else(|| MakeAdminError::UserNotFound(email.to_string()))?;

    let role = store
        .find_role_by_slug(ADMIN)
        .await?
        .ok_or(MakeAdminError::AdminRoleMissing)?;

    if store.attach_role(user.id, role.id).await? {
        log::info!("User {} promoted to admin", user.id);
        Ok(format!("Successfully made {} an admin.", email))
    } else {
        Ok(format!("User {} is already an admin.", email))
    }
}

impl Cli {
    pub async fn execute(self) -> Result<(), CliError> {
        match self.command {
            Command::Serve { in_memory } => serve(in_memory).await,
            Command::MakeAdmin { email } => {
                let store = connect().await?;
                let message = make_admin(&store, &email).await?;
                println!("{}", message);
                Ok(())
            }
            Command::Migrate => {
                let store = connect().await?;
                run_migrations(store.pool()).await?;
                println!("Migrations applied.");
                Ok(())
            }
            Command::Seed => {
                let store = connect().await?;
                let summary = seed_roles_and_permissions(&store).await?;
                println!(
                    "Seeded {} roles and {} permissions.",
                    summary.roles, summary.permissions
                );
                Ok(())
            }
        }
    }
}

async fn connect() -> Result<PgStore, CliError> {
    let database_url = env::var("DATABASE_URL")
        .ok()
        .filter(|url| !url.trim().is_empty())
        .ok_or(ConfigError::Missing("DATABASE_URL"))?;
    let pool = create_database_pool(&database_url).await?;
    Ok(PgStore::new(pool))
}

async fn serve(in_memory: bool) -> Result<(), CliError> {
    let config = Config::from_env()?;

    let store: Arc<dyn Store> = if in_memory {
        let store = MemoryStore::new();
        seed_roles_and_permissions(&store).await?;
        log::warn!("Running with the in-memory store; data is lost on shutdown");
        Arc::new(store)
    } else {
        let pool = create_database_pool(config.require_database_url()?).await?;
        run_migrations(&pool).await?;
        Arc::new(PgStore::new(pool))
    };

    let identity: Arc<dyn IdentityVerifier> = match &config.firebase_project_id {
        Some(project_id) => Arc::new(FirebaseVerifier::new(project_id.clone())),
        None => {
            log::warn!("FIREBASE_PROJECT_ID is not set; external login is disabled");
            Arc::new(DisabledVerifier)
        }
    };

    let catalog = match &config.catalog_path {
        Some(path) => Catalog::load(path).await?,
        None => Catalog::embedded()?,
    };

    let addr = format!("0.0.0.0:{}", config.port);
    let app = create_router(AppState::new(store, identity, catalog, config));

    log::info!("Halluapp server starting on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
