pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod filters;
pub mod handlers;
pub mod identity;
pub mod middleware;
pub mod models;
pub mod seed;
pub mod state;
pub mod store;
pub mod utils;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_cookies::CookieManagerLayer;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

pub use state::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Public pages
        .route("/", get(handlers::catalog::welcome))
        .route("/categories/:id", get(handlers::catalog::category))
        .route("/login", get(handlers::auth::login_page).post(handlers::auth::login))
        .route("/register", get(handlers::auth::register_page).post(handlers::auth::register))
        .route("/logout", post(handlers::auth::logout))

        // External identity login
        .route("/firebase-login", post(handlers::firebase::firebase_login))
        .route("/auth/firebase", post(handlers::firebase::firebase_login))

        // Authenticated routes
        .route("/dashboard", get(handlers::dashboard::dashboard))
        .route(
            "/profile",
            get(handlers::profile::show)
                .patch(handlers::profile::update)
                .delete(handlers::profile::destroy),
        )

        // Invitations (admin only, except the public code check)
        .route(
            "/invitations",
            get(handlers::invitations::index).post(handlers::invitations::store),
        )
        .route("/invitations/:id", delete(handlers::invitations::destroy))
        .route("/invite/:code", get(handlers::invitations::check))

        // Static files
        .nest_service("/static", ServeDir::new("static"))

        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CookieManagerLayer::new())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(1024 * 1024)),
        )
        .with_state(state)
}
