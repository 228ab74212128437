use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::config;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
}

impl AppState {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

/// Assemble the full router
pub fn app(state: AppState) -> Router {
    let cfg = config();
    // Multipart bodies carry a whole image batch, so the limit covers the
    // batch plus form overhead
    let body_limit = cfg.uploads.max_file_bytes * cfg.uploads.max_files + 1024 * 1024;

    Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        // API surface
        .nest("/api", api_routes())
        // Stored product images
        .nest_service("/uploads", ServeDir::new(&cfg.uploads.dir))
        // Global middleware
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Serve on an already-bound listener. Split from [`app`] so tests can drive
/// a real socket.
pub async fn serve(listener: tokio::net::TcpListener, state: AppState) -> std::io::Result<()> {
    axum::serve(listener, app(state)).await
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(auth_routes())
        .merge(product_routes())
        .merge(category_routes())
        .merge(payment_routes())
        .merge(message_routes())
        .merge(user_routes())
}

fn auth_routes() -> Router<AppState> {
    use crate::handlers::auth;
    use axum::routing::{post, put};

    Router::new()
        // Account creation and token acquisition
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        // Own-account management
        .route("/auth/profile", get(auth::profile).put(auth::update_profile))
        .route("/auth/password", put(auth::change_password))
}

fn product_routes() -> Router<AppState> {
    use crate::handlers::products;
    use axum::routing::post;

    Router::new()
        .route("/products", get(products::list).post(products::create))
        // Static segment must sit beside the :id capture
        .route("/products/my", get(products::my_products))
        .route(
            "/products/:id",
            get(products::detail).put(products::update).delete(products::remove),
        )
        .route("/products/:id/favorite", post(products::toggle_favorite))
}

fn category_routes() -> Router<AppState> {
    use crate::handlers::categories;

    Router::new()
        .route("/categories", get(categories::list).post(categories::create))
        .route(
            "/categories/:id",
            get(categories::detail).put(categories::update).delete(categories::remove),
        )
}

fn payment_routes() -> Router<AppState> {
    use crate::handlers::payments;
    use axum::routing::post;

    Router::new()
        .route("/payments", get(payments::list).post(payments::process))
        .route("/payments/:id", get(payments::detail))
        .route("/payments/:id/cancel", post(payments::cancel))
}

fn message_routes() -> Router<AppState> {
    use crate::handlers::messages;
    use axum::routing::{delete, post, put};

    Router::new()
        .route("/messages", post(messages::send))
        .route("/messages/conversations", get(messages::conversations))
        .route("/messages/conversation/:user_id", get(messages::thread))
        .route("/messages/unread-count", get(messages::unread_count))
        .route("/messages/:id/read", put(messages::mark_read))
        .route("/messages/:id", delete(messages::remove))
}

fn user_routes() -> Router<AppState> {
    use crate::handlers::users;
    use axum::routing::put;

    Router::new()
        .route("/users", get(users::list))
        .route("/users/favorites", get(users::favorites))
        .route("/users/:id", get(users::public_profile).delete(users::remove))
        .route("/users/:id/products", get(users::user_products))
        .route("/users/:id/role", put(users::change_role))
        .route("/users/:id/verify", put(users::verify))
}

async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "Soko API",
            "version": version,
            "description": "REST backend for the Soko secondhand goods marketplace",
            "endpoints": {
                "auth": "/api/auth/* (register, login, profile, password)",
                "products": "/api/products[/:id] (browse public, manage with token)",
                "categories": "/api/categories[/:id] (browse public, manage as admin)",
                "payments": "/api/payments[/:id] (protected)",
                "messages": "/api/messages/* (protected)",
                "users": "/api/users/* (profiles public, admin tools protected)",
                "uploads": "/uploads/products/* (public, static)",
            }
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {"status": "ok", "timestamp": now, "database": "ok"}
            })),
        ),
        Err(e) => {
            tracing::warn!("health check database probe failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "database unavailable",
                    "data": {"status": "degraded", "timestamp": now}
                })),
            )
        }
    }
}
