/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use taskboard_api::{app::AppState, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let state = AppState::new(pool, config);
/// let app = taskboard_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, error::ApiError};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::{get, patch, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use taskboard_shared::auth::middleware::authenticate_bearer;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state, cloned into every handler
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: PgPool, config: Config) -> Self {
        Self {
            db,
            config: Arc::new(config),
        }
    }

    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete router
///
/// ```text
/// /
/// ├── GET  /health                                   (public)
/// ├── /auth/{register,login,refresh}                 (public)
/// ├── GET  /user
/// ├── /user/preferences[/:key]
/// ├── /dashboard/{stats,recent-tasks}
/// └── /projects
///     └── /:project
///         ├── backlog, stats, members
///         ├── tasks[/:task[/status|/move]]
///         └── tasks-search
/// ```
///
/// Everything except `/health` and `/auth` sits behind the JWT layer.
pub fn build_router(state: AppState) -> Router {
    use crate::routes::{auth, dashboard, health, members, preferences, projects, tasks};

    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh));

    let project_routes = Router::new()
        .route("/", get(projects::index).post(projects::store))
        .route(
            "/:project",
            get(projects::show).put(projects::update).delete(projects::destroy),
        )
        .route("/:project/backlog", get(projects::backlog).post(projects::add_to_backlog))
        .route("/:project/stats", get(projects::stats))
        .route("/:project/members", get(members::index).post(members::store))
        .route("/:project/tasks", get(tasks::index).post(tasks::store))
        .route(
            "/:project/tasks/:task",
            get(tasks::show).put(tasks::update).delete(tasks::destroy),
        )
        .route("/:project/tasks/:task/status", patch(tasks::update_status))
        .route("/:project/tasks/:task/move", patch(tasks::move_from_backlog))
        .route("/:project/tasks-search", get(tasks::search));

    let protected_routes = Router::new()
        .route("/user", get(auth::me))
        .route(
            "/user/preferences",
            get(preferences::index).post(preferences::store),
        )
        .route(
            "/user/preferences/:key",
            get(preferences::show)
                .put(preferences::update)
                .delete(preferences::destroy),
        )
        .route("/dashboard/stats", get(dashboard::stats))
        .route("/dashboard/recent-tasks", get(dashboard::recent_tasks))
        .nest("/projects", project_routes)
        .layer(axum::middleware::from_fn_with_state(state.clone(), jwt_auth_layer));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&state.config))
        .layer(CompressionLayer::new())
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.allows_any_origin() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}

/// Validates the bearer token and injects `AuthContext` into request extensions
async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth = authenticate_bearer(req.headers(), state.jwt_secret())?;
    req.extensions_mut().insert(auth);

    Ok(next.run(req).await)
}
