/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use flagdeck_api::{app::{build_router, AppState}, config::Config};
/// use flagdeck_shared::store::memory::MemoryDatabase;
/// use std::sync::Arc;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let state = AppState::new(Arc::new(MemoryDatabase::new()), config);
/// let app = build_router(state);
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, error::ApiError, routes};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use flagdeck_shared::{
    auth::middleware::{authenticate, bearer_token},
    store::Database,
};
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned for each request via Axum's `State` extractor; both fields are
/// reference counted.
#[derive(Clone)]
pub struct AppState {
    /// Store backend every handler opens its unit of work on
    pub db: Arc<dyn Database>,

    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: Arc<dyn Database>, config: Config) -> Self {
        Self {
            db,
            config: Arc::new(config),
        }
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── GET /                           # Service banner (public)
/// ├── GET /health                     # Health check (public)
/// └── /api/v1/
///     ├── /auth/
///     │   ├── POST /signup            # public
///     │   ├── POST /token             # public, form body
///     │   ├── POST /login             # public, JSON body
///     │   └── GET  /me
///     ├── /users/                     # admin only
///     │   ├── GET    /
///     │   └── GET|PUT|DELETE /:id
///     ├── /projects/
///     │   ├── POST|GET /
///     │   └── GET|PUT|DELETE /:id
///     └── /feature-flags/
///         ├── POST|GET /
///         ├── GET /project/:project_id
///         └── GET|PUT|DELETE /:id
/// ```
///
/// Everything outside the public routes passes through `jwt_auth_layer`.
pub fn build_router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/signup", post(routes::auth::signup))
        .route("/token", post(routes::auth::token))
        .route("/login", post(routes::auth::login))
        .merge(
            Router::new()
                .route("/me", get(routes::auth::me))
                .route_layer(middleware::from_fn_with_state(
                    state.clone(),
                    jwt_auth_layer,
                )),
        );

    let user_routes = Router::new()
        .route("/", get(routes::users::list_users))
        .route(
            "/:user_id",
            get(routes::users::get_user)
                .put(routes::users::update_user)
                .delete(routes::users::delete_user),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_layer,
        ));

    let project_routes = Router::new()
        .route(
            "/",
            post(routes::projects::create_project).get(routes::projects::list_projects),
        )
        .route(
            "/:project_id",
            get(routes::projects::get_project)
                .put(routes::projects::update_project)
                .delete(routes::projects::delete_project),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_layer,
        ));

    let flag_routes = Router::new()
        .route(
            "/",
            post(routes::feature_flags::create_feature_flag)
                .get(routes::feature_flags::list_feature_flags),
        )
        .route(
            "/project/:project_id",
            get(routes::feature_flags::list_project_feature_flags),
        )
        .route(
            "/:flag_id",
            get(routes::feature_flags::get_feature_flag)
                .put(routes::feature_flags::update_feature_flag)
                .delete(routes::feature_flags::delete_feature_flag),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_layer,
        ));

    let v1_routes = Router::new()
        .nest("/auth", auth_routes)
        .nest("/users", user_routes)
        .nest("/projects", project_routes)
        .nest("/feature-flags", flag_routes);

    Router::new()
        .route("/", get(routes::health::root))
        .route("/health", get(routes::health::health_check))
        .nest("/api/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&state.config))
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
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}

/// JWT authentication middleware layer
///
/// Resolves the bearer token to a live, active user and injects
/// `AuthContext` into request extensions.
async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers())?.to_string();

    let auth_context = authenticate(state.db.as_ref(), &token, state.jwt_secret()).await?;

    req.extensions_mut().insert(auth_context);

    Ok(next.run(req).await)
}
