/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use martialbase_api::{app::AppState, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let state = AppState::new(pool, config);
/// let app = martialbase_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, middleware::security::SecurityHeadersLayer, routes};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post, put},
    Router,
};
use martialbase_shared::auth::middleware::{identity_auth_middleware, IdentityAuthState};
use sqlx::PgPool;
use std::sync::Arc;
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

    /// State for the identity middleware
    pub fn identity_state(&self) -> IdentityAuthState {
        IdentityAuthState::new(
            self.db.clone(),
            &self.config.identity.secret,
            &self.config.identity.issuer,
        )
    }
}

/// Builds the complete router
///
/// ```text
/// /
/// ├── GET /health                                  (public)
/// └── /v1                                          (bearer identity token)
///     ├── /organisations                           GET, POST
///     │   └── /:id                                 GET, PUT, DELETE
///     │       ├── /parent                          PUT, DELETE
///     │       ├── /ancestors, /children            GET
///     │       ├── /schools                         GET
///     │       └── /people                          GET, POST
///     │           └── /:person_id                  POST ?is_admin=, DELETE
///     │               └── /demote                  POST
///     ├── /schools                                 POST
///     │   └── /:id                                 GET, PUT, DELETE
///     │       ├── /head-instructor                 PUT
///     │       └── /students                        GET, POST
///     │           └── /:person_id                  POST ?is_instructor=&is_secretary=, DELETE
///     │               └── /documents               PUT
///     ├── /people/:id                              GET, PUT
///     │   └── /documents                           GET, POST
///     │       └── /:document_id                    DELETE
///     ├── /users/me                                GET
///     ├── /users/claim                             POST
///     ├── /users/:id/roles                         PUT
///     ├── /roles, /arts, /document-types           GET
/// ```
///
/// # Middleware Stack
///
/// Outermost first: security headers, CORS, compression, tracing; the
/// identity layer wraps `/v1` only.
pub fn build_router(state: AppState) -> Router {
    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let organisation_routes = Router::new()
        .route(
            "/",
            get(routes::organisations::list_organisations)
                .post(routes::organisations::create_organisation),
        )
        .route(
            "/:id",
            get(routes::organisations::get_organisation)
                .put(routes::organisations::update_organisation)
                .delete(routes::organisations::delete_organisation),
        )
        .route(
            "/:id/parent",
            put(routes::organisations::change_parent).delete(routes::organisations::remove_parent),
        )
        .route("/:id/ancestors", get(routes::organisations::ancestors))
        .route("/:id/children", get(routes::organisations::children))
        .route("/:id/schools", get(routes::schools::list_organisation_schools))
        .route(
            "/:id/people",
            get(routes::organisations::list_people).post(routes::organisations::add_new_person),
        )
        .route(
            "/:id/people/:person_id",
            post(routes::organisations::add_existing_person)
                .delete(routes::organisations::remove_person),
        )
        .route(
            "/:id/people/:person_id/demote",
            post(routes::organisations::demote_admin),
        );

    let school_routes = Router::new()
        .route("/", post(routes::schools::create_school))
        .route(
            "/:id",
            get(routes::schools::get_school)
                .put(routes::schools::update_school)
                .delete(routes::schools::delete_school),
        )
        .route(
            "/:id/head-instructor",
            put(routes::schools::change_head_instructor),
        )
        .route(
            "/:id/students",
            get(routes::schools::list_students).post(routes::schools::add_new_student),
        )
        .route(
            "/:id/students/:person_id",
            post(routes::schools::add_existing_student).delete(routes::schools::remove_student),
        )
        .route(
            "/:id/students/:person_id/documents",
            put(routes::schools::set_student_documents),
        );

    let people_routes = Router::new()
        .route(
            "/:id",
            get(routes::people::get_person).put(routes::people::update_person),
        )
        .route(
            "/:id/documents",
            get(routes::people::list_documents).post(routes::people::add_document),
        )
        .route(
            "/:id/documents/:document_id",
            axum::routing::delete(routes::people::remove_document),
        );

    let user_routes = Router::new()
        .route("/me", get(routes::users::current_user))
        .route("/claim", post(routes::users::claim_invitation))
        .route("/:id/roles", put(routes::users::replace_roles));

    let v1_routes = Router::new()
        .nest("/organisations", organisation_routes)
        .nest("/schools", school_routes)
        .nest("/people", people_routes)
        .nest("/users", user_routes)
        .route("/roles", get(routes::users::list_roles))
        .route("/arts", get(routes::catalogue::list_arts))
        .route("/document-types", get(routes::catalogue::list_document_types))
        .layer(axum::middleware::from_fn_with_state(
            state.identity_state(),
            identity_auth_middleware,
        ));

    let cors = if state.config.allows_any_origin() && !state.config.api.production {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter(|origin| origin.as_str() != "*")
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
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}
