use axum::{
    Json, Router,
    http::{
        HeaderName, HeaderValue, Method, StatusCode,
        header::{ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, CONTENT_TYPE},
    },
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{MethodRouter, get, post},
};
use serde_json::{Value, json};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::middleware::{AUTH_TOKEN_HEADER, USER_ID_HEADER, require_admin};
use crate::state::AppState;
use crate::{admin, auth, groups, messages, users};

/// Build the HTTP surface. Paths are matched exactly, so `/groups`,
/// `/groups/join` and `/groups/members` never shadow one another.
/// `base_path` ("" or e.g. "/api") prefixes every route.
pub fn router(state: AppState, base_path: &str) -> Router {
    let api = Router::new()
        .route("/register", endpoint(post(auth::register)))
        .route("/login", endpoint(post(auth::login)))
        .route("/users", endpoint(get(users::search_users)))
        .route(
            "/groups",
            endpoint(get(groups::list_groups).post(groups::create_group)),
        )
        .route("/groups/join", endpoint(post(groups::join_group)))
        .route("/groups/members", endpoint(get(groups::list_members)))
        .route(
            "/messages",
            endpoint(get(messages::list_messages).post(messages::send_message)),
        )
        .route(
            "/admin/chats",
            endpoint(
                get(admin::admin_chats)
                    .route_layer(from_fn_with_state(state.clone(), require_admin)),
            ),
        )
        .route("/health", endpoint(get(health)))
        .fallback(fallback)
        .with_state(state);

    let app = match base_path.trim_end_matches('/') {
        "" => api,
        prefix => Router::new().nest(prefix, api).fallback(fallback),
    };

    app.layer(cors())
        .layer(SetResponseHeaderLayer::if_not_present(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOWED_HEADERS),
        ))
        .layer(TraceLayer::new_for_http())
}

/// A path we serve hit with a method we don't: same answer as an unknown path.
fn endpoint(route: MethodRouter<AppState>) -> MethodRouter<AppState> {
    route.fallback(fallback)
}

/// OPTIONS gets an empty 200; everything else is a 404. With the CORS layer
/// in front, OPTIONS is normally answered before it gets here.
async fn fallback(method: Method) -> Response {
    if method == Method::OPTIONS {
        return StatusCode::OK.into_response();
    }
    ApiError::NotFound.into_response()
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

// CorsLayer only lists methods and headers on preflights; every response
// carries them.
const ALLOWED_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
const ALLOWED_HEADERS: &str = "Content-Type, X-User-Id, X-Auth-Token";

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            CONTENT_TYPE,
            HeaderName::from_static(USER_ID_HEADER),
            HeaderName::from_static(AUTH_TOKEN_HEADER),
        ])
        .allow_credentials(false)
}
