//! Request dispatch for the forum boundary.
//!
//! # Responsibility
//! - Resolve a protocol-neutral request to one core use case.
//! - Map every outcome, including failures, to a status and JSON body.
//!
//! # Invariants
//! - Each `ForumApi::handle` call opens its own connection.
//! - Mutating routes require an authenticated actor.
//! - Internal failures never leak details to the response body.

use crate::config::ApiConfig;
use crate::route::{resolve, Method, Route, RouteError};
use crate::view::{
    CountView, CreatePostBody, ErrorBody, NodeView, PageView, PostListView, RegisterUserBody,
    UpdatePostBody, UserView,
};
use calcforum_core::db::{open_db, DbError};
use calcforum_core::{
    ErrorKind, NewUser, PostRepoError, PostService, PostServiceError, SqlitePostRepository,
    SqliteUserRepository, UserId, UserRepoError, UserRepository,
};
use log::{error, info, warn};
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Instant;

pub const STATUS_OK: u16 = 200;
pub const STATUS_CREATED: u16 = 201;
pub const STATUS_NO_CONTENT: u16 = 204;
pub const STATUS_BAD_REQUEST: u16 = 400;
pub const STATUS_UNAUTHORIZED: u16 = 401;
pub const STATUS_FORBIDDEN: u16 = 403;
pub const STATUS_NOT_FOUND: u16 = 404;
pub const STATUS_METHOD_NOT_ALLOWED: u16 = 405;
pub const STATUS_CONFLICT: u16 = 409;
pub const STATUS_INTERNAL: u16 = 500;

const INTERNAL_MESSAGE: &str = "internal error";

/// Inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    /// Verb as received; unknown verbs answer 405.
    pub method: String,
    /// Path with optional `?page=N` query.
    pub path: String,
    /// Raw JSON body.
    pub body: Option<String>,
    /// Authenticated user id from the external auth layer.
    pub actor: Option<UserId>,
}

impl ApiRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            body: None,
            actor: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_actor(mut self, actor: UserId) -> Self {
        self.actor = Some(actor);
        self
    }
}

/// Outbound response. `body` is `None` only for 204.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Option<Value>,
}

impl ApiResponse {
    fn json(status: u16, body: &impl Serialize) -> Self {
        match serde_json::to_value(body) {
            Ok(value) => Self {
                status,
                body: Some(value),
            },
            Err(err) => {
                error!(
                    "event=api_encode module=api status=error error={}",
                    err
                );
                Self::error(STATUS_INTERNAL, ErrorKind::Internal.as_str(), INTERNAL_MESSAGE)
            }
        }
    }

    fn no_content() -> Self {
        Self {
            status: STATUS_NO_CONTENT,
            body: None,
        }
    }

    fn error(status: u16, kind: &str, message: impl Into<String>) -> Self {
        let body = ErrorBody {
            error: kind.to_string(),
            message: message.into(),
        };
        Self {
            status,
            body: serde_json::to_value(body).ok(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body rendered as compact JSON, empty for 204.
    pub fn body_text(&self) -> String {
        self.body
            .as_ref()
            .map(Value::to_string)
            .unwrap_or_default()
    }
}

/// Failures surfaced at the boundary.
#[derive(Debug)]
enum ApiError {
    Route(RouteError),
    UnknownMethod(String),
    Unauthenticated,
    BadBody(String),
    Service(PostServiceError),
    Users(UserRepoError),
    Store(PostRepoError),
    Db(DbError),
}

impl ApiError {
    fn into_response(self) -> ApiResponse {
        match self {
            Self::Route(RouteError::NotFound) => {
                ApiResponse::error(STATUS_NOT_FOUND, "not_found", RouteError::NotFound.to_string())
            }
            Self::Route(RouteError::MethodNotAllowed) => ApiResponse::error(
                STATUS_METHOD_NOT_ALLOWED,
                "method_not_allowed",
                RouteError::MethodNotAllowed.to_string(),
            ),
            Self::Route(err @ RouteError::InvalidQuery(_)) => {
                ApiResponse::error(STATUS_BAD_REQUEST, "bad_request", err.to_string())
            }
            Self::UnknownMethod(method) => ApiResponse::error(
                STATUS_METHOD_NOT_ALLOWED,
                "method_not_allowed",
                format!("unsupported method `{method}`"),
            ),
            Self::Unauthenticated => ApiResponse::error(
                STATUS_UNAUTHORIZED,
                "unauthenticated",
                "an authenticated actor is required",
            ),
            Self::BadBody(message) => {
                ApiResponse::error(STATUS_BAD_REQUEST, "bad_request", message)
            }
            Self::Service(err) => {
                let kind = err.kind();
                match kind {
                    ErrorKind::Validation => {
                        ApiResponse::error(STATUS_BAD_REQUEST, kind.as_str(), err.to_string())
                    }
                    ErrorKind::NotFound => {
                        ApiResponse::error(STATUS_NOT_FOUND, kind.as_str(), err.to_string())
                    }
                    ErrorKind::Authorization => {
                        ApiResponse::error(STATUS_FORBIDDEN, kind.as_str(), err.to_string())
                    }
                    ErrorKind::Internal => internal(&err),
                }
            }
            Self::Users(UserRepoError::Validation(err)) => ApiResponse::error(
                STATUS_BAD_REQUEST,
                ErrorKind::Validation.as_str(),
                err.to_string(),
            ),
            Self::Users(err @ UserRepoError::NotFound(_)) => ApiResponse::error(
                STATUS_NOT_FOUND,
                ErrorKind::NotFound.as_str(),
                err.to_string(),
            ),
            Self::Users(err @ UserRepoError::EmailTaken(_)) => {
                ApiResponse::error(STATUS_CONFLICT, "conflict", err.to_string())
            }
            Self::Users(err) => internal(&err),
            Self::Store(err) => internal(&err),
            Self::Db(err) => internal(&err),
        }
    }
}

impl From<RouteError> for ApiError {
    fn from(value: RouteError) -> Self {
        Self::Route(value)
    }
}

impl From<PostServiceError> for ApiError {
    fn from(value: PostServiceError) -> Self {
        Self::Service(value)
    }
}

impl From<UserRepoError> for ApiError {
    fn from(value: UserRepoError) -> Self {
        Self::Users(value)
    }
}

impl From<PostRepoError> for ApiError {
    fn from(value: PostRepoError) -> Self {
        Self::Store(value)
    }
}

impl From<DbError> for ApiError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

fn internal(err: &dyn std::error::Error) -> ApiResponse {
    error!("event=api_request module=api status=error error={}", err);
    ApiResponse::error(STATUS_INTERNAL, ErrorKind::Internal.as_str(), INTERNAL_MESSAGE)
}

/// Forum boundary bound to one database file.
#[derive(Debug, Clone)]
pub struct ForumApi {
    config: ApiConfig,
}

impl ForumApi {
    pub fn new(config: ApiConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Handles one request on a fresh connection.
    pub fn handle(&self, request: &ApiRequest) -> ApiResponse {
        let started_at = Instant::now();
        let response = match open_db(&self.config.db_path) {
            Ok(conn) => dispatch(&conn, request),
            Err(err) => ApiError::from(err).into_response(),
        };

        let route = Method::parse(&request.method)
            .and_then(|method| resolve(method, &request.path).ok())
            .map_or("unmatched", Route::name);
        let line = format!(
            "event=api_request module=api status={} route={} method={} http_status={} duration_ms={}",
            if response.is_success() { "ok" } else { "rejected" },
            route,
            request.method,
            response.status,
            started_at.elapsed().as_millis()
        );
        if response.status >= STATUS_INTERNAL {
            error!("{line}");
        } else if response.is_success() {
            info!("{line}");
        } else {
            warn!("{line}");
        }
        response
    }
}

/// Handles one request on a caller-provided migrated connection.
pub fn dispatch(conn: &Connection, request: &ApiRequest) -> ApiResponse {
    match try_dispatch(conn, request) {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

fn try_dispatch(conn: &Connection, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
    let method = Method::parse(&request.method)
        .ok_or_else(|| ApiError::UnknownMethod(request.method.clone()))?;
    let route = resolve(method, &request.path)?;

    let response = match route {
        Route::RootsPage { page } => {
            let page = post_service(conn)?.read_roots_page(page)?;
            ApiResponse::json(STATUS_OK, &PageView::from(page))
        }
        Route::CreatePost => {
            let actor = require_actor(request)?;
            let body: CreatePostBody = parse_body(request)?;
            let service = post_service(conn)?;
            let post = service.create_post(
                actor,
                body.number,
                body.operator,
                body.parent_post_id,
            )?;
            let created = service.read_post(post.id)?;
            ApiResponse::json(STATUS_CREATED, &NodeView::from(created))
        }
        Route::ReadPost(id) => {
            let post = post_service(conn)?.read_post(id)?;
            ApiResponse::json(STATUS_OK, &NodeView::from(post))
        }
        Route::UpdatePost(id) => {
            let actor = require_actor(request)?;
            let body: UpdatePostBody = parse_body(request)?;
            let service = post_service(conn)?;
            service.update_post(actor, id, &body.into_patch())?;
            let updated = service.read_post(id)?;
            ApiResponse::json(STATUS_OK, &NodeView::from(updated))
        }
        Route::DeletePost(id) => {
            let actor = require_actor(request)?;
            post_service(conn)?.delete_post(actor, id)?;
            ApiResponse::no_content()
        }
        Route::ChildrenCount(id) => {
            let count = post_service(conn)?.children_count(id)?;
            ApiResponse::json(STATUS_OK, &CountView { count })
        }
        Route::ChildrenPage { id, page } => {
            let page = post_service(conn)?.read_children_page(id, page)?;
            ApiResponse::json(STATUS_OK, &PageView::from(page))
        }
        Route::Parent(id) => {
            let parent = post_service(conn)?.read_parent(id)?;
            ApiResponse::json(STATUS_OK, &NodeView::from(parent))
        }
        Route::RegisterUser => {
            let body: RegisterUserBody = parse_body(request)?;
            let user = SqliteUserRepository::new(conn).create_user(&NewUser::new(
                body.name,
                body.username,
                body.email,
            ))?;
            info!(
                "event=user_register module=api status=ok user_id={}",
                user.id
            );
            ApiResponse::json(STATUS_CREATED, &UserView::from(user))
        }
        Route::UserRoots(owner_id) => {
            let posts = post_service(conn)?
                .list_roots_by_owner(owner_id)?
                .into_iter()
                .map(NodeView::from)
                .collect();
            ApiResponse::json(STATUS_OK, &PostListView { posts })
        }
    };
    Ok(response)
}

fn post_service(conn: &Connection) -> Result<PostService<SqlitePostRepository<'_>>, ApiError> {
    Ok(PostService::new(SqlitePostRepository::try_new(conn)?))
}

fn require_actor(request: &ApiRequest) -> Result<UserId, ApiError> {
    request.actor.ok_or(ApiError::Unauthenticated)
}

fn parse_body<T: DeserializeOwned>(request: &ApiRequest) -> Result<T, ApiError> {
    let raw = request
        .body
        .as_deref()
        .filter(|body| !body.trim().is_empty())
        .ok_or_else(|| ApiError::BadBody("request body is required".to_string()))?;
    serde_json::from_str(raw).map_err(|err| ApiError::BadBody(format!("malformed body: {err}")))
}

#[cfg(test)]
mod tests {
    use super::{dispatch, ApiRequest, ApiResponse};
    use calcforum_core::db::open_db_in_memory;
    use rusqlite::Connection;
    use serde_json::json;

    fn register(conn: &Connection, username: &str) -> i64 {
        let response = dispatch(
            conn,
            &ApiRequest::new("POST", "users").with_body(
                json!({
                    "name": username,
                    "username": username,
                    "email": format!("{username}@example.com"),
                })
                .to_string(),
            ),
        );
        assert_eq!(response.status, 201, "{}", response.body_text());
        response.body.unwrap()["id"].as_i64().unwrap()
    }

    fn create(conn: &Connection, actor: i64, body: serde_json::Value) -> ApiResponse {
        dispatch(
            conn,
            &ApiRequest::new("POST", "posts")
                .with_actor(actor)
                .with_body(body.to_string()),
        )
    }

    #[test]
    fn create_returns_created_node_view() {
        let conn = open_db_in_memory().unwrap();
        let ada = register(&conn, "ada");

        let response = create(&conn, ada, json!({"number": 10}));
        assert_eq!(response.status, 201);
        let body = response.body.unwrap();
        assert_eq!(body["number"], json!(10.0));
        assert!(body["operation"].is_null());
        assert_eq!(body["user"]["name"], json!("ada"));
    }

    #[test]
    fn missing_actor_is_unauthenticated() {
        let conn = open_db_in_memory().unwrap();
        let response = dispatch(
            &conn,
            &ApiRequest::new("POST", "posts").with_body(r#"{"number": 1}"#),
        );
        assert_eq!(response.status, 401);
        assert_eq!(response.body.unwrap()["error"], json!("unauthenticated"));
    }

    #[test]
    fn reply_without_operator_is_bad_request() {
        let conn = open_db_in_memory().unwrap();
        let ada = register(&conn, "ada");
        let root = create(&conn, ada, json!({"number": 1})).body.unwrap();

        let response = create(&conn, ada, json!({"number": 2, "parentPostId": root["id"]}));
        assert_eq!(response.status, 400);
        assert_eq!(response.body.unwrap()["error"], json!("validation"));
    }

    #[test]
    fn malformed_body_is_bad_request() {
        let conn = open_db_in_memory().unwrap();
        let ada = register(&conn, "ada");
        let response = dispatch(
            &conn,
            &ApiRequest::new("POST", "posts")
                .with_actor(ada)
                .with_body("{number:"),
        );
        assert_eq!(response.status, 400);
        assert_eq!(response.body.unwrap()["error"], json!("bad_request"));
    }

    #[test]
    fn unknown_route_and_method_statuses() {
        let conn = open_db_in_memory().unwrap();
        assert_eq!(dispatch(&conn, &ApiRequest::new("GET", "nope")).status, 404);
        assert_eq!(dispatch(&conn, &ApiRequest::new("PATCH", "posts/1")).status, 405);
        assert_eq!(dispatch(&conn, &ApiRequest::new("DELETE", "roots")).status, 405);
        assert_eq!(
            dispatch(&conn, &ApiRequest::new("GET", "roots?page=x")).status,
            400
        );
        assert_eq!(
            dispatch(&conn, &ApiRequest::new("GET", "posts/1?x=y")).status,
            400
        );
    }

    #[test]
    fn duplicate_email_is_conflict() {
        let conn = open_db_in_memory().unwrap();
        register(&conn, "ada");
        let response = dispatch(
            &conn,
            &ApiRequest::new("POST", "users").with_body(
                json!({"name": "Ada", "username": "ada2", "email": "ADA@example.com"})
                    .to_string(),
            ),
        );
        assert_eq!(response.status, 409);
    }

    #[test]
    fn non_owner_update_is_forbidden() {
        let conn = open_db_in_memory().unwrap();
        let ada = register(&conn, "ada");
        let eve = register(&conn, "eve");
        let root = create(&conn, ada, json!({"number": 5})).body.unwrap();
        let path = format!("posts/{}", root["id"]);

        let response = dispatch(
            &conn,
            &ApiRequest::new("PUT", path.as_str())
                .with_actor(eve)
                .with_body(r#"{"number": 6}"#),
        );
        assert_eq!(response.status, 403);
        assert_eq!(response.body.unwrap()["error"], json!("authorization"));

        let unchanged = dispatch(&conn, &ApiRequest::new("GET", path)).body.unwrap();
        assert_eq!(unchanged["number"], json!(5.0));
    }

    #[test]
    fn delete_returns_no_content_without_body() {
        let conn = open_db_in_memory().unwrap();
        let ada = register(&conn, "ada");
        let root = create(&conn, ada, json!({"number": 5})).body.unwrap();

        let response = dispatch(
            &conn,
            &ApiRequest::new("DELETE", format!("posts/{}", root["id"])).with_actor(ada),
        );
        assert_eq!(response.status, 204);
        assert_eq!(response.body, None);
        assert_eq!(response.body_text(), "");
    }
}
