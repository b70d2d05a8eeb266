//! Path and method resolution for the request boundary.

use calcforum_core::{PostId, UserId};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::{Display, Formatter};

static ROOTS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^roots$").expect("valid roots regex"));
static ROOTS_PAGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^posts/page/(\d+)$").expect("valid roots page regex"));
static POSTS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^posts$").expect("valid posts regex"));
static POST_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^posts/(\d+)$").expect("valid post regex"));
static CHILDREN_COUNT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^posts/(\d+)/children/count$").expect("valid children count regex")
});
static CHILDREN_PAGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^posts/(\d+)/children/page/(\d+)$").expect("valid children page regex")
});
static PARENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^posts/(\d+)/parent$").expect("valid parent regex"));
static USERS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^users$").expect("valid users regex"));
static USER_ROOTS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^users/(\d+)/roots$").expect("valid user roots regex"));

/// Request verbs the boundary understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    /// Parses a verb case-insensitively.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "GET" => Some(Self::Get),
            "POST" => Some(Self::Post),
            "PUT" => Some(Self::Put),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl Display for Method {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved endpoint with its path parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    RootsPage { page: u32 },
    CreatePost,
    ReadPost(PostId),
    UpdatePost(PostId),
    DeletePost(PostId),
    ChildrenCount(PostId),
    ChildrenPage { id: PostId, page: u32 },
    Parent(PostId),
    RegisterUser,
    UserRoots(UserId),
}

impl Route {
    /// Stable label for logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::RootsPage { .. } => "roots_page",
            Self::CreatePost => "create_post",
            Self::ReadPost(_) => "read_post",
            Self::UpdatePost(_) => "update_post",
            Self::DeletePost(_) => "delete_post",
            Self::ChildrenCount(_) => "children_count",
            Self::ChildrenPage { .. } => "children_page",
            Self::Parent(_) => "read_parent",
            Self::RegisterUser => "register_user",
            Self::UserRoots(_) => "user_roots",
        }
    }
}

/// Resolution failures, each mapping to one response status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    NotFound,
    MethodNotAllowed,
    InvalidQuery(String),
}

impl Display for RouteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "no such endpoint"),
            Self::MethodNotAllowed => write!(f, "method not allowed on this endpoint"),
            Self::InvalidQuery(message) => write!(f, "invalid query: {message}"),
        }
    }
}

impl std::error::Error for RouteError {}

/// Maps `method` + `raw_path` to a route.
///
/// Only `roots` accepts a query, and only `page=N`.
pub fn resolve(method: Method, raw_path: &str) -> Result<Route, RouteError> {
    let (path, query) = match raw_path.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (raw_path, None),
    };
    let path = path.trim().trim_matches('/');

    if ROOTS_RE.is_match(path) {
        let page = query_page(query)?.unwrap_or(0);
        return only(method, Method::Get, Route::RootsPage { page });
    }

    let route = resolve_path(method, path)?;
    if let Some(query) = query.filter(|query| !query.is_empty()) {
        return Err(RouteError::InvalidQuery(format!(
            "`{path}` takes no query parameters, got `{query}`"
        )));
    }
    Ok(route)
}

fn resolve_path(method: Method, path: &str) -> Result<Route, RouteError> {
    if let Some(caps) = ROOTS_PAGE_RE.captures(path) {
        let page = parse_page(&caps[1])?;
        return only(method, Method::Get, Route::RootsPage { page });
    }
    if POSTS_RE.is_match(path) {
        return only(method, Method::Post, Route::CreatePost);
    }
    if let Some(caps) = POST_RE.captures(path) {
        let id = parse_id(&caps[1])?;
        return match method {
            Method::Get => Ok(Route::ReadPost(id)),
            Method::Put => Ok(Route::UpdatePost(id)),
            Method::Delete => Ok(Route::DeletePost(id)),
            Method::Post => Err(RouteError::MethodNotAllowed),
        };
    }
    if let Some(caps) = CHILDREN_COUNT_RE.captures(path) {
        let id = parse_id(&caps[1])?;
        return only(method, Method::Get, Route::ChildrenCount(id));
    }
    if let Some(caps) = CHILDREN_PAGE_RE.captures(path) {
        let id = parse_id(&caps[1])?;
        let page = parse_page(&caps[2])?;
        return only(method, Method::Get, Route::ChildrenPage { id, page });
    }
    if let Some(caps) = PARENT_RE.captures(path) {
        let id = parse_id(&caps[1])?;
        return only(method, Method::Get, Route::Parent(id));
    }
    if USERS_RE.is_match(path) {
        return only(method, Method::Post, Route::RegisterUser);
    }
    if let Some(caps) = USER_ROOTS_RE.captures(path) {
        let id = parse_id(&caps[1])?;
        return only(method, Method::Get, Route::UserRoots(id));
    }

    Err(RouteError::NotFound)
}

fn only(method: Method, allowed: Method, route: Route) -> Result<Route, RouteError> {
    if method == allowed {
        Ok(route)
    } else {
        Err(RouteError::MethodNotAllowed)
    }
}

// Digits-only captures can still overflow.
fn parse_id(raw: &str) -> Result<i64, RouteError> {
    raw.parse::<i64>().map_err(|_| RouteError::NotFound)
}

fn parse_page(raw: &str) -> Result<u32, RouteError> {
    raw.trim()
        .parse::<u32>()
        .map_err(|_| RouteError::InvalidQuery(format!("page `{raw}` is not a page index")))
}

fn query_page(query: Option<&str>) -> Result<Option<u32>, RouteError> {
    let Some(query) = query else {
        return Ok(None);
    };
    let mut page = None;
    for pair in query.split('&').filter(|pair| !pair.is_empty()) {
        match pair.split_once('=') {
            Some(("page", value)) => page = Some(parse_page(value)?),
            _ => {
                return Err(RouteError::InvalidQuery(format!(
                    "unsupported parameter `{pair}`"
                )))
            }
        }
    }
    Ok(page)
}

#[cfg(test)]
mod tests {
    use super::{resolve, Method, Route, RouteError};

    #[test]
    fn method_parse_is_case_insensitive() {
        assert_eq!(Method::parse("get"), Some(Method::Get));
        assert_eq!(Method::parse(" Delete "), Some(Method::Delete));
        assert_eq!(Method::parse("PATCH"), None);
    }

    #[test]
    fn roots_page_defaults_to_zero_and_reads_query() {
        assert_eq!(
            resolve(Method::Get, "roots"),
            Ok(Route::RootsPage { page: 0 })
        );
        assert_eq!(
            resolve(Method::Get, "/roots?page=3"),
            Ok(Route::RootsPage { page: 3 })
        );
        assert_eq!(
            resolve(Method::Get, "posts/page/2"),
            Ok(Route::RootsPage { page: 2 })
        );
    }

    #[test]
    fn bad_page_query_is_invalid() {
        assert!(matches!(
            resolve(Method::Get, "roots?page=-1"),
            Err(RouteError::InvalidQuery(_))
        ));
        assert!(matches!(
            resolve(Method::Get, "roots?limit=5"),
            Err(RouteError::InvalidQuery(_))
        ));
    }

    #[test]
    fn post_item_routes_by_method() {
        assert_eq!(resolve(Method::Get, "posts/7"), Ok(Route::ReadPost(7)));
        assert_eq!(resolve(Method::Put, "/posts/7/"), Ok(Route::UpdatePost(7)));
        assert_eq!(resolve(Method::Delete, "posts/7"), Ok(Route::DeletePost(7)));
        assert_eq!(
            resolve(Method::Post, "posts/7"),
            Err(RouteError::MethodNotAllowed)
        );
    }

    #[test]
    fn nested_post_routes_resolve() {
        assert_eq!(
            resolve(Method::Get, "posts/4/children/count"),
            Ok(Route::ChildrenCount(4))
        );
        assert_eq!(
            resolve(Method::Get, "posts/4/children/page/1"),
            Ok(Route::ChildrenPage { id: 4, page: 1 })
        );
        assert_eq!(resolve(Method::Get, "posts/4/parent"), Ok(Route::Parent(4)));
        assert_eq!(resolve(Method::Post, "posts"), Ok(Route::CreatePost));
        assert_eq!(resolve(Method::Post, "users"), Ok(Route::RegisterUser));
        assert_eq!(resolve(Method::Get, "users/2/roots"), Ok(Route::UserRoots(2)));
    }

    #[test]
    fn query_is_rejected_outside_roots() {
        assert!(matches!(
            resolve(Method::Get, "posts/1?x=y"),
            Err(RouteError::InvalidQuery(_))
        ));
        assert!(matches!(
            resolve(Method::Get, "posts/page/2?page=3"),
            Err(RouteError::InvalidQuery(_))
        ));
        assert!(matches!(
            resolve(Method::Delete, "posts/1?page=0"),
            Err(RouteError::InvalidQuery(_))
        ));
        assert_eq!(resolve(Method::Get, "posts/1?"), Ok(Route::ReadPost(1)));
        assert_eq!(resolve(Method::Get, "nope?x=y"), Err(RouteError::NotFound));
        assert_eq!(
            resolve(Method::Put, "posts/1/parent?x=y"),
            Err(RouteError::MethodNotAllowed)
        );
    }

    #[test]
    fn route_names_label_endpoints() {
        assert_eq!(Route::RootsPage { page: 0 }.name(), "roots_page");
        assert_eq!(Route::ChildrenPage { id: 1, page: 2 }.name(), "children_page");
        assert_eq!(Route::Parent(1).name(), "read_parent");
    }

    #[test]
    fn unknown_paths_and_wrong_methods_are_distinct() {
        assert_eq!(resolve(Method::Get, "threads"), Err(RouteError::NotFound));
        assert_eq!(resolve(Method::Get, "posts/abc"), Err(RouteError::NotFound));
        assert_eq!(
            resolve(Method::Get, "posts/99999999999999999999"),
            Err(RouteError::NotFound)
        );
        assert_eq!(
            resolve(Method::Delete, "roots"),
            Err(RouteError::MethodNotAllowed)
        );
        assert_eq!(
            resolve(Method::Get, "posts"),
            Err(RouteError::MethodNotAllowed)
        );
    }
}
