//! Request routing.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::http::{HttpRequest, HttpResponse};

/// Boxed async route handler.
pub type HandlerFn = Arc<
    dyn Fn(HttpRequest) -> Pin<Box<dyn Future<Output = Result<HttpResponse>> + Send>>
        + Send
        + Sync,
>;

/// A method and path pattern bound to a handler. Path segments starting
/// with `:` capture a parameter.
#[derive(Clone)]
pub struct Route {
    pub method: String,
    pub path: String,
    pub handler: HandlerFn,
}

/// Dispatches requests to the first matching route.
#[derive(Clone, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_route(&mut self, route: Route) {
        self.routes.push(route);
    }

    /// Register `handler` for `method` and `path`.
    pub fn route<F, Fut>(mut self, method: &str, path: &str, handler: F) -> Self
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse>> + Send + 'static,
    {
        self.add_route(Route {
            method: method.to_ascii_uppercase(),
            path: path.to_string(),
            handler: Arc::new(move |req| Box::pin(handler(req))),
        });
        self
    }

    pub fn get<F, Fut>(self, path: &str, handler: F) -> Self
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse>> + Send + 'static,
    {
        self.route("GET", path, handler)
    }

    pub fn post<F, Fut>(self, path: &str, handler: F) -> Self
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse>> + Send + 'static,
    {
        self.route("POST", path, handler)
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Dispatch `request`.
    ///
    /// A path that matches with the wrong method is `MethodNotAllowed`;
    /// a path nothing matches is `RouteNotFound`.
    pub async fn dispatch(&self, mut request: HttpRequest) -> Result<HttpResponse> {
        let full_path = std::mem::take(&mut request.path);
        // Routes never depend on the query string
        let path = full_path.split_once('?').map_or(full_path.as_str(), |(path, _)| path);

        let mut path_matched = false;
        for route in &self.routes {
            let Some(params) = match_path(&route.path, path) else {
                continue;
            };
            if !route.method.eq_ignore_ascii_case(&request.method) {
                path_matched = true;
                continue;
            }
            request.path_params = params;
            request.path = path.to_string();
            return (route.handler)(request).await;
        }

        let target = format!("{} {}", request.method, path);
        if path_matched {
            Err(Error::MethodNotAllowed(target))
        } else {
            Err(Error::RouteNotFound(target))
        }
    }
}

/// Match a path pattern against a request path, returning the captured
/// parameters.
fn match_path(pattern: &str, path: &str) -> Option<HashMap<String, String>> {
    let pattern_parts: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
    let path_parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    if pattern_parts.len() != path_parts.len() {
        return None;
    }

    let mut params = HashMap::new();
    for (pattern_part, path_part) in pattern_parts.iter().zip(&path_parts) {
        if let Some(name) = pattern_part.strip_prefix(':') {
            params.insert(name.to_string(), path_part.to_string());
        } else if pattern_part != path_part {
            return None;
        }
    }
    Some(params)
}
