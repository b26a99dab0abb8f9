// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 路由表
//!
//! 每个方法一棵 `matchit` 前缀树，模式写作 `/snippet/view/{id}` 或 `/static/{*filepath}`。
//! 路径匹配但方法不符时返回 405 并给出 `Allow`，完全不匹配时交给 404 处理器。

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use log::debug;

use crate::{
    exception::Exception,
    middleware::{handler_fn, BoxHandler, Handler},
    param::HttpRequestMethod,
    request::Request,
    response::{format_allow, Response},
};

pub struct Router {
    routes: BTreeMap<HttpRequestMethod, matchit::Router<BoxHandler>>,
    not_found: BoxHandler,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Self {
            routes: BTreeMap::new(),
            not_found: handler_fn(|_request: Request| async { Response::from_status_code(404) }),
        }
    }

    /// 注册路由，模式冲突时返回 `Exception::Route`
    pub fn handle(
        &mut self,
        method: HttpRequestMethod,
        pattern: &str,
        handler: BoxHandler,
    ) -> Result<(), Exception> {
        self.routes
            .entry(method)
            .or_default()
            .insert(pattern, handler)
            .map_err(|e| Exception::Route(format!("{} {}: {}", method, pattern, e)))
    }

    pub fn get(&mut self, pattern: &str, handler: BoxHandler) -> Result<(), Exception> {
        self.handle(HttpRequestMethod::Get, pattern, handler)
    }

    pub fn post(&mut self, pattern: &str, handler: BoxHandler) -> Result<(), Exception> {
        self.handle(HttpRequestMethod::Post, pattern, handler)
    }

    pub fn set_not_found(&mut self, handler: BoxHandler) {
        self.not_found = handler;
    }

    fn lookup(
        &self,
        method: HttpRequestMethod,
        path: &str,
    ) -> Option<(BoxHandler, Vec<(String, String)>)> {
        let matched = self.routes.get(&method)?.at(path).ok()?;
        let params = matched
            .params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Some((matched.value.clone(), params))
    }

    /// 路径可以匹配的全部方法，GET 隐含 HEAD
    pub fn allowed(&self, path: &str) -> Vec<HttpRequestMethod> {
        let mut allowed: BTreeSet<HttpRequestMethod> = self
            .routes
            .iter()
            .filter(|(_, tree)| tree.at(path).is_ok())
            .map(|(method, _)| *method)
            .collect();
        if allowed.contains(&HttpRequestMethod::Get) {
            allowed.insert(HttpRequestMethod::Head);
        }
        if !allowed.is_empty() {
            allowed.insert(HttpRequestMethod::Options);
        }
        allowed.into_iter().collect()
    }
}

#[async_trait]
impl Handler for Router {
    async fn call(&self, mut request: Request) -> Response {
        let method = request.method();
        let found = self.lookup(method, request.path()).or_else(|| {
            if method == HttpRequestMethod::Head {
                self.lookup(HttpRequestMethod::Get, request.path())
            } else {
                None
            }
        });
        if let Some((handler, params)) = found {
            request.set_params(params);
            return handler.call(request).await;
        }

        let allowed = self.allowed(request.path());
        if allowed.is_empty() {
            debug!("[ID{}]未匹配任何路由：{}", request.id(), request.path());
            return self.not_found.call(request).await;
        }
        if method == HttpRequestMethod::Options {
            let mut response = Response::from_status_code(204);
            response.set_header("Allow", &format_allow(&allowed));
            return response;
        }
        Response::method_not_allowed(&allowed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(body: &'static str) -> BoxHandler {
        handler_fn(move |_request: Request| async move { Response::from_text(200, body) })
    }

    fn router() -> Router {
        let mut router = Router::new();
        router.get("/", text("home")).unwrap();
        router
            .get(
                "/snippet/view/{id}",
                handler_fn(|request: Request| async move {
                    Response::from_text(200, request.param("id").unwrap_or_default())
                }),
            )
            .unwrap();
        router.get("/user/login", text("login form")).unwrap();
        router.post("/user/login", text("login post")).unwrap();
        router.post("/user/logout", text("logout")).unwrap();
        router
            .get(
                "/static/{*filepath}",
                handler_fn(|request: Request| async move {
                    Response::from_text(200, request.param("filepath").unwrap_or_default())
                }),
            )
            .unwrap();
        router
    }

    async fn call(router: &Router, method: HttpRequestMethod, uri: &str) -> Response {
        router.call(Request::new(method, uri)).await
    }

    #[tokio::test]
    async fn test_dispatch_by_method() {
        let router = router();
        let response = call(&router, HttpRequestMethod::Get, "/user/login").await;
        assert_eq!(response.body().as_ref(), b"login form");
        let response = call(&router, HttpRequestMethod::Post, "/user/login").await;
        assert_eq!(response.body().as_ref(), b"login post");
    }

    #[tokio::test]
    async fn test_params() {
        let router = router();
        let response = call(&router, HttpRequestMethod::Get, "/snippet/view/42").await;
        assert_eq!(response.body().as_ref(), b"42");
        let response = call(&router, HttpRequestMethod::Get, "/static/css/main.css").await;
        assert_eq!(response.body().as_ref(), b"css/main.css");
    }

    #[tokio::test]
    async fn test_not_found() {
        let router = router();
        let response = call(&router, HttpRequestMethod::Get, "/missing").await;
        assert_eq!(response.status_code(), 404);
        let response = call(&router, HttpRequestMethod::Get, "/snippet/view/").await;
        assert_eq!(response.status_code(), 404);
    }

    #[tokio::test]
    async fn test_method_not_allowed_lists_methods() {
        let router = router();
        let response = call(&router, HttpRequestMethod::Get, "/user/logout").await;
        assert_eq!(response.status_code(), 405);
        assert_eq!(response.header("Allow"), Some("OPTIONS, POST"));

        let response = call(&router, HttpRequestMethod::Delete, "/user/login").await;
        assert_eq!(response.status_code(), 405);
        assert_eq!(response.header("Allow"), Some("GET, HEAD, OPTIONS, POST"));
    }

    #[tokio::test]
    async fn test_head_falls_back_to_get() {
        let router = router();
        let response = call(&router, HttpRequestMethod::Head, "/").await;
        assert_eq!(response.status_code(), 200);
        assert_eq!(response.body().as_ref(), b"home");
    }

    #[tokio::test]
    async fn test_options() {
        let router = router();
        let response = call(&router, HttpRequestMethod::Options, "/user/login").await;
        assert_eq!(response.status_code(), 204);
        assert_eq!(response.header("Allow"), Some("GET, HEAD, OPTIONS, POST"));
    }

    #[test]
    fn test_conflicting_route_is_an_error() {
        let mut router = router();
        assert!(matches!(
            router.get("/snippet/view/{slug}", text("dup")),
            Err(Exception::Route(_))
        ));
    }

    #[tokio::test]
    async fn test_custom_not_found() {
        let mut router = router();
        router.set_not_found(handler_fn(|_request: Request| async {
            Response::from_text(404, "nothing here")
        }));
        let response = call(&router, HttpRequestMethod::Get, "/nope").await;
        assert_eq!(response.body().as_ref(), b"nothing here");
    }
}
