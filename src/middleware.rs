// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 中间件与处理链
//!
//! - [`Handler`]：请求处理器的统一抽象，路由表、业务处理器和被包装后的处理链都实现它。
//! - [`Layer`]：把一个处理器包装成另一个处理器的变换，带名称以便日志与测试。
//! - [`Chain`]：不可变的有序 `Layer` 列表，`then` 从右向左折叠，
//!   得到 `l1(l2(...ln(h)))`，请求依次经过 l1..ln，响应以相反顺序返回。
//!
//! 本模块同时提供两个通用中间件：请求日志与安全响应头。

use std::{future::Future, sync::Arc, time::Instant};

use async_trait::async_trait;
use log::info;

use crate::{request::Request, response::Response};

#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn call(&self, request: Request) -> Response;
}

pub type BoxHandler = Arc<dyn Handler>;

/// 把异步闭包适配为 [`Handler`]
pub struct HandlerFn<F>(F);

#[async_trait]
impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    async fn call(&self, request: Request) -> Response {
        (self.0)(request).await
    }
}

pub fn handler_fn<F, Fut>(f: F) -> BoxHandler
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    Arc::new(HandlerFn(f))
}

/// 处理链中的剩余部分
#[derive(Clone)]
pub struct Next(BoxHandler);

impl Next {
    pub fn new(handler: BoxHandler) -> Self {
        Self(handler)
    }

    pub async fn run(self, request: Request) -> Response {
        self.0.call(request).await
    }
}

type Wrap = dyn Fn(BoxHandler) -> BoxHandler + Send + Sync;

#[derive(Clone)]
pub struct Layer {
    name: &'static str,
    wrap: Arc<Wrap>,
}

impl Layer {
    pub fn new<F>(name: &'static str, wrap: F) -> Self
    where
        F: Fn(BoxHandler) -> BoxHandler + Send + Sync + 'static,
    {
        Self {
            name,
            wrap: Arc::new(wrap),
        }
    }

    /// 用形如 `async fn(Request, Next) -> Response` 的闭包定义中间件
    pub fn from_fn<F, Fut>(name: &'static str, f: F) -> Self
    where
        F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        let f = Arc::new(f);
        Self::new(name, move |next: BoxHandler| {
            let f = Arc::clone(&f);
            handler_fn(move |request: Request| (*f)(request, Next(Arc::clone(&next))))
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn wrap(&self, next: BoxHandler) -> BoxHandler {
        (self.wrap)(next)
    }
}

#[derive(Clone, Default)]
pub struct Chain {
    layers: Vec<Layer>,
}

impl Chain {
    pub fn new(layers: Vec<Layer>) -> Self {
        Self { layers }
    }

    /// 返回追加了 `layer` 的新处理链，原处理链保持不变
    pub fn append(&self, layer: Layer) -> Chain {
        let mut layers = self.layers.clone();
        layers.push(layer);
        Chain { layers }
    }

    pub fn extend(&self, other: &Chain) -> Chain {
        let mut layers = self.layers.clone();
        layers.extend(other.layers.iter().cloned());
        Chain { layers }
    }

    pub fn then(&self, handler: BoxHandler) -> BoxHandler {
        self.layers
            .iter()
            .rev()
            .fold(handler, |next, layer| layer.wrap(next))
    }

    pub fn then_fn<F, Fut>(&self, f: F) -> BoxHandler
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        self.then(handler_fn(f))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.layers.iter().map(Layer::name).collect()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

/// 每个请求记录一行访问日志
pub fn log_request() -> Layer {
    Layer::from_fn("log_request", |request: Request, next: Next| async move {
        let id = request.id();
        let remote = request
            .remote_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|| "-".to_string());
        let version = request.version();
        let method = request.method();
        let uri = request.uri();
        let user_agent = request.user_agent().to_string();
        let start_time = Instant::now();

        let response = next.run(request).await;

        info!(
            "[ID{}] {} - {} {} {}, {}, {}, {}, {}ms",
            id,
            remote,
            version,
            method,
            uri,
            response.status_code(),
            response.information(),
            user_agent,
            start_time.elapsed().as_millis()
        );
        response
    })
}

pub const SECURE_HEADERS: [(&str, &str); 5] = [
    (
        "Content-Security-Policy",
        "default-src 'self'; style-src 'self' fonts.googleapis.com; font-src fonts.gstatic.com",
    ),
    ("Referrer-Policy", "origin-when-cross-origin"),
    ("X-Content-Type-Options", "nosniff"),
    ("X-Frame-Options", "deny"),
    ("X-XSS-Protection", "0"),
];

pub fn secure_headers() -> Layer {
    Layer::from_fn("secure_headers", |request: Request, next: Next| async move {
        let mut response = next.run(request).await;
        for (name, value) in SECURE_HEADERS {
            response.set_header(name, value);
        }
        response
    })
}
