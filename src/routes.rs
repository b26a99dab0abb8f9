// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 路由与处理链装配
//!
//! - `standard`：所有请求都经过，panic 恢复、访问日志、安全响应头
//! - `dynamic`：需要会话的页面，加载保存会话、CSRF 校验、身份认证
//! - `protected`：在 `dynamic` 之后追加登录检查

use std::{future::Future, sync::Arc};

use crate::{
    app::Application,
    auth, csrf,
    exception::Exception,
    handlers,
    middleware::{handler_fn, log_request, secure_headers, BoxHandler, Chain},
    recover::recover_panic,
    request::Request,
    response::Response,
    router::Router,
};

pub struct Chains {
    pub standard: Chain,
    pub dynamic: Chain,
    pub protected: Chain,
}

pub fn chains(app: &Application) -> Chains {
    let standard = Chain::new(vec![recover_panic(), log_request(), secure_headers()]);
    let dynamic = Chain::new(vec![
        app.sessions().load_and_save(),
        csrf::no_surf(app.config().secure_cookies()),
        auth::authenticate(Arc::clone(app.users())),
    ]);
    let protected = dynamic.append(auth::require_authentication());
    Chains {
        standard,
        dynamic,
        protected,
    }
}

/// 把 `async fn(Arc<Application>, Request)` 适配为处理器
fn endpoint<F, Fut>(app: &Arc<Application>, f: F) -> BoxHandler
where
    F: Fn(Arc<Application>, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    let app = Arc::clone(app);
    handler_fn(move |request: Request| f(Arc::clone(&app), request))
}

/// 构建完整的请求处理器：`standard(router)`
pub fn routes(app: &Arc<Application>) -> Result<BoxHandler, Exception> {
    let Chains {
        standard,
        dynamic,
        protected,
    } = chains(app);
    let mut router = Router::new();

    router.get("/static/{*filepath}", handler_fn(handlers::static_file))?;
    router.get("/ping", handler_fn(handlers::ping))?;

    router.get("/", dynamic.then(endpoint(app, handlers::home)))?;
    router.get("/about", dynamic.then(endpoint(app, handlers::about)))?;
    router.get(
        "/snippet/view/{id}",
        dynamic.then(endpoint(app, handlers::snippet_view)),
    )?;
    router.get(
        "/user/signup",
        dynamic.then(endpoint(app, handlers::user_signup)),
    )?;
    router.post(
        "/user/signup",
        dynamic.then(endpoint(app, handlers::user_signup_post)),
    )?;
    router.get(
        "/user/login",
        dynamic.then(endpoint(app, handlers::user_login)),
    )?;
    router.post(
        "/user/login",
        dynamic.then(endpoint(app, handlers::user_login_post)),
    )?;

    router.get(
        "/snippet/create",
        protected.then(endpoint(app, handlers::snippet_create)),
    )?;
    router.post(
        "/snippet/create",
        protected.then(endpoint(app, handlers::snippet_create_post)),
    )?;
    router.post(
        "/user/logout",
        protected.then(endpoint(app, handlers::user_logout_post)),
    )?;
    router.get(
        "/account/view",
        protected.then(endpoint(app, handlers::account_view)),
    )?;
    router.get(
        "/account/password/update",
        protected.then(endpoint(app, handlers::account_password_update)),
    )?;
    router.post(
        "/account/password/update",
        protected.then(endpoint(app, handlers::account_password_update_post)),
    )?;

    let app_for_404 = Arc::clone(app);
    router.set_not_found(handler_fn(move |_request: Request| {
        let app = Arc::clone(&app_for_404);
        async move { app.not_found() }
    }));

    Ok(standard.then(Arc::new(router)))
}
