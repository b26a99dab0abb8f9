// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 身份认证
//!
//! [`authenticate`] 根据会话中的 `authenticatedUserID` 标记请求是否已登录，
//! [`require_authentication`] 拦截未登录的请求并跳转到登录页。

use std::sync::Arc;

use log::{debug, error};

use crate::{
    middleware::{Layer, Next},
    models::UserModel,
    param::{HttpRequestMethod, KEY_AUTH_USER_ID, KEY_REDIRECT_AFTER_LOGIN},
    request::Request,
    response::Response,
};

pub const LOGIN_PATH: &str = "/user/login";

pub fn is_authenticated(request: &Request) -> bool {
    request.is_authenticated()
}

/// 会话中的用户 ID 非零且用户仍然存在时，标记请求为已登录
pub fn authenticate(users: Arc<dyn UserModel>) -> Layer {
    Layer::from_fn("authenticate", move |mut request: Request, next: Next| {
        let users = Arc::clone(&users);
        async move {
            let user_id = request
                .session()
                .map_or(0, |session| session.get_i64(KEY_AUTH_USER_ID));
            if user_id != 0 {
                match users.exists(user_id).await {
                    Ok(true) => request.set_authenticated(true),
                    Ok(false) => debug!("[ID{}]会话中的用户{}已不存在", request.id(), user_id),
                    Err(e) => {
                        error!("[ID{}]查询用户失败：{}", request.id(), e);
                        return Response::from_status_code(500);
                    }
                }
            }
            next.run(request).await
        }
    })
}

/// 只记录站内路径，避免 `//host` 形式的开放重定向
fn local_path(uri: &str) -> Option<&str> {
    (uri.starts_with('/') && !uri.starts_with("//")).then_some(uri)
}

pub fn require_authentication() -> Layer {
    Layer::from_fn("require_authentication", |request: Request, next: Next| async move {
        if !is_authenticated(&request) {
            if request.method() == HttpRequestMethod::Get {
                let uri = request.uri();
                if let (Some(session), Some(path)) = (request.session(), local_path(&uri)) {
                    session.put(KEY_REDIRECT_AFTER_LOGIN, path);
                }
            }
            debug!("[ID{}]未登录，跳转到登录页", request.id());
            return Response::redirect(LOGIN_PATH);
        }

        let mut response = next.run(request).await;
        response.set_header("Cache-Control", "no-store");
        response
    })
}
