// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 业务处理器
//!
//! 每个处理器形如 `async fn(Arc<Application>, Request) -> Response`。
//! 领域错误（记录不存在、邮箱重复、凭据错误）重新渲染页面或返回 404，
//! 其余错误一律交给 `server_error`。

use std::sync::Arc;

use log::info;

use crate::{
    app::Application,
    forms::{
        decode_post_form, AccountPasswordUpdateForm, SnippetCreateForm, UserLoginForm,
        UserSignupForm,
    },
    models::ModelError,
    param::{KEY_AUTH_USER_ID, KEY_FLASH, KEY_REDIRECT_AFTER_LOGIN},
    request::Request,
    response::Response,
    templates::{SnippetView, UserView, UI},
};

pub async fn ping(_request: Request) -> Response {
    Response::from_text(200, "OK")
}

/// 内嵌的 `ui/static` 目录，不提供目录列表
pub async fn static_file(request: Request) -> Response {
    let filepath = request.param("filepath").unwrap_or_default();
    if filepath.split('/').any(|segment| segment == "..") {
        return Response::from_status_code(404);
    }
    match UI.get_file(format!("static/{}", filepath)) {
        Some(file) => Response::from_file(filepath, file.contents()),
        None => Response::from_status_code(404),
    }
}

pub async fn home(app: Arc<Application>, request: Request) -> Response {
    let snippets = match app.snippets().latest().await {
        Ok(snippets) => snippets,
        Err(e) => return app.server_error(&request, &e),
    };
    let mut data = app.new_template_data(&request);
    data.snippets = snippets.iter().map(SnippetView::from).collect();
    app.render(&request, 200, "home.html", &data)
}

pub async fn about(app: Arc<Application>, request: Request) -> Response {
    let data = app.new_template_data(&request);
    app.render(&request, 200, "about.html", &data)
}

pub async fn snippet_view(app: Arc<Application>, request: Request) -> Response {
    let id = match request.param("id").and_then(|id| id.parse::<i64>().ok()) {
        Some(id) if id >= 1 => id,
        _ => return app.not_found(),
    };
    let snippet = match app.snippets().get(id).await {
        Ok(snippet) => snippet,
        Err(ModelError::NoRecord) => return app.not_found(),
        Err(e) => return app.server_error(&request, &e),
    };
    let mut data = app.new_template_data(&request);
    data.snippet = Some(SnippetView::from(&snippet));
    app.render(&request, 200, "view.html", &data)
}

pub async fn snippet_create(app: Arc<Application>, request: Request) -> Response {
    app.render_form(&request, 200, "create.html", &SnippetCreateForm::default())
}

pub async fn snippet_create_post(app: Arc<Application>, request: Request) -> Response {
    let mut form: SnippetCreateForm = match decode_post_form(&request) {
        Ok(form) => form,
        Err(_) => return app.client_error(400),
    };
    if !form.validate() {
        return app.render_form(&request, 422, "create.html", &form);
    }

    let id = match app
        .snippets()
        .insert(&form.title, &form.content, form.expires)
        .await
    {
        Ok(id) => id,
        Err(e) => return app.server_error(&request, &e),
    };
    if let Some(session) = request.session() {
        session.put(KEY_FLASH, "Snippet successfully created!");
    }
    Response::redirect(&format!("/snippet/view/{}", id))
}

pub async fn user_signup(app: Arc<Application>, request: Request) -> Response {
    app.render_form(&request, 200, "signup.html", &UserSignupForm::default())
}

pub async fn user_signup_post(app: Arc<Application>, request: Request) -> Response {
    let mut form: UserSignupForm = match decode_post_form(&request) {
        Ok(form) => form,
        Err(_) => return app.client_error(400),
    };
    if form.validate() {
        match app
            .users()
            .insert(&form.name, &form.email, &form.password)
            .await
        {
            Ok(()) => {
                info!("[ID{}]新用户注册：{}", request.id(), form.email);
                if let Some(session) = request.session() {
                    session.put(KEY_FLASH, "Your signup was successful. Please log in.");
                }
                return Response::redirect("/user/login");
            }
            Err(ModelError::DuplicateEmail) => form
                .validator
                .add_field_error("email", "Email address is already in use"),
            Err(e) => return app.server_error(&request, &e),
        }
    }
    app.render_form(&request, 422, "signup.html", &form)
}

pub async fn user_login(app: Arc<Application>, request: Request) -> Response {
    app.render_form(&request, 200, "login.html", &UserLoginForm::default())
}

pub async fn user_login_post(app: Arc<Application>, request: Request) -> Response {
    let mut form: UserLoginForm = match decode_post_form(&request) {
        Ok(form) => form,
        Err(_) => return app.client_error(400),
    };
    if form.validate() {
        match app.users().authenticate(&form.email, &form.password).await {
            Ok(user_id) => {
                let session = match app.session(&request) {
                    Ok(session) => session,
                    Err(response) => return response,
                };
                // 权限变化之前更换令牌
                if let Err(e) = app.sessions().renew_token(&session).await {
                    return app.server_error(&request, &e);
                }
                session.put(KEY_AUTH_USER_ID, user_id);
                info!("[ID{}]用户{}登录", request.id(), user_id);
                let path = session.pop_string(KEY_REDIRECT_AFTER_LOGIN);
                if !path.is_empty() {
                    return Response::redirect(&path);
                }
                return Response::redirect("/snippet/create");
            }
            Err(ModelError::InvalidCredentials) => form
                .validator
                .add_non_field_error("Email or password is incorrect"),
            Err(e) => return app.server_error(&request, &e),
        }
    }
    app.render_form(&request, 422, "login.html", &form)
}

pub async fn user_logout_post(app: Arc<Application>, request: Request) -> Response {
    let session = match app.session(&request) {
        Ok(session) => session,
        Err(response) => return response,
    };
    if let Err(e) = app.sessions().renew_token(&session).await {
        return app.server_error(&request, &e);
    }
    session.remove(KEY_AUTH_USER_ID);
    session.put(KEY_FLASH, "You've been logged out successfully!");
    Response::redirect("/")
}

pub async fn account_view(app: Arc<Application>, request: Request) -> Response {
    let user_id = request
        .session()
        .map_or(0, |session| session.get_i64(KEY_AUTH_USER_ID));
    let user = match app.users().get(user_id).await {
        Ok(user) => user,
        Err(ModelError::NoRecord) => return Response::redirect("/user/login"),
        Err(e) => return app.server_error(&request, &e),
    };
    let mut data = app.new_template_data(&request);
    data.user = Some(UserView::from(&user));
    app.render(&request, 200, "account.html", &data)
}

pub async fn account_password_update(app: Arc<Application>, request: Request) -> Response {
    app.render_form(
        &request,
        200,
        "password.html",
        &AccountPasswordUpdateForm::default(),
    )
}

pub async fn account_password_update_post(app: Arc<Application>, request: Request) -> Response {
    let mut form: AccountPasswordUpdateForm = match decode_post_form(&request) {
        Ok(form) => form,
        Err(_) => return app.client_error(400),
    };
    if form.validate() {
        let user_id = request
            .session()
            .map_or(0, |session| session.get_i64(KEY_AUTH_USER_ID));
        match app
            .users()
            .password_update(user_id, &form.current_password, &form.new_password)
            .await
        {
            Ok(()) => {
                if let Some(session) = request.session() {
                    session.put(KEY_FLASH, "Your password has been updated!");
                }
                return Response::redirect("/account/view");
            }
            Err(ModelError::InvalidCredentials) => form
                .validator
                .add_field_error("currentPassword", "Current password is incorrect"),
            Err(e) => return app.server_error(&request, &e),
        }
    }
    app.render_form(&request, 422, "password.html", &form)
}
