// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! 应用依赖的集合，以及处理器共用的错误响应与渲染辅助函数

use std::{backtrace::Backtrace, fmt::Display, sync::Arc};

use chrono::{Datelike, Utc};
use log::error;
use serde::Serialize;

use crate::{
    config::Config,
    models::{SnippetModel, UserModel},
    param::KEY_FLASH,
    request::Request,
    response::Response,
    session::{Session, SessionManager},
    templates::{TemplateCache, TemplateData},
};

pub struct Application {
    config: Arc<Config>,
    snippets: Arc<dyn SnippetModel>,
    users: Arc<dyn UserModel>,
    templates: Arc<TemplateCache>,
    sessions: SessionManager,
}

impl Application {
    pub fn new(
        config: Arc<Config>,
        snippets: Arc<dyn SnippetModel>,
        users: Arc<dyn UserModel>,
        templates: Arc<TemplateCache>,
        sessions: SessionManager,
    ) -> Self {
        Self {
            config,
            snippets,
            users,
            templates,
            sessions,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn snippets(&self) -> &dyn SnippetModel {
        self.snippets.as_ref()
    }

    pub fn users(&self) -> &Arc<dyn UserModel> {
        &self.users
    }

    pub fn templates(&self) -> &TemplateCache {
        &self.templates
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// 记录错误与调用栈，客户端只看到通用的 500 页面
    pub fn server_error(&self, request: &Request, err: &dyn Display) -> Response {
        error!(
            "[ID{}]{} {}：{}\n{}",
            request.id(),
            request.method(),
            request.path(),
            err,
            Backtrace::force_capture()
        );
        Response::from_status_code(500)
    }

    pub fn client_error(&self, status: u16) -> Response {
        Response::from_status_code(status)
    }

    pub fn not_found(&self) -> Response {
        self.client_error(404)
    }

    /// 动态处理链保证会话已加载，缺失时视为服务端错误
    pub fn session(&self, request: &Request) -> Result<Session, Response> {
        request
            .session()
            .cloned()
            .ok_or_else(|| self.server_error(request, &"会话未加载"))
    }

    /// 每次渲染新建模板数据，同时取出一次性的 flash 消息
    pub fn new_template_data(&self, request: &Request) -> TemplateData {
        TemplateData {
            current_year: Utc::now().year(),
            flash: request
                .session()
                .map(|session| session.pop_string(KEY_FLASH))
                .unwrap_or_default(),
            is_authenticated: request.is_authenticated(),
            csrf_token: request.csrf_token().to_string(),
            ..Default::default()
        }
    }

    /// 先完整渲染到缓冲区，成功后才写出状态码与正文
    pub fn render(
        &self,
        request: &Request,
        status: u16,
        page: &str,
        data: &TemplateData,
    ) -> Response {
        match self.templates.render(page, data) {
            Ok(body) => Response::from_html(status, body),
            Err(e) => self.server_error(request, &e),
        }
    }

    /// 带表单回填的渲染，表单序列化失败属于服务端错误
    pub fn render_form<T: Serialize>(
        &self,
        request: &Request,
        status: u16,
        page: &str,
        form: &T,
    ) -> Response {
        let mut data = self.new_template_data(request);
        data.form = match serde_json::to_value(form) {
            Ok(value) => Some(value),
            Err(e) => return self.server_error(request, &e),
        };
        self.render(request, status, page, &data)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        forms::SnippetCreateForm,
        models::memory::{MemorySnippets, MemoryUsers},
        param::HttpRequestMethod,
        store::MemoryStore,
    };

    struct BrokenForm;

    impl Serialize for BrokenForm {
        fn serialize<S: serde::Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("无法序列化"))
        }
    }

    fn application() -> Application {
        Application::new(
            Arc::new(Config::new()),
            Arc::new(MemorySnippets::new()),
            Arc::new(MemoryUsers::new()),
            Arc::new(TemplateCache::new().unwrap()),
            SessionManager::new(
                Arc::new(MemoryStore::new()),
                Duration::from_secs(60),
                true,
            ),
        )
    }

    #[test]
    fn test_render_form() {
        let app = application();
        let request = Request::new(HttpRequestMethod::Get, "/snippet/create");
        let form = SnippetCreateForm::default();
        let response = app.render_form(&request, 200, "create.html", &form);
        assert_eq!(response.status_code(), 200);
    }

    #[test]
    fn test_render_form_serialization_failure_is_server_error() {
        let app = application();
        let request = Request::new(HttpRequestMethod::Post, "/snippet/create");
        let response = app.render_form(&request, 422, "create.html", &BrokenForm);
        assert_eq!(response.status_code(), 500);
    }

    #[test]
    fn test_unknown_page_is_server_error() {
        let app = application();
        let request = Request::new(HttpRequestMethod::Get, "/");
        let data = app.new_template_data(&request);
        assert_eq!(app.render(&request, 200, "missing.html", &data).status_code(), 500);
    }
}
