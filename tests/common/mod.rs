//! 测试共用的应用装配与带 Cookie 的进程内客户端

#![allow(dead_code)]

use std::{collections::BTreeMap, sync::Arc};

use lazy_static::lazy_static;
use regex::Regex;

use snippetbox::{
    app::Application,
    config::Config,
    models::memory::{MemorySnippets, MemoryUsers},
    routes::routes,
    session::SessionManager,
    store::MemoryStore,
    templates::TemplateCache,
    BoxHandler, HttpRequestMethod, Request, Response,
};

lazy_static! {
    static ref CSRF_RX: Regex = Regex::new(r#"name="csrf_token" value="([^"]+)""#).unwrap();
}

/// 内存后端、短超时的配置，`extra` 中出现的键覆盖默认值
pub fn test_config(extra: &str) -> Config {
    let defaults = [
        ("dsn", "\"memory\""),
        ("secure_cookies", "true"),
        ("idle_timeout_secs", "2"),
        ("read_timeout_secs", "2"),
        ("write_timeout_secs", "2"),
    ];
    let mut toml = extra.to_string();
    for (key, value) in defaults {
        if !extra.contains(key) {
            toml.push_str(&format!("\n{} = {}", key, value));
        }
    }
    Config::from_toml_str(&toml).unwrap()
}

pub struct TestApp {
    pub app: Arc<Application>,
    pub handler: BoxHandler,
    pub store: MemoryStore,
    pub snippets: MemorySnippets,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config(""))
    }

    pub fn with_config(config: Config) -> Self {
        let config = Arc::new(config);
        let store = MemoryStore::new();
        let snippets = MemorySnippets::new();
        let sessions = SessionManager::new(
            Arc::new(store.clone()),
            config.session_lifetime(),
            config.secure_cookies(),
        );
        let app = Arc::new(Application::new(
            Arc::clone(&config),
            Arc::new(snippets.clone()),
            Arc::new(MemoryUsers::new()),
            Arc::new(TemplateCache::new().unwrap()),
            sessions,
        ));
        let handler = routes(&app).unwrap();
        Self {
            app,
            handler,
            store,
            snippets,
        }
    }

    pub fn client(&self) -> Client {
        Client {
            handler: Arc::clone(&self.handler),
            cookies: BTreeMap::new(),
            next_id: 1,
        }
    }
}

/// 模拟浏览器：保存 Set-Cookie，下次请求时带上
pub struct Client {
    handler: BoxHandler,
    cookies: BTreeMap<String, String>,
    next_id: u64,
}

impl Client {
    pub async fn send(&mut self, request: Request) -> Response {
        let mut request = request.with_id(self.next_id);
        self.next_id += 1;
        if !self.cookies.is_empty() {
            let header = self
                .cookies
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("; ");
            request = request.with_header("Cookie", &header);
        }
        let response = self.handler.call(request).await;
        for set_cookie in response.header_values("Set-Cookie") {
            let mut parts = set_cookie.split(';');
            let Some((name, value)) = parts.next().and_then(|p| p.split_once('=')) else {
                continue;
            };
            if set_cookie.contains("Max-Age=0") {
                self.cookies.remove(name);
            } else {
                self.cookies.insert(name.to_string(), value.to_string());
            }
        }
        response
    }

    pub async fn get(&mut self, uri: &str) -> Response {
        self.send(Request::new(HttpRequestMethod::Get, uri)).await
    }

    pub async fn post_form(&mut self, uri: &str, fields: &[(&str, &str)]) -> Response {
        self.send(Request::new(HttpRequestMethod::Post, uri).with_form(fields))
            .await
    }

    /// 先 GET 表单页拿到令牌，再带令牌提交
    pub async fn submit(&mut self, form_page: &str, action: &str, fields: &[(&str, &str)]) -> Response {
        let page = self.get(form_page).await;
        let token = csrf_token(&page);
        let mut fields = fields.to_vec();
        fields.push(("csrf_token", token.as_str()));
        self.post_form(action, &fields).await
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn set_cookie(&mut self, name: &str, value: &str) {
        self.cookies.insert(name.to_string(), value.to_string());
    }

    pub async fn signup(&mut self, name: &str, email: &str, password: &str) -> Response {
        self.submit(
            "/user/signup",
            "/user/signup",
            &[("name", name), ("email", email), ("password", password)],
        )
        .await
    }

    pub async fn login(&mut self, email: &str, password: &str) -> Response {
        self.submit(
            "/user/login",
            "/user/login",
            &[("email", email), ("password", password)],
        )
        .await
    }

    /// 注册并登录，返回登录响应
    pub async fn signup_and_login(&mut self, email: &str, password: &str) -> Response {
        let response = self.signup("Test User", email, password).await;
        assert_eq!(response.status_code(), 303, "{}", body_text(&response));
        self.login(email, password).await
    }
}

pub fn body_text(response: &Response) -> String {
    String::from_utf8_lossy(response.body()).to_string()
}

pub fn csrf_token(response: &Response) -> String {
    let body = body_text(response);
    CSRF_RX
        .captures(&body)
        .map(|c| c[1].to_string())
        .unwrap_or_else(|| panic!("页面中没有CSRF令牌：{}", body))
}
