// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 请求处理模块
//!
//! 负责把从 TCP 流中读取到的请求头部字节解析为强类型的 `Request` 结构体，涵盖：
//! 1. 请求行（Request-Line）的解析（方法、路径、查询串、版本）。
//! 2. 全部 HTTP 标头的提取（名称统一转为小写）。
//! 3. Cookie 与内容协商（Accept-Encoding）的解析。
//!
//! 请求体由连接层按 `Content-Length` 读取后通过 [`Request::with_body`] 附加。
//! 中间件在请求上挂载会话句柄、CSRF 令牌与登录状态等请求级上下文。

use std::{net::SocketAddr, sync::Arc};

use bytes::Bytes;
use log::error;

use crate::{exception::Exception, param::*, session::Session};

/// 中间件在请求生命周期内写入的上下文，只在本次请求内可见。
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    session: Option<Session>,
    csrf_token: Option<String>,
    authenticated: bool,
}

/// 表示一个完整的 HTTP 请求。
#[derive(Debug, Clone)]
pub struct Request {
    /// 全局请求 ID，用于日志追踪
    id: u64,
    method: HttpRequestMethod,
    /// 不含查询串的请求路径
    path: String,
    query: Option<String>,
    version: HttpVersion,
    /// (小写名称, 原始值)
    headers: Vec<(String, String)>,
    body: Bytes,
    remote_addr: Option<SocketAddr>,
    /// 路由匹配得到的路径参数
    params: Arc<Vec<(String, String)>>,
    context: RequestContext,
}

impl Request {
    /// 从请求头部字节（包含结尾的空行）构建 `Request` 实例。
    ///
    /// # 逻辑步骤
    /// 1. 验证编码：请求头部必须是合法的 UTF-8。
    /// 2. 解析请求行：方法、请求目标与协议版本，三段缺一不可。
    /// 3. 解析标头：每行必须形如 `Name: value`，名称中不得包含空白。
    ///
    /// # 参数
    /// * `buffer` - 请求头部原始数据。
    /// * `id` - 全局请求 ID，用于在多任务环境下追踪日志。
    pub fn try_from(buffer: &[u8], id: u64) -> Result<Self, Exception> {
        let request_string = match std::str::from_utf8(buffer) {
            Ok(string) => string,
            Err(_) => {
                error!("[ID{}]无法解析HTTP请求", id);
                return Err(Exception::RequestIsNotUtf8);
            }
        };

        let mut request_lines = request_string
            .trim_end_matches(CRLF)
            .split(CRLF);
        let first_line = request_lines.next().unwrap_or_default();

        // 解析请求行 (e.g., "GET /snippet/view/1?x=y HTTP/1.1")
        let first_line_parts: Vec<&str> = first_line.split(' ').collect();
        if first_line_parts.len() != 3 {
            error!("[ID{}]HTTP请求行格式不正确：{}", id, first_line);
            return Err(Exception::MalformedRequest(first_line.to_string()));
        }

        let method: HttpRequestMethod = match first_line_parts[0].parse() {
            Ok(m) => m,
            Err(_) => {
                error!("[ID{}]不支持的HTTP请求方法：{}", id, first_line_parts[0]);
                return Err(Exception::UnSupportedRequestMethod);
            }
        };

        let version: HttpVersion = match first_line_parts[2].parse() {
            Ok(v) => v,
            Err(_) => {
                error!("[ID{}]不支持的HTTP协议版本：{}", id, first_line_parts[2]);
                return Err(Exception::UnsupportedHttpVersion);
            }
        };

        let target = first_line_parts[1];
        if !target.starts_with('/') && !(method == HttpRequestMethod::Options && target == "*") {
            error!("[ID{}]非法的请求目标：{}", id, target);
            return Err(Exception::MalformedRequest(target.to_string()));
        }
        let (path, query) = match target.split_once('?') {
            Some((p, q)) => (p.to_string(), Some(q.to_string())),
            None => (target.to_string(), None),
        };

        let mut headers = Vec::new();
        for line in request_lines {
            let (name, value) = match line.split_once(':') {
                Some(pair) => pair,
                None => {
                    error!("[ID{}]HTTP标头格式不正确：{}", id, line);
                    return Err(Exception::MalformedRequest(line.to_string()));
                }
            };
            if name.is_empty() || name.contains(char::is_whitespace) {
                error!("[ID{}]HTTP标头名称非法：{}", id, name);
                return Err(Exception::MalformedRequest(line.to_string()));
            }
            headers.push((name.to_ascii_lowercase(), value.trim().to_string()));
        }

        Ok(Self {
            id,
            method,
            path,
            query,
            version,
            headers,
            body: Bytes::new(),
            remote_addr: None,
            params: Arc::new(Vec::new()),
            context: RequestContext::default(),
        })
    }

    /// 直接构造请求，供测试与内部调用使用。`uri` 可以包含查询串。
    pub fn new(method: HttpRequestMethod, uri: &str) -> Self {
        let (path, query) = match uri.split_once('?') {
            Some((p, q)) => (p.to_string(), Some(q.to_string())),
            None => (uri.to_string(), None),
        };
        Self {
            id: 0,
            method,
            path,
            query,
            version: HttpVersion::V1_1,
            headers: Vec::new(),
            body: Bytes::new(),
            remote_addr: None,
            params: Arc::new(Vec::new()),
            context: RequestContext::default(),
        }
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = id;
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .push((name.to_ascii_lowercase(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// 以 `application/x-www-form-urlencoded` 编码附加表单数据。
    pub fn with_form(self, fields: &[(&str, &str)]) -> Self {
        let body = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();
        self.with_header("Content-Type", "application/x-www-form-urlencoded")
            .with_body(body)
    }

    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }
}

// --- Getter 访问器实现 ---

impl Request {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn version(&self) -> HttpVersion {
        self.version
    }

    pub fn method(&self) -> HttpRequestMethod {
        self.method
    }

    /// 获取请求路径（不含查询串）
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// 获取完整请求目标（路径 + 查询串），用于日志
    pub fn uri(&self) -> String {
        match &self.query {
            Some(q) => format!("{}?{}", self.path, q),
            None => self.path.clone(),
        }
    }

    /// 按名称（不区分大小写）获取第一个匹配的标头值
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn user_agent(&self) -> &str {
        self.header("user-agent").unwrap_or_default()
    }

    pub fn content_length(&self) -> Result<Option<usize>, Exception> {
        match self.header("content-length") {
            Some(v) => v
                .parse::<usize>()
                .map(Some)
                .map_err(|_| Exception::MalformedRequest(format!("Content-Length: {}", v))),
            None => Ok(None),
        }
    }

    pub fn is_chunked(&self) -> bool {
        self.header("transfer-encoding")
            .map_or(false, |v| v.to_ascii_lowercase().contains("chunked"))
    }

    /// 根据协议版本与 `Connection` 标头判断连接是否保持
    pub fn keep_alive(&self) -> bool {
        let connection = self.header("connection").map(|v| v.to_ascii_lowercase());
        match self.version {
            HttpVersion::V1_1 => connection.as_deref() != Some("close"),
            HttpVersion::V1_0 => connection.as_deref() == Some("keep-alive"),
        }
    }

    /// 获取客户端支持的压缩算法列表
    pub fn accept_encoding(&self) -> Vec<HttpEncoding> {
        let mut accept_encoding = vec![];
        if let Some(encoding) = self.header("accept-encoding") {
            for item in encoding.split(',') {
                let token = item.split(';').next().unwrap_or_default().trim();
                match token {
                    "gzip" => accept_encoding.push(HttpEncoding::Gzip),
                    "deflate" => accept_encoding.push(HttpEncoding::Deflate),
                    "br" => accept_encoding.push(HttpEncoding::Br),
                    _ => {}
                }
            }
        }
        accept_encoding
    }

    /// 从 `Cookie` 标头中读取指定名称的 Cookie 值
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .filter(|(n, _)| n == "cookie")
            .flat_map(|(_, v)| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.trim_matches('"'))
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn is_form(&self) -> bool {
        self.header("content-type").map_or(false, |v| {
            v.to_ascii_lowercase()
                .starts_with("application/x-www-form-urlencoded")
        })
    }

    /// 按字段名读取 URL 编码表单中的第一个值
    pub fn form_value(&self, name: &str) -> Option<String> {
        if !self.is_form() {
            return None;
        }
        form_urlencoded::parse(&self.body)
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// 获取路由匹配得到的路径参数
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_params(&mut self, params: Vec<(String, String)>) {
        self.params = Arc::new(params);
    }

    pub fn set_body(&mut self, body: Bytes) {
        self.body = body;
    }

    pub fn set_remote_addr(&mut self, addr: SocketAddr) {
        self.remote_addr = Some(addr);
    }
}

// --- 请求级上下文 ---

impl Request {
    pub fn session(&self) -> Option<&Session> {
        self.context.session.as_ref()
    }

    pub fn set_session(&mut self, session: Session) {
        self.context.session = Some(session);
    }

    /// 本次请求可嵌入表单的掩码 CSRF 令牌
    pub fn csrf_token(&self) -> &str {
        self.context.csrf_token.as_deref().unwrap_or_default()
    }

    pub fn set_csrf_token(&mut self, token: String) {
        self.context.csrf_token = Some(token);
    }

    pub fn is_authenticated(&self) -> bool {
        self.context.authenticated
    }

    pub fn set_authenticated(&mut self, authenticated: bool) {
        self.context.authenticated = authenticated;
    }
}
