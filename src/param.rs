// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 协议参数与常量模块
//!
//! 该模块定义了 snippetbox 使用的 HTTP 协议常量和强类型枚举，包括：
//! - 常见的 HTTP 状态码及其原因短语（Reason Phrase）。
//! - 静态资源使用到的 MIME 类型映射表。
//! - HTTP 方法、版本及编码格式的强类型枚举。
//! - 会话与 CSRF 使用的 Cookie 名称和会话键名。

use std::{collections::HashMap, fmt, str::FromStr};

use lazy_static::lazy_static;

/// 服务器名称标识，用于 HTTP 响应头的 `Server` 字段
pub const SERVER_NAME: &str = "snippetbox";

/// HTTP 协议规定的换行符（Carriage Return Line Feed）
pub const CRLF: &str = "\r\n";

/// 请求头部（请求行 + 所有标头）允许的最大字节数
pub const MAX_HEADER_BYTES: usize = 8192;

/// 会话令牌所在的 Cookie 名称
pub const SESSION_COOKIE_NAME: &str = "session";

/// CSRF 密钥所在的 Cookie 名称
pub const CSRF_COOKIE_NAME: &str = "csrf_token";

/// 表单中携带掩码 CSRF 令牌的字段名
pub const CSRF_FORM_FIELD: &str = "csrf_token";

/// 以请求头方式提交 CSRF 令牌时使用的标头（小写）
pub const CSRF_HEADER: &str = "x-csrf-token";

/// 会话中保存已登录用户 ID 的键
pub const KEY_AUTH_USER_ID: &str = "authenticatedUserID";

/// 会话中保存一次性提示信息的键
pub const KEY_FLASH: &str = "flash";

/// 会话中保存登录后跳转路径的键
pub const KEY_REDIRECT_AFTER_LOGIN: &str = "redirectAfterLogin";

lazy_static! {
    /// HTTP 状态码与其对应的标准原因短语映射表。
    ///
    /// 参考标准：[RFC 9110: HTTP Semantics](https://www.rfc-editor.org/rfc/rfc9110.html)。
    pub static ref STATUS_CODES: HashMap<u16, &'static str> = {
        let mut map = HashMap::new();
        // 1xx
        map.insert(100, "Continue");

        // 2xx
        map.insert(200, "OK");
        map.insert(201, "Created");
        map.insert(204, "No Content");

        // 3xx
        map.insert(301, "Moved Permanently");
        map.insert(302, "Found");
        map.insert(303, "See Other");
        map.insert(304, "Not Modified");
        map.insert(307, "Temporary Redirect");
        map.insert(308, "Permanent Redirect");

        // 4xx
        map.insert(400, "Bad Request");
        map.insert(401, "Unauthorized");
        map.insert(403, "Forbidden");
        map.insert(404, "Not Found");
        map.insert(405, "Method Not Allowed");
        map.insert(408, "Request Timeout");
        map.insert(411, "Length Required");
        map.insert(413, "Content Too Large");
        map.insert(414, "URI Too Long");
        map.insert(415, "Unsupported Media Type");
        map.insert(422, "Unprocessable Content");
        map.insert(429, "Too Many Requests");
        map.insert(431, "Request Header Fields Too Large");

        // 5xx
        map.insert(500, "Internal Server Error");
        map.insert(501, "Not Implemented");
        map.insert(503, "Service Unavailable");
        map.insert(505, "HTTP Version Not Supported");
        map
    };
}

lazy_static! {
    /// 文件后缀名到 MIME 类型的映射表，仅覆盖 `ui/static` 下会出现的资源类型。
    pub static ref MIME_TYPES: HashMap<&'static str, &'static str> = {
        let mut map = HashMap::new();
        map.insert("css", "text/css;charset=utf-8");
        map.insert("gif", "image/gif");
        map.insert("htm", "text/html;charset=utf-8");
        map.insert("html", "text/html;charset=utf-8");
        map.insert("ico", "image/x-icon");
        map.insert("jpg", "image/jpeg");
        map.insert("jpeg", "image/jpeg");
        map.insert("js", "text/javascript;charset=utf-8");
        map.insert("json", "application/json");
        map.insert("map", "application/json");
        map.insert("otf", "font/otf");
        map.insert("png", "image/png");
        map.insert("svg", "image/svg+xml");
        map.insert("txt", "text/plain;charset=utf-8");
        map.insert("ttf", "font/ttf");
        map.insert("webp", "image/webp");
        map.insert("woff", "font/woff");
        map.insert("woff2", "font/woff2");
        map
    };
}

/// 支持的 HTTP 协议版本
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVersion {
    /// HTTP/1.0 版本，默认不保持连接
    V1_0,
    /// HTTP/1.1 版本
    V1_1,
}

/// 标准 HTTP 请求方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HttpRequestMethod {
    Get,
    Head,
    Options,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpRequestMethod {
    /// 安全方法不会修改服务端状态，因此无需 CSRF 校验
    pub fn is_safe(&self) -> bool {
        matches!(
            self,
            HttpRequestMethod::Get | HttpRequestMethod::Head | HttpRequestMethod::Options
        )
    }
}

/// 支持的内容编码（压缩）格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpEncoding {
    /// GNU zip 压缩
    Gzip,
    /// zlib 压缩
    Deflate,
    /// Brotli 压缩
    Br,
}

impl fmt::Display for HttpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HttpVersion::V1_0 => write!(f, "HTTP/1.0"),
            HttpVersion::V1_1 => write!(f, "HTTP/1.1"),
        }
    }
}

impl FromStr for HttpVersion {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "HTTP/1.0" => Ok(HttpVersion::V1_0),
            "HTTP/1.1" => Ok(HttpVersion::V1_1),
            _ => Err(()),
        }
    }
}

impl fmt::Display for HttpRequestMethod {
    /// 将枚举格式化为 HTTP 标准大写方法名
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            HttpRequestMethod::Get => "GET",
            HttpRequestMethod::Head => "HEAD",
            HttpRequestMethod::Options => "OPTIONS",
            HttpRequestMethod::Post => "POST",
            HttpRequestMethod::Put => "PUT",
            HttpRequestMethod::Patch => "PATCH",
            HttpRequestMethod::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

impl FromStr for HttpRequestMethod {
    type Err = ();

    /// 方法名区分大小写（RFC 9110 §9.1）
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(HttpRequestMethod::Get),
            "HEAD" => Ok(HttpRequestMethod::Head),
            "OPTIONS" => Ok(HttpRequestMethod::Options),
            "POST" => Ok(HttpRequestMethod::Post),
            "PUT" => Ok(HttpRequestMethod::Put),
            "PATCH" => Ok(HttpRequestMethod::Patch),
            "DELETE" => Ok(HttpRequestMethod::Delete),
            _ => Err(()),
        }
    }
}

impl fmt::Display for HttpEncoding {
    /// 将枚举格式化为 `Content-Encoding` 头所使用的标识符
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HttpEncoding::Gzip => write!(f, "gzip"),
            HttpEncoding::Deflate => write!(f, "deflate"),
            HttpEncoding::Br => write!(f, "br"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_round_trip_names() {
        for name in ["GET", "HEAD", "OPTIONS", "POST", "PUT", "PATCH", "DELETE"] {
            let method: HttpRequestMethod = name.parse().unwrap();
            assert_eq!(method.to_string(), name);
        }
    }

    #[test]
    fn test_method_is_case_sensitive() {
        assert!("get".parse::<HttpRequestMethod>().is_err());
        assert!("TRACE".parse::<HttpRequestMethod>().is_err());
    }

    #[test]
    fn test_safe_methods() {
        assert!(HttpRequestMethod::Get.is_safe());
        assert!(HttpRequestMethod::Head.is_safe());
        assert!(HttpRequestMethod::Options.is_safe());
        assert!(!HttpRequestMethod::Post.is_safe());
        assert!(!HttpRequestMethod::Delete.is_safe());
    }

    #[test]
    fn test_version_parse() {
        assert_eq!("HTTP/1.1".parse(), Ok(HttpVersion::V1_1));
        assert_eq!("http/1.0".parse(), Ok(HttpVersion::V1_0));
        assert!("HTTP/2".parse::<HttpVersion>().is_err());
    }

    #[test]
    fn test_status_codes_used_by_pipeline() {
        for code in [200, 204, 303, 400, 403, 404, 405, 413, 422, 500, 501] {
            assert!(STATUS_CODES.contains_key(&code), "缺少状态码 {}", code);
        }
    }
}
