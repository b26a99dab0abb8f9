// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use crate::{param::*, util::HtmlBuilder};

use brotli::enc::{self, backward_references::BrotliEncoderParams};
use bytes::Bytes;
use chrono::prelude::*;
use flate2::{
    write::{DeflateEncoder, GzEncoder},
    Compression,
};
use log::{debug, error};

use std::{
    ffi::OsStr,
    io::{self, Write},
    path::Path,
};

/// 小于该长度的响应体不值得压缩
const MIN_COMPRESS_BYTES: usize = 256;

#[derive(Debug, Clone)]
pub struct Response {
    version: HttpVersion,
    status_code: u16,
    information: String,
    content_type: Option<String>,
    date: DateTime<Utc>,
    content_encoding: Option<HttpEncoding>,
    server_name: String,
    /// 除 Content-Type/Content-Encoding/Content-Length/Date/Server 以外的标头，
    /// 允许同名多值（例如多个 Set-Cookie）
    headers: Vec<(String, String)>,
    content: Bytes,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    pub fn new() -> Self {
        Self {
            version: HttpVersion::V1_1,
            status_code: 200,
            information: "OK".to_string(),
            content_type: None,
            date: Utc::now(),
            content_encoding: None,
            server_name: SERVER_NAME.to_string(),
            headers: Vec::new(),
            content: Bytes::new(),
        }
    }

    /// 为状态码生成通用的错误页面，不包含任何内部细节
    pub fn from_status_code(code: u16) -> Self {
        let mut response = Self::new();
        response.set_code(code);
        if code == 204 || code == 304 {
            return response;
        }
        let content = HtmlBuilder::from_status_code(code, None).build();
        response.set_html(content);
        response
    }

    pub fn from_html(code: u16, html: impl Into<Bytes>) -> Self {
        let mut response = Self::new();
        response.set_code(code);
        response.set_html(html);
        response
    }

    pub fn from_text(code: u16, text: &str) -> Self {
        let mut response = Self::new();
        response
            .set_code(code)
            .set_content("text/plain;charset=utf-8", Bytes::copy_from_slice(text.as_bytes()));
        response
    }

    /// 303 See Other 重定向，POST 之后的跳转一律使用该状态码
    pub fn redirect(location: &str) -> Self {
        let mut response = Self::new();
        response.set_code(303).set_header("Location", location);
        response
    }

    pub fn method_not_allowed(allowed: &[HttpRequestMethod]) -> Self {
        let mut response = Self::from_status_code(405);
        response.set_header("Allow", &format_allow(allowed));
        response
    }

    /// 根据扩展名推断 MIME 类型，返回静态资源
    pub fn from_file(path: &str, content: impl Into<Bytes>) -> Self {
        let mime = get_mime(Path::new(path).extension().unwrap_or_default());
        let mut response = Self::new();
        response.set_content(mime, content.into());
        response
    }

    pub fn set_date(&mut self) -> &mut Self {
        self.date = Utc::now();
        self
    }

    pub fn set_code(&mut self, code: u16) -> &mut Self {
        self.status_code = code;
        self.information = match STATUS_CODES.get(&code) {
            Some(&information) => information.to_string(),
            None => {
                error!("非法的状态码：{}。这条错误说明代码编写出现了错误。", code);
                "Unknown".to_string()
            }
        };
        self
    }

    pub fn set_html(&mut self, html: impl Into<Bytes>) -> &mut Self {
        self.set_content("text/html;charset=utf-8", html.into())
    }

    pub fn set_content(&mut self, content_type: &str, content: Bytes) -> &mut Self {
        self.content_type = Some(content_type.to_string());
        self.content_encoding = None;
        self.content = content;
        self
    }

    /// 设置标头，已存在的同名标头（不区分大小写）会被替换
    pub fn set_header(&mut self, name: &str, value: &str) -> &mut Self {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// 追加标头，保留已存在的同名标头
    pub fn append_header(&mut self, name: &str, value: &str) -> &mut Self {
        let duplicate = self
            .headers
            .iter()
            .any(|(n, v)| n.eq_ignore_ascii_case(name) && v == value);
        if !duplicate {
            self.headers.push((name.to_string(), value.to_string()));
        }
        self
    }

    /// 按照客户端支持的编码压缩响应体，已压缩或不适合压缩的内容保持原样
    pub fn encode(&mut self, accept_encoding: &[HttpEncoding], id: u64) -> &mut Self {
        if self.content_encoding.is_some() || self.content.len() < MIN_COMPRESS_BYTES {
            return self;
        }
        let skip = self
            .content_type
            .as_deref()
            .map_or(true, should_skip_compression);
        if skip {
            return self;
        }
        let encoding = decide_encoding(accept_encoding);
        if encoding.is_none() {
            return self;
        }
        match compress(self.content.to_vec(), encoding) {
            Ok(compressed) => {
                self.content = Bytes::from(compressed);
                self.content_encoding = encoding;
                self.append_header("Vary", "Accept-Encoding");
            }
            Err(e) => {
                error!("[ID{}]压缩响应失败: {}，返回未压缩内容", id, e);
            }
        }
        self
    }

    pub fn as_bytes(&self, head_only: bool) -> Vec<u8> {
        let mut header = String::with_capacity(256);
        header.push_str(&format!(
            "{} {} {}{}",
            self.version, self.status_code, self.information, CRLF
        ));
        if let Some(t) = &self.content_type {
            header.push_str(&["Content-Type: ", t, CRLF].concat());
        }
        if let Some(e) = self.content_encoding {
            header.push_str(&format!("Content-Encoding: {}{}", e, CRLF));
        }
        if self.status_code != 204 && self.status_code != 304 {
            header.push_str(&format!("Content-Length: {}{}", self.content.len(), CRLF));
        }
        header.push_str(&["Date: ", &format_date(&self.date), CRLF].concat());
        header.push_str(&["Server: ", &self.server_name, CRLF].concat());
        for (name, value) in &self.headers {
            header.push_str(&[name.as_str(), ": ", value, CRLF].concat());
        }
        header.push_str(CRLF);

        let mut bytes = header.into_bytes();
        if !head_only {
            bytes.extend_from_slice(&self.content);
        }
        bytes
    }
}

impl Response {
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn information(&self) -> &str {
        &self.information
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn content_encoding(&self) -> Option<HttpEncoding> {
        self.content_encoding
    }

    pub fn body(&self) -> &Bytes {
        &self.content
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// 响应要求关闭连接（例如 panic 恢复之后）
    pub fn closes_connection(&self) -> bool {
        self.header("Connection")
            .map_or(false, |v| v.eq_ignore_ascii_case("close"))
    }
}

pub(crate) fn format_date(date: &DateTime<Utc>) -> String {
    date.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

pub(crate) fn format_allow(allowed: &[HttpRequestMethod]) -> String {
    allowed
        .iter()
        .map(|m| m.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn compress(data: Vec<u8>, mode: Option<HttpEncoding>) -> io::Result<Vec<u8>> {
    let original_size = data.len();
    let result = match mode {
        Some(HttpEncoding::Gzip) => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&data)?;
            encoder.finish()
        }
        Some(HttpEncoding::Deflate) => {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&data)?;
            encoder.finish()
        }
        Some(HttpEncoding::Br) => {
            let params = BrotliEncoderParams::default();
            let mut output = Vec::new();
            enc::BrotliCompress(&mut io::Cursor::new(data), &mut output, &params)?;
            Ok(output)
        }
        None => Ok(data),
    };

    if let Ok(ref compressed) = result {
        debug!(
            "压缩完成: {:?}, 原始大小: {} bytes, 压缩后: {} bytes",
            mode,
            original_size,
            compressed.len()
        );
    }

    result
}

fn should_skip_compression(mime_type: &str) -> bool {
    let skip_types = [
        "image/jpeg",
        "image/png",
        "image/gif",
        "image/webp",
        "image/x-icon",
        "font/woff",
        "font/woff2",
    ];

    skip_types
        .iter()
        .any(|&skip_type| mime_type.starts_with(skip_type))
}

/// 优先级：gzip > deflate > br
fn decide_encoding(accept_encoding: &[HttpEncoding]) -> Option<HttpEncoding> {
    [HttpEncoding::Gzip, HttpEncoding::Deflate, HttpEncoding::Br]
        .into_iter()
        .find(|e| accept_encoding.contains(e))
}

fn get_mime(extension: &OsStr) -> &'static str {
    let extension = match extension.to_str() {
        Some(e) => e,
        None => {
            error!("无法将&OsStr转换为&str类型");
            return "application/octet-stream";
        }
    };
    match MIME_TYPES.get(extension.to_ascii_lowercase().as_str()) {
        Some(v) => v,
        None => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(response: &Response) -> String {
        String::from_utf8_lossy(&response.as_bytes(false)).to_string()
    }

    #[test]
    fn test_format_date() {
        let date = Utc.with_ymd_and_hms(2024, 2, 29, 8, 5, 3).unwrap();
        assert_eq!(format_date(&date), "Thu, 29 Feb 2024 08:05:03 GMT");
    }

    #[test]
    fn test_compress_none() {
        let data = b"Hello, World!".to_vec();
        let result = compress(data.clone(), None).unwrap();
        assert_eq!(result, data);
    }

    #[test]
    fn test_compress_gzip() {
        let data = b"Hello, World! This is a test string for compression.".to_vec();
        let result = compress(data.clone(), Some(HttpEncoding::Gzip)).unwrap();

        assert_ne!(result, data);
        assert_eq!(&result[0..2], &[0x1f, 0x8b]);
    }

    #[test]
    fn test_compress_brotli() {
        let data = b"Hello, World! This is a test string for compression.".to_vec();
        let result = compress(data.clone(), Some(HttpEncoding::Br)).unwrap();

        assert_ne!(result, data);
        assert!(!result.is_empty());
    }

    #[test]
    fn test_decide_encoding_priority() {
        assert_eq!(
            decide_encoding(&[HttpEncoding::Br, HttpEncoding::Gzip]),
            Some(HttpEncoding::Gzip)
        );
        assert_eq!(
            decide_encoding(&[HttpEncoding::Br, HttpEncoding::Deflate]),
            Some(HttpEncoding::Deflate)
        );
        assert_eq!(decide_encoding(&[HttpEncoding::Br]), Some(HttpEncoding::Br));
        assert_eq!(decide_encoding(&[]), None);
    }

    #[test]
    fn test_get_mime() {
        assert_eq!(get_mime(OsStr::new("css")), "text/css;charset=utf-8");
        assert_eq!(get_mime(OsStr::new("JS")), "text/javascript;charset=utf-8");
        assert_eq!(get_mime(OsStr::new("png")), "image/png");
        assert_eq!(get_mime(OsStr::new("exe")), "application/octet-stream");
    }

    #[test]
    fn test_response_as_bytes_basic() {
        let mut response = Response::new();
        response.set_header("X-Test", "1");
        let raw = text(&response);
        assert!(raw.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(raw.contains("Content-Length: 0\r\n"));
        assert!(raw.contains("Server: snippetbox\r\n"));
        assert!(raw.contains("X-Test: 1\r\n"));
        assert!(raw.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_head_only_omits_body_but_keeps_length() {
        let response = Response::from_text(200, "OK");
        let raw = String::from_utf8(response.as_bytes(true)).unwrap();
        assert!(raw.contains("Content-Length: 2\r\n"));
        assert!(raw.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_multiple_set_cookie_headers() {
        let mut response = Response::new();
        response
            .append_header("Set-Cookie", "a=1")
            .append_header("Set-Cookie", "b=2")
            .append_header("Vary", "Cookie")
            .append_header("Vary", "Cookie");
        assert_eq!(response.header_values("set-cookie"), vec!["a=1", "b=2"]);
        assert_eq!(response.header_values("Vary").len(), 1);
    }

    #[test]
    fn test_set_header_replaces() {
        let mut response = Response::new();
        response
            .set_header("Cache-Control", "no-cache")
            .set_header("cache-control", "no-store");
        assert_eq!(response.header_values("Cache-Control"), vec!["no-store"]);
    }

    #[test]
    fn test_redirect() {
        let response = Response::redirect("/user/login");
        assert_eq!(response.status_code(), 303);
        assert_eq!(response.information(), "See Other");
        assert_eq!(response.header("Location"), Some("/user/login"));
    }

    #[test]
    fn test_method_not_allowed_lists_methods() {
        let response =
            Response::method_not_allowed(&[HttpRequestMethod::Get, HttpRequestMethod::Head]);
        assert_eq!(response.status_code(), 405);
        assert_eq!(response.header("Allow"), Some("GET, HEAD"));
    }

    #[test]
    fn test_error_page_is_generic() {
        let response = Response::from_status_code(500);
        let body = String::from_utf8_lossy(response.body());
        assert!(body.contains("Internal Server Error"));
        assert_eq!(response.content_type(), Some("text/html;charset=utf-8"));
    }

    #[test]
    fn test_no_content_has_no_length() {
        let raw = text(&Response::from_status_code(204));
        assert!(raw.starts_with("HTTP/1.1 204 No Content\r\n"));
        assert!(!raw.contains("Content-Length"));
    }

    #[test]
    fn test_encode_gzip_for_large_html() {
        let mut response = Response::from_html(200, "<p>snippet</p>".repeat(100));
        response.encode(&[HttpEncoding::Gzip], 0);
        assert_eq!(response.content_encoding(), Some(HttpEncoding::Gzip));
        assert_eq!(&response.body()[0..2], &[0x1f, 0x8b]);
        assert_eq!(response.header("Vary"), Some("Accept-Encoding"));
        assert!(text(&response).contains("Content-Encoding: gzip\r\n"));
    }

    #[test]
    fn test_encode_skips_small_and_binary() {
        let mut small = Response::from_text(200, "OK");
        small.encode(&[HttpEncoding::Gzip], 0);
        assert_eq!(small.content_encoding(), None);

        let mut image = Response::from_file("logo.png", vec![0u8; 4096]);
        image.encode(&[HttpEncoding::Gzip], 0);
        assert_eq!(image.content_encoding(), None);
    }

    #[test]
    fn test_closes_connection() {
        let mut response = Response::new();
        assert!(!response.closes_connection());
        response.set_header("Connection", "close");
        assert!(response.closes_connection());
    }
}
