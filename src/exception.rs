// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 该模块定义了请求处理生命周期与启动阶段中可能出现的各类异常情况。
//!
//! - **协议错误**：请求报文无法解析、方法或版本不受支持、报文超长。
//! - **启动错误**：配置、TLS 证书、模板、路由表或数据库初始化失败。
//!
//! 上层模块负责把协议错误转换为对应的 HTTP 状态码，把启动错误记录后退出进程。

use thiserror::Error;

use crate::{models::ModelError, store::StoreError};

/// 服务器处理请求或启动过程中发生的异常类型。
#[derive(Debug, Error)]
pub enum Exception {
    /// 客户端发送的请求字节流无法解析为合法的 UTF-8 字符串。
    #[error("Request bytes can't be parsed in UTF-8")]
    RequestIsNotUtf8,
    /// 请求行或标头行不符合 HTTP/1.1 语法。
    #[error("Malformed request: {0}")]
    MalformedRequest(String),
    /// 客户端使用了服务器不认识的 HTTP 方法。
    #[error("Unsupported request method")]
    UnSupportedRequestMethod,
    /// 客户端使用了服务器不支持的 HTTP 协议版本（例如 HTTP/0.9 或 HTTP/2 明文）。
    #[error("Unsupported HTTP version")]
    UnsupportedHttpVersion,
    /// 请求使用了分块传输等尚未实现的传输编码。
    #[error("Unsupported transfer encoding")]
    UnsupportedTransferEncoding,
    /// 请求头部超过 `MAX_HEADER_BYTES`。
    #[error("Request header too large")]
    HeaderTooLarge,
    /// 请求体超过配置的 `max_body_bytes`。
    #[error("Request body too large")]
    BodyTooLarge,
    /// 客户端在请求尚未读取完整时关闭了连接。
    #[error("Connection closed before the request was complete")]
    ConnectionClosed,
    /// 表单数据无法解码到目标结构体。
    #[error("Malformed form body: {0}")]
    MalformedForm(String),
    /// 模板缓存中不存在所请求的页面。
    #[error("The template {0} does not exist")]
    TemplateNotFound(String),
    /// 模板文件无法读取或不是合法的 UTF-8。
    #[error("Template file {0} could not be loaded")]
    TemplateSource(String),
    /// 模板解析或渲染失败。
    #[error("Template error: {0}")]
    Template(#[from] liquid::Error),
    /// 路由表注册冲突。
    #[error("Route error: {0}")]
    Route(String),
    /// 配置文件无法读取或解析。
    #[error("Config error: {0}")]
    Config(String),
    /// 证书或私钥无法载入，或 TLS 配置无效。
    #[error("TLS error: {0}")]
    Tls(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Exception {
    /// 协议类错误对应的 HTTP 状态码，非协议错误一律视为服务端错误。
    pub fn status_code(&self) -> u16 {
        match self {
            Exception::RequestIsNotUtf8
            | Exception::MalformedRequest(_)
            | Exception::MalformedForm(_) => 400,
            Exception::UnSupportedRequestMethod | Exception::UnsupportedTransferEncoding => 501,
            Exception::UnsupportedHttpVersion => 505,
            Exception::HeaderTooLarge => 431,
            Exception::BodyTooLarge => 413,
            _ => 500,
        }
    }
}
