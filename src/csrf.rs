// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # CSRF 防护
//!
//! 采用双重提交方式：32 字节密钥保存在 `csrf_token` Cookie 中，
//! 每次请求向模板暴露一个经过一次性密码本掩码的令牌（`otp || secret ^ otp`），
//! 因此页面上的令牌每次都不同，却都能还原出同一个密钥。
//!
//! 非安全方法必须通过 `X-CSRF-Token` 标头或 `csrf_token` 表单字段提交令牌，
//! 缺失或不匹配时直接返回 403，不会进入业务处理器。

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use log::{debug, warn};
use rand::RngCore;
use subtle::ConstantTimeEq;

use crate::{
    cookie::SetCookie,
    middleware::{Layer, Next},
    param::{CSRF_COOKIE_NAME, CSRF_FORM_FIELD, CSRF_HEADER},
    request::Request,
    response::Response,
};

pub const TOKEN_LENGTH: usize = 32;

/// Cookie 有效期一年
const COOKIE_MAX_AGE: i64 = 365 * 24 * 60 * 60;

pub fn generate_secret() -> [u8; TOKEN_LENGTH] {
    let mut secret = [0u8; TOKEN_LENGTH];
    rand::rng().fill_bytes(&mut secret);
    secret
}

pub fn encode_secret(secret: &[u8; TOKEN_LENGTH]) -> String {
    URL_SAFE_NO_PAD.encode(secret)
}

pub fn decode_secret(value: &str) -> Option<[u8; TOKEN_LENGTH]> {
    let bytes = URL_SAFE_NO_PAD.decode(value).ok()?;
    bytes.try_into().ok()
}

/// 用新的一次性密码本掩码密钥
pub fn mask_token(secret: &[u8; TOKEN_LENGTH]) -> String {
    let mut otp = [0u8; TOKEN_LENGTH];
    rand::rng().fill_bytes(&mut otp);
    let mut masked = Vec::with_capacity(TOKEN_LENGTH * 2);
    masked.extend_from_slice(&otp);
    masked.extend(secret.iter().zip(otp.iter()).map(|(s, o)| s ^ o));
    URL_SAFE_NO_PAD.encode(masked)
}

/// 还原掩码令牌，格式不对时返回 `None`
pub fn unmask_token(token: &str) -> Option<[u8; TOKEN_LENGTH]> {
    let bytes = URL_SAFE_NO_PAD.decode(token.trim()).ok()?;
    if bytes.len() != TOKEN_LENGTH * 2 {
        return None;
    }
    let (otp, masked) = bytes.split_at(TOKEN_LENGTH);
    let mut secret = [0u8; TOKEN_LENGTH];
    for (i, byte) in secret.iter_mut().enumerate() {
        *byte = otp[i] ^ masked[i];
    }
    Some(secret)
}

/// 常数时间比较提交的令牌与密钥
pub fn verify_token(submitted: &str, secret: &[u8; TOKEN_LENGTH]) -> bool {
    match unmask_token(submitted) {
        Some(candidate) => candidate[..].ct_eq(&secret[..]).into(),
        None => false,
    }
}

fn submitted_token(request: &Request) -> Option<String> {
    if let Some(token) = request.header(CSRF_HEADER) {
        return Some(token.to_string());
    }
    request.form_value(CSRF_FORM_FIELD)
}

fn csrf_cookie(secret: &[u8; TOKEN_LENGTH], secure: bool) -> String {
    SetCookie::new(CSRF_COOKIE_NAME, &encode_secret(secret))
        .max_age(COOKIE_MAX_AGE)
        .secure(secure)
        .to_string()
}

pub fn no_surf(secure: bool) -> Layer {
    Layer::from_fn("no_surf", move |mut request: Request, next: Next| async move {
        let id = request.id();
        let (secret, fresh) = match request.cookie(CSRF_COOKIE_NAME).and_then(decode_secret) {
            Some(secret) => (secret, false),
            None => {
                debug!("[ID{}]签发新的CSRF密钥", id);
                (generate_secret(), true)
            }
        };
        request.set_csrf_token(mask_token(&secret));

        if !request.method().is_safe() {
            let valid = submitted_token(&request)
                .map_or(false, |token| verify_token(&token, &secret));
            if fresh || !valid {
                warn!(
                    "[ID{}]CSRF校验失败：{} {}",
                    id,
                    request.method(),
                    request.path()
                );
                let mut response = Response::from_status_code(403);
                response.append_header("Vary", "Cookie");
                if fresh {
                    response.append_header("Set-Cookie", &csrf_cookie(&secret, secure));
                }
                return response;
            }
        }

        let mut response = next.run(request).await;
        response.append_header("Vary", "Cookie");
        if fresh {
            response.append_header("Set-Cookie", &csrf_cookie(&secret, secure));
        }
        response
    })
}
