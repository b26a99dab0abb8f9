// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! `Set-Cookie` 标头的构建。

use std::fmt;

use chrono::{DateTime, Utc};

use crate::response::format_date;

/// `SameSite` 属性取值
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Lax,
    Strict,
}

#[derive(Debug, Clone)]
pub struct SetCookie {
    name: String,
    value: String,
    path: String,
    expires: Option<DateTime<Utc>>,
    max_age: Option<i64>,
    http_only: bool,
    secure: bool,
    same_site: Option<SameSite>,
}

impl SetCookie {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            path: "/".to_string(),
            expires: None,
            max_age: None,
            http_only: true,
            secure: true,
            same_site: Some(SameSite::Lax),
        }
    }

    /// 让浏览器立即删除同名 Cookie
    pub fn removal(name: &str) -> Self {
        let mut cookie = Self::new(name, "");
        cookie.max_age = Some(-1);
        cookie.expires = DateTime::from_timestamp(1, 0);
        cookie
    }

    pub fn expires(mut self, expires: DateTime<Utc>) -> Self {
        self.expires = Some(expires);
        self
    }

    pub fn max_age(mut self, seconds: i64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    pub fn same_site(mut self, same_site: Option<SameSite>) -> Self {
        self.same_site = same_site;
        self
    }
}

impl fmt::Display for SetCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}; Path={}", self.name, self.value, self.path)?;
        if let Some(expires) = &self.expires {
            write!(f, "; Expires={}", format_date(expires))?;
        }
        // Max-Age<0 在 RFC 6265 中等价于 Max-Age=0
        match self.max_age {
            Some(age) if age <= 0 => write!(f, "; Max-Age=0")?,
            Some(age) => write!(f, "; Max-Age={}", age)?,
            None => {}
        }
        if self.http_only {
            write!(f, "; HttpOnly")?;
        }
        if self.secure {
            write!(f, "; Secure")?;
        }
        match self.same_site {
            Some(SameSite::Lax) => write!(f, "; SameSite=Lax"),
            Some(SameSite::Strict) => write!(f, "; SameSite=Strict"),
            None => Ok(()),
        }
    }
}
