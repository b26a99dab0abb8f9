// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use chrono::{DateTime, TimeZone, Utc};

use crate::param::STATUS_CODES;

/// 为错误状态码生成简单的独立 HTML 页面，不依赖模板缓存，
/// 因此模板渲染失败时依然可以返回干净的错误页。
pub struct HtmlBuilder {
    title: String,
    css: String,
    body: String,
}

impl HtmlBuilder {
    pub fn from_status_code(code: u16, note: Option<&str>) -> Self {
        let reason = match STATUS_CODES.get(&code) {
            Some(d) => *d,
            None => {
                panic!("非法的状态码：{}", code);
            }
        };
        let title = format!("{} {}", code, reason);
        let css = r"
            body {
                width: 35em;
                margin: 0 auto;
                font-family: Tahoma, Verdana, Arial, sans-serif;
            }
            "
        .to_string();
        let body = format!(
            r"
            <h1>{}</h1>
            <p>{}</p>
            ",
            code,
            note.unwrap_or(reason)
        );
        Self { title, css, body }
    }

    pub fn build(&self) -> String {
        format!(
            r##"<!DOCTYPE html>
            <html>
                <head>
                    <meta charset="utf-8">
                    <title>{}</title>
                    <style>{}</style>
                </head>
                <body>
                {}
                </body>
            </html>"##,
            self.title, self.css, self.body
        )
    }
}

/// 以 `02 Jan 2006 at 15:04` 的格式输出 UTC 时间
pub fn human_date<Tz: TimeZone>(t: &DateTime<Tz>) -> String {
    t.with_timezone(&Utc)
        .format("%d %b %Y at %H:%M")
        .to_string()
}
