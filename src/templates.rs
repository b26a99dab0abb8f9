// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 模板缓存
//!
//! 启动时一次性编译所有页面。每个页面片段通过 `capture` 定义 `title` 和 `main`，
//! 末尾追加 `{% include "base" %}` 交给共享布局输出，布局再引用各个局部模板。
//! 任意一个文件解析失败，整个缓存构建失败，不会得到半成品。
//!
//! 编译好的 [`liquid::Template`] 只读且可跨线程共享，渲染先写入缓冲区，
//! 成功后才由调用方写出状态码与正文。

use std::{collections::BTreeMap, fs, path::Path};

use include_dir::{include_dir, Dir};
use liquid::{
    partials::{EagerCompiler, InMemorySource},
    ParserBuilder, Template,
};
use log::{debug, error};
use serde_derive::Serialize;

use crate::{
    exception::Exception,
    models::{Snippet, User},
    util::human_date,
};

/// 编译进二进制文件的 `ui/` 目录
pub(crate) static UI: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/ui");

type Partials = EagerCompiler<InMemorySource>;

/// 布局、局部模板与页面的源码
#[derive(Debug, Clone, Default)]
pub struct TemplateFiles {
    base: String,
    partials: BTreeMap<String, String>,
    pages: BTreeMap<String, String>,
}

impl TemplateFiles {
    pub fn new(base: &str) -> Self {
        Self {
            base: base.to_string(),
            ..Default::default()
        }
    }

    /// 局部模板以文件主名为键，例如 `nav`
    pub fn with_partial(mut self, name: &str, source: &str) -> Self {
        self.partials.insert(name.to_string(), source.to_string());
        self
    }

    /// 页面以完整文件名为键，例如 `home.html`
    pub fn with_page(mut self, name: &str, source: &str) -> Self {
        self.pages.insert(name.to_string(), source.to_string());
        self
    }

    pub fn embedded() -> Result<Self, Exception> {
        let base = UI
            .get_file("html/base.html")
            .and_then(|f| f.contents_utf8())
            .ok_or_else(|| Exception::TemplateSource("html/base.html".to_string()))?;
        let mut files = Self::new(base);
        for (dir, is_page) in [("html/partials", false), ("html/pages", true)] {
            let Some(dir) = UI.get_dir(dir) else {
                continue;
            };
            for file in dir.files() {
                let path = file.path();
                if path.extension().and_then(|e| e.to_str()) != Some("html") {
                    continue;
                }
                let source = file
                    .contents_utf8()
                    .ok_or_else(|| Exception::TemplateSource(path.display().to_string()))?;
                files = files.insert(path, source, is_page)?;
            }
        }
        Ok(files)
    }

    /// 从磁盘读取与内嵌目录相同的布局：`base.html`、`partials/`、`pages/`
    pub fn from_dir(root: impl AsRef<Path>) -> Result<Self, Exception> {
        let root = root.as_ref();
        let base_path = root.join("base.html");
        let base = fs::read_to_string(&base_path)
            .map_err(|_| Exception::TemplateSource(base_path.display().to_string()))?;
        let mut files = Self::new(&base);
        for (dir, is_page) in [("partials", false), ("pages", true)] {
            let dir = root.join(dir);
            if !dir.is_dir() {
                continue;
            }
            for entry in fs::read_dir(&dir)? {
                let path = entry?.path();
                if path.extension().and_then(|e| e.to_str()) != Some("html") {
                    continue;
                }
                let source = fs::read_to_string(&path)
                    .map_err(|_| Exception::TemplateSource(path.display().to_string()))?;
                files = files.insert(&path, &source, is_page)?;
            }
        }
        Ok(files)
    }

    fn insert(self, path: &Path, source: &str, is_page: bool) -> Result<Self, Exception> {
        let key = if is_page {
            path.file_name()
        } else {
            path.file_stem()
        };
        let key = key
            .and_then(|k| k.to_str())
            .ok_or_else(|| Exception::TemplateSource(path.display().to_string()))?;
        Ok(if is_page {
            self.with_page(key, source)
        } else {
            self.with_partial(key, source)
        })
    }

    pub fn page_names(&self) -> Vec<&str> {
        self.pages.keys().map(String::as_str).collect()
    }
}

pub struct TemplateCache {
    pages: BTreeMap<String, Template>,
}

impl std::fmt::Debug for TemplateCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateCache")
            .field("pages", &self.pages.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl TemplateCache {
    /// 使用内嵌的 `ui/html` 构建
    pub fn new() -> Result<Self, Exception> {
        Self::build(&TemplateFiles::embedded()?)
    }

    pub fn build(files: &TemplateFiles) -> Result<Self, Exception> {
        // 先逐个检查布局与局部模板，便于定位出错的文件
        let plain = ParserBuilder::with_stdlib().build()?;
        let shared = std::iter::once(("base", &files.base))
            .chain(files.partials.iter().map(|(k, v)| (k.as_str(), v)));
        for (name, source) in shared {
            if let Err(e) = plain.parse(source) {
                error!("模板{}解析失败：{}", name, e);
                return Err(e.into());
            }
        }

        let mut partials = Partials::empty();
        partials.add("base", files.base.clone());
        for (name, source) in &files.partials {
            partials.add(name.clone(), source.clone());
        }
        let parser = ParserBuilder::with_stdlib().partials(partials).build()?;

        let mut pages = BTreeMap::new();
        for (name, source) in &files.pages {
            let unit = format!("{}\n{{% include \"base\" %}}", source);
            match parser.parse(&unit) {
                Ok(template) => {
                    debug!("模板{}已编译", name);
                    pages.insert(name.clone(), template);
                }
                Err(e) => {
                    error!("模板{}解析失败：{}", name, e);
                    return Err(e.into());
                }
            }
        }
        Ok(Self { pages })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.pages.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// 渲染到缓冲区；页面不存在或渲染失败时返回错误，缓冲区随之丢弃
    pub fn render(&self, name: &str, data: &TemplateData) -> Result<Vec<u8>, Exception> {
        let template = self
            .pages
            .get(name)
            .ok_or_else(|| Exception::TemplateNotFound(name.to_string()))?;
        let globals = liquid::to_object(data)?;
        let mut buffer = Vec::with_capacity(4096);
        template.render_to(&mut buffer, &globals)?;
        Ok(buffer)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnippetView {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub created: String,
    pub expires: String,
}

impl From<&Snippet> for SnippetView {
    fn from(snippet: &Snippet) -> Self {
        Self {
            id: snippet.id,
            title: snippet.title.clone(),
            content: snippet.content.clone(),
            created: human_date(&snippet.created),
            expires: human_date(&snippet.expires),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserView {
    pub name: String,
    pub email: String,
    pub created: String,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            name: user.name.clone(),
            email: user.email.clone(),
            created: human_date(&user.created),
        }
    }
}

/// 每次渲染新建的模板数据，所有字段都会序列化，模板中可直接判断
#[derive(Debug, Clone, Default, Serialize)]
pub struct TemplateData {
    pub current_year: i32,
    pub flash: String,
    pub is_authenticated: bool,
    pub csrf_token: String,
    pub snippet: Option<SnippetView>,
    pub snippets: Vec<SnippetView>,
    pub form: Option<serde_json::Value>,
    pub user: Option<UserView>,
}
