// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 会话管理
//!
//! 每个请求内的会话生命周期：`NoSession → Loaded → 0..n 次修改 → Saved`。
//!
//! - 令牌为 32 字节随机数的 URL 安全 Base64 编码，首次提交时生成。
//! - 过期的会话与不存在的会话等价，加载时得到一个全新的空会话。
//! - 权限变化（登录、登出）之前调用 [`SessionManager::renew_token`]，旧令牌立即作废。

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use log::{debug, error};
use rand::RngCore;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    cookie::SetCookie,
    middleware::{Layer, Next},
    param::SESSION_COOKIE_NAME,
    request::Request,
    response::Response,
    store::{SessionRecord, SessionStore, StoreError},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Unmodified,
    Modified,
    Destroyed,
}

#[derive(Debug)]
struct SessionData {
    token: Option<String>,
    state: HashMap<String, Value>,
    deadline: DateTime<Utc>,
    status: SessionStatus,
}

/// 请求级的会话句柄，克隆后共享同一份数据
#[derive(Clone)]
pub struct Session {
    inner: Arc<Mutex<SessionData>>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.lock();
        f.debug_struct("Session")
            .field("keys", &data.state.keys().collect::<Vec<_>>())
            .field("deadline", &data.deadline)
            .field("status", &data.status)
            .finish()
    }
}

impl Session {
    fn new(token: Option<String>, state: HashMap<String, Value>, deadline: DateTime<Utc>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionData {
                token,
                state,
                deadline,
                status: SessionStatus::Unmodified,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionData> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn put(&self, key: &str, value: impl Into<Value>) {
        let mut data = self.lock();
        data.state.insert(key.to_string(), value.into());
        data.status = SessionStatus::Modified;
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let data = self.lock();
        let value = data.state.get(key)?.clone();
        serde_json::from_value(value).ok()
    }

    /// 键不存在或不是字符串时返回空串
    pub fn get_string(&self, key: &str) -> String {
        self.get::<String>(key).unwrap_or_default()
    }

    /// 键不存在或不是整数时返回 0
    pub fn get_i64(&self, key: &str) -> i64 {
        self.get::<i64>(key).unwrap_or_default()
    }

    /// 读取后删除，键不存在时不标记修改
    pub fn pop<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut data = self.lock();
        let value = data.state.remove(key)?;
        data.status = SessionStatus::Modified;
        serde_json::from_value(value).ok()
    }

    pub fn pop_string(&self, key: &str) -> String {
        self.pop::<String>(key).unwrap_or_default()
    }

    pub fn remove(&self, key: &str) {
        let mut data = self.lock();
        if data.state.remove(key).is_some() {
            data.status = SessionStatus::Modified;
        }
    }

    pub fn exists(&self, key: &str) -> bool {
        self.lock().state.contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock().state.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn status(&self) -> SessionStatus {
        self.lock().status
    }

    pub fn token(&self) -> Option<String> {
        self.lock().token.clone()
    }

    pub fn deadline(&self) -> DateTime<Utc> {
        self.lock().deadline
    }
}

/// 生成 32 字节随机令牌（URL 安全 Base64，无填充）
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    lifetime: Duration,
    cookie_name: String,
    secure: bool,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, lifetime: Duration, secure: bool) -> Self {
        Self {
            store,
            lifetime,
            cookie_name: SESSION_COOKIE_NAME.to_string(),
            secure,
        }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    fn fresh_deadline(&self) -> DateTime<Utc> {
        Utc::now() + chrono::Duration::seconds(self.lifetime.as_secs() as i64)
    }

    /// 按令牌恢复会话；令牌缺失、未知或过期时返回新的空会话
    pub async fn load(&self, token: Option<&str>) -> Result<Session, StoreError> {
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            if let Some(record) = self.store.find(token).await? {
                return Ok(Session::new(
                    Some(token.to_string()),
                    record.state,
                    record.deadline,
                ));
            }
        }
        Ok(Session::new(None, HashMap::new(), self.fresh_deadline()))
    }

    /// 作废旧令牌，为同一份会话内容签发新令牌并重置过期时间
    pub async fn renew_token(&self, session: &Session) -> Result<(), StoreError> {
        let old = session.token();
        if let Some(old) = old {
            self.store.delete(&old).await?;
        }
        let mut data = session.lock();
        data.token = Some(generate_token());
        data.deadline = self.fresh_deadline();
        data.status = SessionStatus::Modified;
        Ok(())
    }

    /// 删除存储中的会话并清空内容，响应中的 Cookie 将被删除
    pub async fn destroy(&self, session: &Session) -> Result<(), StoreError> {
        if let Some(token) = session.token() {
            self.store.delete(&token).await?;
        }
        let mut data = session.lock();
        data.state.clear();
        data.token = None;
        data.status = SessionStatus::Destroyed;
        Ok(())
    }

    /// 按会话状态提交到存储并写入 Cookie
    pub async fn save(&self, session: &Session, response: &mut Response) -> Result<(), StoreError> {
        let (status, token, record) = {
            let mut data = session.lock();
            if data.status == SessionStatus::Modified && data.token.is_none() {
                data.token = Some(generate_token());
            }
            let record = SessionRecord {
                state: data.state.clone(),
                deadline: data.deadline,
            };
            (data.status, data.token.clone(), record)
        };

        match (status, token) {
            (SessionStatus::Modified, Some(token)) => {
                self.store.commit(&token, &record).await?;
                let cookie = SetCookie::new(&self.cookie_name, &token)
                    .expires(record.deadline)
                    .max_age(self.lifetime.as_secs() as i64)
                    .secure(self.secure);
                response
                    .append_header("Set-Cookie", &cookie.to_string())
                    .append_header("Vary", "Cookie")
                    .append_header("Cache-Control", r#"no-cache="Set-Cookie""#);
            }
            (SessionStatus::Destroyed, _) => {
                let cookie = SetCookie::removal(&self.cookie_name).secure(self.secure);
                response
                    .append_header("Set-Cookie", &cookie.to_string())
                    .append_header("Vary", "Cookie")
                    .append_header("Cache-Control", r#"no-cache="Set-Cookie""#);
            }
            _ => {}
        }
        Ok(())
    }

    /// 加载会话、挂到请求上、调用下游，并在返回途中保存会话
    pub fn load_and_save(&self) -> Layer {
        let manager = self.clone();
        Layer::from_fn("load_and_save", move |mut request: Request, next: Next| {
            let manager = manager.clone();
            async move {
                let id = request.id();
                let token = request.cookie(&manager.cookie_name).map(str::to_string);
                let session = match manager.load(token.as_deref()).await {
                    Ok(session) => session,
                    Err(e) => {
                        error!("[ID{}]加载会话失败：{}", id, e);
                        return Response::from_status_code(500);
                    }
                };
                debug!("[ID{}]会话已加载：{:?}", id, session);
                request.set_session(session.clone());

                let mut response = next.run(request).await;
                response.append_header("Vary", "Cookie");
                if let Err(e) = manager.save(&session, &mut response).await {
                    error!("[ID{}]保存会话失败：{}", id, e);
                    return Response::from_status_code(500);
                }
                response
            }
        })
    }
}
