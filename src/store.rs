// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 会话存储
//!
//! 会话管理器只通过 [`SessionStore`] 访问持久化层。同一令牌的并发提交以最后一次写入为准。
//! 已过期的记录对 `find` 不可见，与令牌不存在等价。

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, error};
use serde_json::Value;
use sqlx::SqlitePool;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session state could not be (de)serialized: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("session database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// 一条会话记录：键值状态加绝对过期时间
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub state: HashMap<String, Value>,
    pub deadline: DateTime<Utc>,
}

impl SessionRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.deadline <= now
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// 令牌不存在或已过期时返回 `None`
    async fn find(&self, token: &str) -> Result<Option<SessionRecord>, StoreError>;

    /// 插入或覆盖令牌对应的记录
    async fn commit(&self, token: &str, record: &SessionRecord) -> Result<(), StoreError>;

    async fn delete(&self, token: &str) -> Result<(), StoreError>;

    /// 清理所有过期记录，返回删除的条数
    async fn delete_expired(&self) -> Result<u64, StoreError>;
}

/// 进程内存储，适用于测试和单实例部署
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Arc<Mutex<HashMap<String, SessionRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn find(&self, token: &str) -> Result<Option<SessionRecord>, StoreError> {
        let mut records = self.records.lock().await;
        let expired = match records.get(token) {
            Some(record) => record.is_expired(Utc::now()),
            None => return Ok(None),
        };
        if expired {
            records.remove(token);
            return Ok(None);
        }
        Ok(records.get(token).cloned())
    }

    async fn commit(&self, token: &str, record: &SessionRecord) -> Result<(), StoreError> {
        self.records
            .lock()
            .await
            .insert(token.to_string(), record.clone());
        Ok(())
    }

    async fn delete(&self, token: &str) -> Result<(), StoreError> {
        self.records.lock().await.remove(token);
        Ok(())
    }

    async fn delete_expired(&self) -> Result<u64, StoreError> {
        let now = Utc::now();
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|_, record| !record.is_expired(now));
        Ok((before - records.len()) as u64)
    }
}

/// 基于 SQLite 的存储，过期时间以 Unix 秒保存
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// 创建会话表（幂等）
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS sessions (
                token TEXT PRIMARY KEY,
                data TEXT NOT NULL,
                expiry INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS sessions_expiry_idx ON sessions (expiry)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn find(&self, token: &str) -> Result<Option<SessionRecord>, StoreError> {
        let row: Option<(String, i64)> =
            sqlx::query_as("SELECT data, expiry FROM sessions WHERE token = ? AND expiry > ?")
                .bind(token)
                .bind(Utc::now().timestamp())
                .fetch_optional(&self.pool)
                .await?;
        let Some((data, expiry)) = row else {
            return Ok(None);
        };
        let Some(deadline) = DateTime::from_timestamp(expiry, 0) else {
            return Ok(None);
        };
        let state = serde_json::from_str(&data)?;
        Ok(Some(SessionRecord { state, deadline }))
    }

    async fn commit(&self, token: &str, record: &SessionRecord) -> Result<(), StoreError> {
        let data = serde_json::to_string(&record.state)?;
        sqlx::query(
            "INSERT INTO sessions (token, data, expiry) VALUES (?, ?, ?)
             ON CONFLICT(token) DO UPDATE SET data = excluded.data, expiry = excluded.expiry",
        )
        .bind(token)
        .bind(data)
        .bind(record.deadline.timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, token: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_expired(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expiry <= ?")
            .bind(Utc::now().timestamp())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// 定期清理过期会话的后台任务
pub fn spawn_cleanup(
    store: Arc<dyn SessionStore>,
    interval: std::time::Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // 第一次 tick 立即返回
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match store.delete_expired().await {
                Ok(0) => {}
                Ok(n) => debug!("已清理{}条过期会话", n),
                Err(e) => error!("清理过期会话失败：{}", e),
            }
        }
    })
}
