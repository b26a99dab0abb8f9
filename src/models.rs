// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 数据模型
//!
//! 处理器只依赖 [`SnippetModel`] 和 [`UserModel`] 两个 trait，
//! 具体实现有 SQLite 版本（生产）和内存版本（测试与 `dsn = "memory"`）。

pub mod memory;
pub mod sqlite;

use argon2::{
    password_hash::SaltString, Algorithm, Argon2, Params, PasswordHash, PasswordHasher,
    PasswordVerifier, Version,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::RngCore;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("models: no matching record found")]
    NoRecord,
    #[error("models: invalid credentials")]
    InvalidCredentials,
    #[error("models: duplicate email")]
    DuplicateEmail,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("password hash error: {0}")]
    PasswordHash(String),
    #[error("blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Snippet {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub created: DateTime<Utc>,
    pub expires: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub hashed_password: String,
    pub created: DateTime<Utc>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SnippetModel: Send + Sync + 'static {
    /// 插入片段，`expires` 为有效天数，返回新记录的 ID
    async fn insert(&self, title: &str, content: &str, expires: i64) -> Result<i64, ModelError>;

    /// 不存在或已过期时返回 `ModelError::NoRecord`
    async fn get(&self, id: i64) -> Result<Snippet, ModelError>;

    /// 最新的 10 条未过期片段
    async fn latest(&self) -> Result<Vec<Snippet>, ModelError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserModel: Send + Sync + 'static {
    async fn insert(&self, name: &str, email: &str, password: &str) -> Result<(), ModelError>;

    /// 校验邮箱与密码，成功时返回用户 ID
    async fn authenticate(&self, email: &str, password: &str) -> Result<i64, ModelError>;

    async fn exists(&self, id: i64) -> Result<bool, ModelError>;

    async fn get(&self, id: i64) -> Result<User, ModelError>;

    async fn password_update(
        &self,
        id: i64,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), ModelError>;
}

fn hasher() -> Result<Argon2<'static>, ModelError> {
    let params =
        Params::new(15000, 2, 1, None).map_err(|e| ModelError::PasswordHash(e.to_string()))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// 生成 PHC 格式的 argon2id 哈希
pub fn hash_password(password: &str) -> Result<String, ModelError> {
    let mut salt_bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut salt_bytes);
    let salt =
        SaltString::encode_b64(&salt_bytes).map_err(|e| ModelError::PasswordHash(e.to_string()))?;
    let hash = hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| ModelError::PasswordHash(e.to_string()))?;
    Ok(hash.to_string())
}

/// 密码不匹配时返回 `Ok(false)`，哈希本身损坏时返回错误
pub fn verify_password(hashed: &str, candidate: &str) -> Result<bool, ModelError> {
    let parsed = PasswordHash::new(hashed).map_err(|e| ModelError::PasswordHash(e.to_string()))?;
    match hasher()?.verify_password(candidate.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(ModelError::PasswordHash(e.to_string())),
    }
}

/// 在阻塞线程池中计算哈希，避免占用异步工作线程
pub async fn hash_password_blocking(password: &str) -> Result<String, ModelError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || hash_password(&password)).await?
}

pub async fn verify_password_blocking(hashed: &str, candidate: &str) -> Result<bool, ModelError> {
    let hashed = hashed.to_string();
    let candidate = candidate.to_string();
    tokio::task::spawn_blocking(move || verify_password(&hashed, &candidate)).await?
}
