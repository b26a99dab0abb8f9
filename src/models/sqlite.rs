// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! SQLite 实现，时间统一以 Unix 秒保存

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;

use super::{
    hash_password_blocking, verify_password_blocking, ModelError, Snippet, SnippetModel, User,
    UserModel,
};

/// 创建片段表与用户表（幂等）
pub async fn migrate(pool: &SqlitePool) -> Result<(), ModelError> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS snippets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            created INTEGER NOT NULL,
            expires INTEGER NOT NULL
        )",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS snippets_created_idx ON snippets (created)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            hashed_password TEXT NOT NULL,
            created INTEGER NOT NULL
        )",
    )
    .execute(pool)
    .await?;
    Ok(())
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

type SnippetRow = (i64, String, String, i64, i64);

fn snippet_from_row((id, title, content, created, expires): SnippetRow) -> Snippet {
    Snippet {
        id,
        title,
        content,
        created: timestamp(created),
        expires: timestamp(expires),
    }
}

#[derive(Debug, Clone)]
pub struct SqliteSnippets {
    pool: SqlitePool,
}

impl SqliteSnippets {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SnippetModel for SqliteSnippets {
    async fn insert(&self, title: &str, content: &str, expires: i64) -> Result<i64, ModelError> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO snippets (title, content, created, expires) VALUES (?, ?, ?, ?)",
        )
        .bind(title)
        .bind(content)
        .bind(now.timestamp())
        .bind((now + Duration::days(expires)).timestamp())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn get(&self, id: i64) -> Result<Snippet, ModelError> {
        let row: Option<SnippetRow> = sqlx::query_as(
            "SELECT id, title, content, created, expires FROM snippets
             WHERE expires > ? AND id = ?",
        )
        .bind(Utc::now().timestamp())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(snippet_from_row).ok_or(ModelError::NoRecord)
    }

    async fn latest(&self) -> Result<Vec<Snippet>, ModelError> {
        let rows: Vec<SnippetRow> = sqlx::query_as(
            "SELECT id, title, content, created, expires FROM snippets
             WHERE expires > ? ORDER BY id DESC LIMIT 10",
        )
        .bind(Utc::now().timestamp())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(snippet_from_row).collect())
    }
}

#[derive(Debug, Clone)]
pub struct SqliteUsers {
    pool: SqlitePool,
}

impl SqliteUsers {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn hashed_password_by_id(&self, id: i64) -> Result<String, ModelError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT hashed_password FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|(hash,)| hash).ok_or(ModelError::NoRecord)
    }
}

#[async_trait]
impl UserModel for SqliteUsers {
    async fn insert(&self, name: &str, email: &str, password: &str) -> Result<(), ModelError> {
        let hashed = hash_password_blocking(password).await?;
        let result = sqlx::query(
            "INSERT INTO users (name, email, hashed_password, created) VALUES (?, ?, ?, ?)",
        )
        .bind(name)
        .bind(email)
        .bind(hashed)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await;
        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(ModelError::DuplicateEmail)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<i64, ModelError> {
        let row: Option<(i64, String)> =
            sqlx::query_as("SELECT id, hashed_password FROM users WHERE email = ?")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        let Some((id, hashed)) = row else {
            return Err(ModelError::InvalidCredentials);
        };
        if verify_password_blocking(&hashed, password).await? {
            Ok(id)
        } else {
            Err(ModelError::InvalidCredentials)
        }
    }

    async fn exists(&self, id: i64) -> Result<bool, ModelError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    async fn get(&self, id: i64) -> Result<User, ModelError> {
        let row: Option<(i64, String, String, String, i64)> = sqlx::query_as(
            "SELECT id, name, email, hashed_password, created FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|(id, name, email, hashed_password, created)| User {
            id,
            name,
            email,
            hashed_password,
            created: timestamp(created),
        })
        .ok_or(ModelError::NoRecord)
    }

    async fn password_update(
        &self,
        id: i64,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), ModelError> {
        let hashed = self.hashed_password_by_id(id).await?;
        if !verify_password_blocking(&hashed, current_password).await? {
            return Err(ModelError::InvalidCredentials);
        }
        let new_hashed = hash_password_blocking(new_password).await?;
        sqlx::query("UPDATE users SET hashed_password = ? WHERE id = ?")
            .bind(new_hashed)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
