// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! 进程内实现，用于测试和 `dsn = "memory"` 的演示部署

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::Mutex;

use super::{
    hash_password_blocking, verify_password_blocking, ModelError, Snippet, SnippetModel, User,
    UserModel,
};

#[derive(Debug, Clone, Default)]
pub struct MemorySnippets {
    rows: Arc<Mutex<Vec<Snippet>>>,
}

impl MemorySnippets {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnippetModel for MemorySnippets {
    async fn insert(&self, title: &str, content: &str, expires: i64) -> Result<i64, ModelError> {
        let mut rows = self.rows.lock().await;
        let id = rows.last().map_or(1, |s| s.id + 1);
        let created = Utc::now();
        rows.push(Snippet {
            id,
            title: title.to_string(),
            content: content.to_string(),
            created,
            expires: created + Duration::days(expires),
        });
        Ok(id)
    }

    async fn get(&self, id: i64) -> Result<Snippet, ModelError> {
        let now = Utc::now();
        self.rows
            .lock()
            .await
            .iter()
            .find(|s| s.id == id && s.expires > now)
            .cloned()
            .ok_or(ModelError::NoRecord)
    }

    async fn latest(&self) -> Result<Vec<Snippet>, ModelError> {
        let now = Utc::now();
        Ok(self
            .rows
            .lock()
            .await
            .iter()
            .rev()
            .filter(|s| s.expires > now)
            .take(10)
            .cloned()
            .collect())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryUsers {
    rows: Arc<Mutex<Vec<User>>>,
}

impl MemoryUsers {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserModel for MemoryUsers {
    async fn insert(&self, name: &str, email: &str, password: &str) -> Result<(), ModelError> {
        let hashed_password = hash_password_blocking(password).await?;
        let mut rows = self.rows.lock().await;
        if rows.iter().any(|u| u.email == email) {
            return Err(ModelError::DuplicateEmail);
        }
        let id = rows.last().map_or(1, |u| u.id + 1);
        rows.push(User {
            id,
            name: name.to_string(),
            email: email.to_string(),
            hashed_password,
            created: Utc::now(),
        });
        Ok(())
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<i64, ModelError> {
        let found = self
            .rows
            .lock()
            .await
            .iter()
            .find(|u| u.email == email)
            .map(|u| (u.id, u.hashed_password.clone()));
        let Some((id, hashed)) = found else {
            return Err(ModelError::InvalidCredentials);
        };
        if verify_password_blocking(&hashed, password).await? {
            Ok(id)
        } else {
            Err(ModelError::InvalidCredentials)
        }
    }

    async fn exists(&self, id: i64) -> Result<bool, ModelError> {
        Ok(self.rows.lock().await.iter().any(|u| u.id == id))
    }

    async fn get(&self, id: i64) -> Result<User, ModelError> {
        self.rows
            .lock()
            .await
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .ok_or(ModelError::NoRecord)
    }

    async fn password_update(
        &self,
        id: i64,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), ModelError> {
        let hashed = self.get(id).await?.hashed_password;
        if !verify_password_blocking(&hashed, current_password).await? {
            return Err(ModelError::InvalidCredentials);
        }
        let new_hashed = hash_password_blocking(new_password).await?;
        let mut rows = self.rows.lock().await;
        let user = rows
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(ModelError::NoRecord)?;
        user.hashed_password = new_hashed;
        Ok(())
    }
}
