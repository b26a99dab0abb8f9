// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 表单
//!
//! 表单结构体从 `application/x-www-form-urlencoded` 请求体解码，
//! 校验结果保存在各自的 `validator` 字段中，重新渲染时原样交给模板。
//! 密码字段永远不会序列化回页面。

use serde::de::DeserializeOwned;
use serde_derive::{Deserialize, Serialize};

use crate::{
    exception::Exception,
    request::Request,
    validator::{self, Validator, EMAIL_RX},
};

const BLANK: &str = "This field cannot be blank";
const INVALID_EMAIL: &str = "This field must be a valid email address";
const TOO_SHORT: &str = "This field must be at least 8 characters long";

/// 把请求体解码为表单结构体；非表单请求按空表单处理
pub fn decode_post_form<T: DeserializeOwned>(request: &Request) -> Result<T, Exception> {
    let body: &[u8] = if request.is_form() {
        request.body()
    } else {
        &[]
    };
    serde_html_form::from_bytes(body).map_err(|e| Exception::MalformedForm(e.to_string()))
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SnippetCreateForm {
    pub title: String,
    pub content: String,
    pub expires: i64,
    #[serde(skip_deserializing)]
    pub validator: Validator,
}

impl Default for SnippetCreateForm {
    fn default() -> Self {
        Self {
            title: String::new(),
            content: String::new(),
            expires: 365,
            validator: Validator::default(),
        }
    }
}

impl SnippetCreateForm {
    pub fn validate(&mut self) -> bool {
        let v = &mut self.validator;
        v.check_field(validator::not_blank(&self.title), "title", BLANK);
        v.check_field(
            validator::max_chars(&self.title, 100),
            "title",
            "This field cannot be more than 100 characters long",
        );
        v.check_field(validator::not_blank(&self.content), "content", BLANK);
        v.check_field(
            validator::permitted_value(&self.expires, &[1, 7, 365]),
            "expires",
            "This field must equal 1, 7 or 365",
        );
        v.valid()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct UserSignupForm {
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    #[serde(skip_deserializing)]
    pub validator: Validator,
}

impl UserSignupForm {
    pub fn validate(&mut self) -> bool {
        let v = &mut self.validator;
        v.check_field(validator::not_blank(&self.name), "name", BLANK);
        v.check_field(validator::not_blank(&self.email), "email", BLANK);
        v.check_field(validator::matches(&self.email, &EMAIL_RX), "email", INVALID_EMAIL);
        v.check_field(validator::not_blank(&self.password), "password", BLANK);
        v.check_field(validator::min_chars(&self.password, 8), "password", TOO_SHORT);
        v.valid()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct UserLoginForm {
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    #[serde(skip_deserializing)]
    pub validator: Validator,
}

impl UserLoginForm {
    pub fn validate(&mut self) -> bool {
        let v = &mut self.validator;
        v.check_field(validator::not_blank(&self.email), "email", BLANK);
        v.check_field(validator::matches(&self.email, &EMAIL_RX), "email", INVALID_EMAIL);
        v.check_field(validator::not_blank(&self.password), "password", BLANK);
        v.valid()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AccountPasswordUpdateForm {
    #[serde(rename = "currentPassword", skip_serializing)]
    pub current_password: String,
    #[serde(rename = "newPassword", skip_serializing)]
    pub new_password: String,
    #[serde(rename = "newPasswordConfirmation", skip_serializing)]
    pub new_password_confirmation: String,
    #[serde(skip_deserializing)]
    pub validator: Validator,
}

impl AccountPasswordUpdateForm {
    pub fn validate(&mut self) -> bool {
        let v = &mut self.validator;
        v.check_field(
            validator::not_blank(&self.current_password),
            "currentPassword",
            BLANK,
        );
        v.check_field(validator::not_blank(&self.new_password), "newPassword", BLANK);
        v.check_field(
            validator::min_chars(&self.new_password, 8),
            "newPassword",
            TOO_SHORT,
        );
        v.check_field(
            validator::not_blank(&self.new_password_confirmation),
            "newPasswordConfirmation",
            BLANK,
        );
        v.check_field(
            self.new_password == self.new_password_confirmation,
            "newPasswordConfirmation",
            "Passwords do not match",
        );
        v.valid()
    }
}
