// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 表单校验
//!
//! 每个表单结构体以具名字段的形式持有一个 [`Validator`]，
//! 处理器逐项调用 `check_field`，最后用 `valid` 决定是否重新渲染表单。

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde_derive::Serialize;

lazy_static! {
    /// 邮箱格式，参考 WHATWG 的 `valid e-mail address` 定义
    pub static ref EMAIL_RX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
    )
    .unwrap();
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct Validator {
    pub non_field_errors: Vec<String>,
    pub field_errors: BTreeMap<String, String>,
}

impl Validator {
    pub fn valid(&self) -> bool {
        self.field_errors.is_empty() && self.non_field_errors.is_empty()
    }

    /// 同一字段只保留第一条错误信息
    pub fn add_field_error(&mut self, key: &str, message: &str) {
        self.field_errors
            .entry(key.to_string())
            .or_insert_with(|| message.to_string());
    }

    pub fn add_non_field_error(&mut self, message: &str) {
        self.non_field_errors.push(message.to_string());
    }

    pub fn check_field(&mut self, ok: bool, key: &str, message: &str) {
        if !ok {
            self.add_field_error(key, message);
        }
    }
}

pub fn not_blank(value: &str) -> bool {
    !value.trim().is_empty()
}

/// 按 Unicode 字符计数，而不是字节
pub fn max_chars(value: &str, n: usize) -> bool {
    value.chars().count() <= n
}

pub fn min_chars(value: &str, n: usize) -> bool {
    value.chars().count() >= n
}

pub fn permitted_value<T: PartialEq>(value: &T, permitted: &[T]) -> bool {
    permitted.contains(value)
}

pub fn matches(value: &str, rx: &Regex) -> bool {
    rx.is_match(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_validator_is_valid() {
        assert!(Validator::default().valid());
    }

    #[test]
    fn test_first_field_error_wins() {
        let mut v = Validator::default();
        v.add_field_error("title", "This field cannot be blank");
        v.add_field_error("title", "This field cannot be more than 100 characters long");
        assert_eq!(
            v.field_errors.get("title").map(String::as_str),
            Some("This field cannot be blank")
        );
        assert!(!v.valid());
    }

    #[test]
    fn test_non_field_error_invalidates() {
        let mut v = Validator::default();
        v.add_non_field_error("Email or password is incorrect");
        assert!(!v.valid());
        assert!(v.field_errors.is_empty());
    }

    #[test]
    fn test_check_field() {
        let mut v = Validator::default();
        v.check_field(true, "a", "never");
        v.check_field(false, "b", "bad");
        assert_eq!(v.field_errors.len(), 1);
        assert!(v.field_errors.contains_key("b"));
    }

    #[test]
    fn test_helpers() {
        assert!(!not_blank("   \t\n"));
        assert!(not_blank(" x "));
        assert!(max_chars("héllo", 5));
        assert!(!max_chars("héllo!", 5));
        assert!(min_chars("12345678", 8));
        assert!(!min_chars("1234567", 8));
        assert!(permitted_value(&7, &[1, 7, 365]));
        assert!(!permitted_value(&0, &[1, 7, 365]));
    }

    #[test]
    fn test_email_rx() {
        assert!(matches("alice@example.com", &EMAIL_RX));
        assert!(matches("bob.o'neil+tag@mail.example.co.uk", &EMAIL_RX));
        assert!(!matches("alice@", &EMAIL_RX));
        assert!(!matches("alice example.com", &EMAIL_RX));
        assert!(!matches("@example.com", &EMAIL_RX));
    }

    proptest! {
        #[test]
        fn prop_max_chars_agrees_with_char_count(s in "\\PC{0,40}", n in 0usize..40) {
            prop_assert_eq!(max_chars(&s, n), s.chars().count() <= n);
        }

        #[test]
        fn prop_valid_iff_no_errors(keys in proptest::collection::vec("[a-z]{1,5}", 0..5)) {
            let mut v = Validator::default();
            for k in &keys {
                v.add_field_error(k, "x");
            }
            prop_assert_eq!(v.valid(), keys.is_empty());
        }
    }
}
