// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # panic 恢复
//!
//! 最外层中间件。内部处理链在 `catch_unwind` 中轮询，panic 被转换为 500 响应，
//! 并带上 `Connection: close`，服务器写完响应后关闭该连接。
//!
//! 进程级 panic 钩子只在恢复作用域内记录位置与调用栈，交由错误日志输出；
//! 作用域之外的 panic 仍交给原来的钩子处理。

use std::{
    any::Any,
    backtrace::Backtrace,
    cell::{Cell, RefCell},
    future::{poll_fn, Future},
    panic::{self, AssertUnwindSafe},
    sync::Once,
};

use futures_util::FutureExt;
use log::error;

use crate::{
    middleware::{Layer, Next},
    request::Request,
    response::Response,
};

struct PanicReport {
    location: String,
    backtrace: String,
}

thread_local! {
    static RECOVERY_DEPTH: Cell<usize> = const { Cell::new(0) };
    static LAST_PANIC: RefCell<Option<PanicReport>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

/// 安装进程级 panic 钩子，重复调用无副作用
pub fn install_panic_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if RECOVERY_DEPTH.with(Cell::get) == 0 {
                previous(info);
                return;
            }
            let location = info
                .location()
                .map(|l| l.to_string())
                .unwrap_or_else(|| "<unknown>".to_string());
            let report = PanicReport {
                location,
                backtrace: Backtrace::force_capture().to_string(),
            };
            LAST_PANIC.with(|last| *last.borrow_mut() = Some(report));
        }));
    });
}

struct RecoveryScope;

impl RecoveryScope {
    fn enter() -> Self {
        RECOVERY_DEPTH.with(|depth| depth.set(depth.get() + 1));
        RecoveryScope
    }
}

impl Drop for RecoveryScope {
    fn drop(&mut self) {
        RECOVERY_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}

/// 轮询 `future`，其中发生的 panic 以 `Err(消息)` 返回
async fn guarded<F>(future: F) -> Result<F::Output, String>
where
    F: Future + Send,
{
    let mut future = Box::pin(future);
    let polled = poll_fn(move |cx| {
        let _scope = RecoveryScope::enter();
        future.as_mut().poll(cx)
    });
    AssertUnwindSafe(polled)
        .catch_unwind()
        .await
        .map_err(|payload| panic_message(&*payload))
}

pub fn recover_panic() -> Layer {
    install_panic_hook();
    Layer::from_fn("recover_panic", |request: Request, next: Next| async move {
        let id = request.id();
        match guarded(next.run(request)).await {
            Ok(response) => response,
            Err(message) => {
                let report = LAST_PANIC.with(|last| last.borrow_mut().take());
                match report {
                    Some(report) => error!(
                        "[ID{}]处理请求时发生panic：{}，位置：{}\n{}",
                        id, message, report.location, report.backtrace
                    ),
                    None => error!("[ID{}]处理请求时发生panic：{}", id, message),
                }
                let mut response = Response::from_status_code(500);
                response.set_header("Connection", "close");
                response
            }
        }
    })
}
