// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP/1.1 服务器
//!
//! 每个 TCP 连接一个 tokio 任务，连接内按顺序处理请求（keep-alive）。
//! 每个连接有三个互相独立的计时器：
//!
//! - **空闲**：上一个响应写完之后，等待下一个请求的第一个字节
//! - **读取**：从请求的第一个字节到请求体读取完毕
//! - **写入**：写出整个响应
//!
//! 任意一个超时只关闭当前连接。配置了证书时，TLS 握手计入读取超时。

use std::{
    future::Future,
    net::SocketAddr,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use bytes::{Buf, BytesMut};
use log::{debug, error, info, warn};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpListener,
    time::{sleep, timeout, Instant},
};
use tokio_rustls::TlsAcceptor;

use crate::{
    config::Config,
    exception::Exception,
    middleware::BoxHandler,
    param::{HttpRequestMethod, HttpVersion, MAX_HEADER_BYTES},
    request::Request,
    response::Response,
};

/// 停机后等待在途连接结束的轮询间隔
const DRAIN_POLL: Duration = Duration::from_millis(50);

fn find_head_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|w| w == b"\r\n\r\n")
}

/// 从流中读取一个完整的请求（头部与请求体），多读到的字节留在 `buffer` 中
pub async fn read_request<R>(
    stream: &mut R,
    buffer: &mut BytesMut,
    id: u64,
    max_body_bytes: usize,
) -> Result<Request, Exception>
where
    R: AsyncRead + Unpin,
{
    let head_end = loop {
        // 请求行之前的空行可以忽略（RFC 9112 §2.2）
        while buffer.starts_with(b"\r\n") {
            buffer.advance(2);
        }
        if let Some(pos) = find_head_end(buffer) {
            break pos;
        }
        if buffer.len() > MAX_HEADER_BYTES {
            return Err(Exception::HeaderTooLarge);
        }
        if stream.read_buf(buffer).await? == 0 {
            return Err(Exception::ConnectionClosed);
        }
    };
    if head_end > MAX_HEADER_BYTES {
        return Err(Exception::HeaderTooLarge);
    }

    let head = buffer.split_to(head_end + 4);
    let mut request = Request::try_from(&head, id)?;
    if request.is_chunked() {
        return Err(Exception::UnsupportedTransferEncoding);
    }
    let length = request.content_length()?.unwrap_or(0);
    if length > max_body_bytes {
        return Err(Exception::BodyTooLarge);
    }
    while buffer.len() < length {
        if stream.read_buf(buffer).await? == 0 {
            return Err(Exception::ConnectionClosed);
        }
    }
    request.set_body(buffer.split_to(length).freeze());
    Ok(request)
}

/// 处理单个连接上的全部请求
pub async fn handle_connection<S>(
    mut stream: S,
    addr: SocketAddr,
    handler: BoxHandler,
    config: Arc<Config>,
    next_id: Arc<AtomicU64>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buffer = BytesMut::with_capacity(4096);
    let mut first = true;

    loop {
        // 首个请求的等待计入读取超时，之后的等待计入空闲超时
        let wait = if first {
            config.read_timeout()
        } else {
            config.idle_timeout()
        };
        let request_started = Instant::now();
        if buffer.is_empty() {
            match timeout(wait, stream.read_buf(&mut buffer)).await {
                Err(_) => {
                    debug!("{}连接空闲超时", addr);
                    return;
                }
                Ok(Ok(0)) => return,
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    debug!("{}读取连接失败：{}", addr, e);
                    return;
                }
            }
        }

        let id = next_id.fetch_add(1, Ordering::Relaxed);
        let read_budget = if first {
            config.read_timeout().saturating_sub(request_started.elapsed())
        } else {
            config.read_timeout()
        };
        first = false;

        let read = timeout(
            read_budget,
            read_request(&mut stream, &mut buffer, id, config.max_body_bytes()),
        )
        .await;
        let mut request = match read {
            Err(_) => {
                warn!("[ID{}]读取请求超时，关闭连接", id);
                return;
            }
            Ok(Err(Exception::ConnectionClosed)) => {
                debug!("[ID{}]客户端在请求完整之前关闭了连接", id);
                return;
            }
            Ok(Err(e)) => {
                warn!("[ID{}]无效的请求：{}", id, e);
                let mut response = Response::from_status_code(e.status_code());
                response.set_header("Connection", "close");
                let _ = timeout(
                    config.write_timeout(),
                    stream.write_all(&response.as_bytes(false)),
                )
                .await;
                return;
            }
            Ok(Ok(request)) => request,
        };
        request.set_remote_addr(addr);

        let keep_alive = request.keep_alive();
        let legacy_keep_alive = keep_alive && request.version() == HttpVersion::V1_0;
        let head_only = request.method() == HttpRequestMethod::Head;
        let accept_encoding = request.accept_encoding();

        let mut response = handler.call(request).await;
        response.encode(&accept_encoding, id);
        let close = !keep_alive || response.closes_connection();
        if close {
            response.set_header("Connection", "close");
        } else if legacy_keep_alive {
            response.set_header("Connection", "keep-alive");
        }

        let bytes = response.as_bytes(head_only);
        match timeout(config.write_timeout(), stream.write_all(&bytes)).await {
            Err(_) => {
                warn!("[ID{}]写入响应超时，关闭连接", id);
                return;
            }
            Ok(Err(e)) => {
                debug!("[ID{}]写入响应失败：{}", id, e);
                return;
            }
            Ok(Ok(())) => {}
        }
        if close {
            let _ = stream.shutdown().await;
            return;
        }
    }
}

/// 接受连接直到 `shutdown` 完成，然后等待在途连接结束（最多一个写入超时）。
/// `tls` 为 `Some` 时每个连接先完成 TLS 握手。
pub async fn serve<F>(
    listener: TcpListener,
    tls: Option<TlsAcceptor>,
    handler: BoxHandler,
    config: Arc<Config>,
    shutdown: F,
) -> Result<(), Exception>
where
    F: Future<Output = ()>,
{
    let next_id = Arc::new(AtomicU64::new(0));
    let active = Arc::new(AtomicUsize::new(0));
    let scheme = if tls.is_some() { "https" } else { "http" };
    info!("开始在{}://{}上接受连接", scheme, listener.local_addr()?);

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("收到停机信号，停止接受新连接");
                break;
            }
            accepted = listener.accept() => {
                let (stream, addr) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        error!("接受连接失败：{}", e);
                        continue;
                    }
                };
                if let Err(e) = stream.set_nodelay(true) {
                    debug!("{}设置TCP_NODELAY失败：{}", addr, e);
                }
                let handler = Arc::clone(&handler);
                let config = Arc::clone(&config);
                let next_id = Arc::clone(&next_id);
                let active = Arc::clone(&active);
                let tls = tls.clone();
                tokio::spawn(async move {
                    let count = active.fetch_add(1, Ordering::SeqCst) + 1;
                    debug!("新的连接：{}，当前活跃连接数：{}", addr, count);
                    match tls {
                        Some(acceptor) => {
                            match timeout(config.read_timeout(), acceptor.accept(stream)).await {
                                Ok(Ok(stream)) => {
                                    handle_connection(stream, addr, handler, config, next_id).await
                                }
                                Ok(Err(e)) => debug!("{}TLS握手失败：{}", addr, e),
                                Err(_) => debug!("{}TLS握手超时", addr),
                            }
                        }
                        None => handle_connection(stream, addr, handler, config, next_id).await,
                    }
                    active.fetch_sub(1, Ordering::SeqCst);
                });
            }
        }
    }

    let deadline = Instant::now() + config.write_timeout();
    while active.load(Ordering::SeqCst) > 0 && Instant::now() < deadline {
        sleep(DRAIN_POLL).await;
    }
    let remaining = active.load(Ordering::SeqCst);
    if remaining > 0 {
        warn!("仍有{}个连接未结束，直接退出", remaining);
    }
    info!("服务器已停止");
    Ok(())
}
