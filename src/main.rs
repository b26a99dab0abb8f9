// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # snippetbox
//!
//! 启动流程：
//! - 初始化 log4rs 日志
//! - 载入 TOML 配置（第一个命令行参数，缺省为 `config/development.toml`）
//! - 按配置创建 tokio 多线程运行时
//! - 连接数据库并建表，编译模板，启动过期会话清理任务
//! - 装配路由与处理链，配置了证书时载入 TLS，监听端口直到 Ctrl-C

use std::{process, sync::Arc};

use log::{error, info, warn, LevelFilter};
use sqlx::sqlite::SqlitePoolOptions;
use tokio::{net::TcpListener, runtime::Builder};

use snippetbox::{
    app::Application,
    config::{Config, DEFAULT_CONFIG_PATH},
    exception::Exception,
    models::{
        memory::{MemorySnippets, MemoryUsers},
        sqlite::{self, SqliteSnippets, SqliteUsers},
        SnippetModel, UserModel,
    },
    routes::routes,
    server::serve,
    session::SessionManager,
    store::{spawn_cleanup, MemoryStore, SessionStore, SqliteStore},
    templates::TemplateCache,
    tls,
};

/// `dsn = "memory"` 时所有数据只保存在进程内
const MEMORY_DSN: &str = "memory";

fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = match Config::from_toml(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    let mut log_config =
        match log4rs::config::load_config_file(config.log_config(), Default::default()) {
            Ok(log_config) => log_config,
            Err(e) => {
                eprintln!("无法读取日志配置{}：{}", config.log_config(), e);
                process::exit(1);
            }
        };
    // debug 模式只提高日志级别，不向客户端暴露任何细节
    if config.debug() {
        log_config.root_mut().set_level(LevelFilter::Debug);
    }
    if let Err(e) = log4rs::init_config(log_config) {
        eprintln!("无法初始化日志：{}", e);
        process::exit(1);
    }
    info!("配置文件{}已载入", config_path);

    let runtime = match Builder::new_multi_thread()
        .worker_threads(config.worker_threads())
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("无法创建tokio运行时：{}", e);
            process::exit(1);
        }
    };
    info!("工作线程数：{}", config.worker_threads());

    if let Err(e) = runtime.block_on(run(Arc::new(config))) {
        error!("{}", e);
        process::exit(1);
    }
}

async fn run(config: Arc<Config>) -> Result<(), Exception> {
    let (snippets, users, store): (
        Arc<dyn SnippetModel>,
        Arc<dyn UserModel>,
        Arc<dyn SessionStore>,
    ) = if config.dsn() == MEMORY_DSN {
        info!("使用进程内存储，重启后数据会丢失");
        (
            Arc::new(MemorySnippets::new()),
            Arc::new(MemoryUsers::new()),
            Arc::new(MemoryStore::new()),
        )
    } else {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(config.dsn())
            .await
            .map_err(|e| Exception::Config(format!("无法连接数据库{}：{}", config.dsn(), e)))?;
        sqlite::migrate(&pool).await?;
        let store = SqliteStore::new(pool.clone());
        store.migrate().await?;
        info!("数据库{}已就绪", config.dsn());
        (
            Arc::new(SqliteSnippets::new(pool.clone())),
            Arc::new(SqliteUsers::new(pool)),
            Arc::new(store),
        )
    };

    let templates = Arc::new(TemplateCache::new()?);
    info!("模板缓存已构建，共{}个页面", templates.len());

    let cleanup = spawn_cleanup(Arc::clone(&store), config.session_cleanup_interval());
    let sessions = SessionManager::new(store, config.session_lifetime(), config.secure_cookies());
    let app = Arc::new(Application::new(
        Arc::clone(&config),
        snippets,
        users,
        templates,
        sessions,
    ));
    let handler = routes(&app)?;

    let acceptor = match config.tls() {
        Some((cert, key)) => Some(tls::acceptor(cert, key)?),
        None => {
            if config.secure_cookies() {
                warn!("未配置TLS证书，带Secure属性的Cookie需要前置代理提供HTTPS");
            }
            None
        }
    };

    let listener = TcpListener::bind(config.addr())
        .await
        .map_err(|e| Exception::Config(format!("无法绑定地址{}：{}", config.addr(), e)))?;
    info!("服务端将在{}上监听Socket连接", config.addr());

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("无法监听停机信号：{}", e);
            std::future::pending::<()>().await;
        }
    };
    let result = serve(listener, acceptor, handler, config, shutdown).await;
    cleanup.abort();
    result
}
