//! 主应用程序入口
//!
//! 加载配置、组装存储与应用服务，启动 Axum Web API 服务。
//! 配置文件路径取自第一个命令行参数或 `ROOMCHAT_CONFIG` 环境变量。

use std::{env, path::PathBuf, sync::Arc};

use anyhow::Context;
use application::{
    HistorySettings, MessageService, MessageServiceDependencies, SessionManager,
    SessionManagerDependencies, SessionSettings, SystemClock,
};
use config::{AppConfig, StorageBackend};
use infrastructure::{Infrastructure, InfrastructureConfig};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = env::args()
        .nth(1)
        .or_else(|| env::var("ROOMCHAT_CONFIG").ok())
        .map(PathBuf::from);
    let config = AppConfig::load(config_path.as_deref()).context("load configuration")?;

    let infrastructure_config = InfrastructureConfig {
        database_url: config.database.url.clone(),
        max_connections: config.database.max_connections,
        bcrypt_cost: Some(config.session.bcrypt_cost),
        feed_capacity: config.stream.feed_capacity,
    };
    let infrastructure = match config.storage.backend {
        StorageBackend::Postgres => {
            info!(
                "连接数据库: {}",
                config.database.url.rsplit('@').next().unwrap_or("unknown")
            );
            Infrastructure::connect(infrastructure_config)
                .await
                .context("connect postgres storage")?
        }
        StorageBackend::Memory => {
            warn!("使用内存存储，进程退出后数据丢失");
            Infrastructure::in_memory(&infrastructure_config)
        }
    };

    let session_manager = Arc::new(SessionManager::with_settings(
        SessionManagerDependencies {
            credential_repository: infrastructure.credential_repository.clone(),
            password_hasher: infrastructure.password_hasher_trait(),
            clock: Arc::new(SystemClock),
        },
        SessionSettings {
            token_ttl: chrono::Duration::hours(config.session.token_ttl_hours),
        },
    ));

    let message_service = Arc::new(MessageService::with_settings(
        MessageServiceDependencies {
            message_repository: infrastructure.message_repository.clone(),
            token_validator: session_manager.clone(),
        },
        HistorySettings {
            default_limit: config.history.default_limit,
            max_limit: config.history.max_limit,
        },
    ));

    let shutdown = CancellationToken::new();
    let state = AppState::new(session_manager, message_service, shutdown.clone());

    // 启动 Web 服务器
    let app = router(state);
    let address = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("bind {address}"))?;

    info!("聊天室服务器启动在 http://{}", address);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    info!("服务器已停止");
    Ok(())
}

/// 等待 Ctrl+C，随后取消所有派生令牌，使实时流先行关闭
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("收到关闭信号");
    shutdown.cancel();
}
