#![allow(dead_code)]

use std::{net::SocketAddr, sync::Arc, time::Duration};

use application::{
    MessageService, MessageServiceDependencies, SessionManager, SessionManagerDependencies,
    SystemClock,
};
use infrastructure::{BcryptPasswordHasher, InMemoryCredentialRepository, InMemoryMessageRepository};
use reqwest::Client;
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::oneshot, time::sleep};
use tokio_util::sync::CancellationToken;
use web_api::{router, AppState};

pub struct TestServer {
    pub addr: SocketAddr,
    pub client: Client,
    pub shutdown: CancellationToken,
    _stop: oneshot::Sender<()>,
}

impl TestServer {
    pub fn http(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }

    /// 注册用户并返回令牌
    pub async fn register(&self, username: &str, password: &str) -> String {
        let body: Value = self
            .client
            .post(self.http("/api/v1/auth/register"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .expect("register request")
            .json()
            .await
            .expect("register json");
        body["token"].as_str().expect("token").to_owned()
    }

    pub async fn post_message(&self, token: &str, room: &str, content: &str) -> Value {
        self.client
            .post(self.http(&format!("/api/v1/rooms/{room}/messages")))
            .bearer_auth(token)
            .json(&json!({ "content": content }))
            .send()
            .await
            .expect("send request")
            .json()
            .await
            .expect("message json")
    }
}

/// 使用进程内存储启动服务
pub async fn spawn_server() -> TestServer {
    let sessions = Arc::new(SessionManager::new(SessionManagerDependencies {
        credential_repository: Arc::new(InMemoryCredentialRepository::new()),
        password_hasher: Arc::new(BcryptPasswordHasher::new(Some(4))),
        clock: Arc::new(SystemClock),
    }));
    let messages = Arc::new(MessageService::new(MessageServiceDependencies {
        message_repository: Arc::new(InMemoryMessageRepository::default()),
        token_validator: sessions.clone(),
    }));
    let shutdown = CancellationToken::new();
    let app = router(AppState::new(sessions, messages, shutdown.clone()));

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(async {
                let _ = stop_rx.await;
            })
            .await
            .ok();
    });

    // 等待服务器启动
    sleep(Duration::from_millis(50)).await;

    TestServer {
        addr,
        client: Client::new(),
        shutdown,
        _stop: stop_tx,
    }
}
