//! Shared helpers for end-to-end tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tagarela::protocol;
use tagarela::{ChatServer, Logger, ServerConfig};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpListener;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::task::JoinHandle;

pub const TIMEOUT: Duration = Duration::from_secs(2);

pub struct TestServer {
    pub server: Arc<ChatServer>,
    pub addr: SocketAddr,
    pub task: JoinHandle<tagarela::Result<()>>,
}

impl TestServer {
    pub async fn start() -> Self {
        let config = ServerConfig {
            shutdown_grace_ms: 1000,
            ..ServerConfig::default()
        };
        Self::start_with(config).await
    }

    pub async fn start_with(config: ServerConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = Arc::new(ChatServer::new(config, Logger::new()));
        let task = {
            let server = Arc::clone(&server);
            tokio::spawn(async move { server.run_with_listener(listener).await })
        };
        Self { server, addr, task }
    }

    pub async fn connect(&self) -> TestClient {
        TestClient::connect(self.addr).await
    }

    pub async fn stop(self) {
        self.server.shutdown();
        tokio::time::timeout(TIMEOUT, self.task)
            .await
            .expect("server did not stop in time")
            .unwrap()
            .unwrap();
    }
}

pub struct TestClient {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    pub async fn connect(addr: SocketAddr) -> Self {
        let stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        let (read, writer) = stream.into_split();
        Self {
            lines: BufReader::new(read).lines(),
            writer,
        }
    }

    pub async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{}\n", line).as_bytes())
            .await
            .unwrap();
    }

    /// Write bytes as-is, terminator included
    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.unwrap();
    }

    /// Next line, or `None` once the server has closed the connection
    pub async fn recv(&mut self) -> Option<String> {
        tokio::time::timeout(TIMEOUT, self.lines.next_line())
            .await
            .expect("timed out waiting for a line")
            .unwrap()
    }

    pub async fn expect(&mut self, expected: &str) {
        assert_eq!(self.recv().await.as_deref(), Some(expected));
    }

    pub async fn expect_closed(&mut self) {
        assert_eq!(self.recv().await, None);
    }

    /// Assert nothing arrives within `wait`
    pub async fn expect_silence(&mut self, wait: Duration) {
        if let Ok(line) = tokio::time::timeout(wait, self.lines.next_line()).await {
            panic!("unexpected line: {:?}", line);
        }
    }

    /// Answer both prompts; returns the line that follows the password
    pub async fn attempt_login(&mut self, user: &str, password: &str) -> Option<String> {
        self.expect(protocol::USERNAME_PROMPT).await;
        self.send(user).await;
        self.expect(protocol::PASSWORD_PROMPT).await;
        self.send(password).await;
        self.recv().await
    }

    pub async fn login(&mut self, user: &str, password: &str) {
        assert_eq!(
            self.attempt_login(user, password).await,
            Some(protocol::welcome(user))
        );
    }
}
