//! Shared utilities for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use netfs::adapter::{FileServer, ProtocolKind, ServerError};
use netfs::NetfsConfig;

/// Config with both listeners on ephemeral loopback ports.
pub fn test_config(root: &Path) -> NetfsConfig {
    let mut config = NetfsConfig::default();
    config.root = root.to_path_buf();
    config.http.bind_address = "127.0.0.1:0".into();
    config.ftp.bind_address = "127.0.0.1:0".into();
    config.shutdown.grace_period_ms = 2_000;
    config.shutdown.service_ack_timeout_ms = 3_000;
    config
}

/// Minimal FTP control-connection client.
pub struct FtpClient {
    control: BufReader<TcpStream>,
}

impl FtpClient {
    /// Connect and consume the greeting.
    pub async fn connect(addr: SocketAddr) -> (Self, String) {
        let stream = TcpStream::connect(addr).await.unwrap();
        let mut client = Self {
            control: BufReader::new(stream),
        };
        let greeting = client.reply().await;
        (client, greeting)
    }

    /// Read one reply, following multi-line replies to their end.
    pub async fn reply(&mut self) -> String {
        let mut first = String::new();
        self.control.read_line(&mut first).await.unwrap();
        if first.len() > 3 && first.as_bytes()[3] == b'-' {
            let end = format!("{} ", &first[..3]);
            loop {
                let mut line = String::new();
                if self.control.read_line(&mut line).await.unwrap() == 0 {
                    break;
                }
                if line.starts_with(&end) {
                    break;
                }
            }
        }
        first
    }

    pub async fn cmd(&mut self, line: &str) -> String {
        self.control
            .get_mut()
            .write_all(format!("{line}\r\n").as_bytes())
            .await
            .unwrap();
        self.reply().await
    }

    pub async fn login(&mut self, user: &str, pass: &str) -> String {
        assert!(self.cmd(&format!("USER {user}")).await.starts_with("331"));
        self.cmd(&format!("PASS {pass}")).await
    }

    /// Enter passive mode and connect to the announced data port.
    pub async fn pasv(&mut self) -> TcpStream {
        let reply = self.cmd("PASV").await;
        assert!(reply.starts_with("227"), "unexpected PASV reply: {reply}");
        let inner = &reply[reply.find('(').unwrap() + 1..reply.find(')').unwrap()];
        let nums: Vec<u16> = inner.split(',').map(|n| n.trim().parse().unwrap()).collect();
        let ip = format!("{}.{}.{}.{}", nums[0], nums[1], nums[2], nums[3]);
        let port = nums[4] * 256 + nums[5];
        TcpStream::connect((ip.as_str(), port)).await.unwrap()
    }

    /// Run a data command and return (preliminary reply, data, final reply).
    pub async fn download(&mut self, line: &str) -> (String, Vec<u8>, String) {
        let mut data = self.pasv().await;
        let started = self.cmd(line).await;
        let mut bytes = Vec::new();
        if started.starts_with("150") {
            data.read_to_end(&mut bytes).await.unwrap();
            let done = self.reply().await;
            return (started, bytes, done);
        }
        (started, bytes, String::new())
    }

    pub async fn upload(&mut self, line: &str, contents: &[u8]) -> (String, String) {
        let mut data = self.pasv().await;
        let started = self.cmd(line).await;
        data.write_all(contents).await.unwrap();
        data.shutdown().await.unwrap();
        drop(data);
        let done = self.reply().await;
        (started, done)
    }
}

/// A server whose serve loop fails when told to.
pub struct FailingServer {
    address: SocketAddr,
    root: PathBuf,
    fail: CancellationToken,
    closed: CancellationToken,
}

impl FailingServer {
    pub fn new(address: SocketAddr) -> Self {
        Self {
            address,
            root: PathBuf::from("/srv/failing"),
            fail: CancellationToken::new(),
            closed: CancellationToken::new(),
        }
    }

    /// Token that makes `serve` return an error when cancelled.
    pub fn fail_token(&self) -> CancellationToken {
        self.fail.clone()
    }
}

#[async_trait]
impl FileServer for FailingServer {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Ftp
    }

    fn local_addr(&self) -> SocketAddr {
        self.address
    }

    fn root(&self) -> &Path {
        &self.root
    }

    async fn serve(&self) -> Result<(), ServerError> {
        tokio::select! {
            _ = self.fail.cancelled() => Err(ServerError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionAborted,
                "injected accept failure",
            ))),
            _ = self.closed.cancelled() => Ok(()),
        }
    }

    async fn close(&self) -> Result<(), ServerError> {
        self.closed.cancel();
        Ok(())
    }
}

/// Poll `f` until it returns true or `timeout` elapses.
pub async fn eventually<F: FnMut() -> bool>(mut f: F, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if f() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    f()
}
