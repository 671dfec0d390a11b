//! FTP sessions against a launched netfs instance.

use std::net::SocketAddr;

use netfs::lifecycle::{launch, Launched, ShutdownCoordinator, Trigger};

mod common;

use common::FtpClient;

async fn start(dir: &std::path::Path) -> (Launched, SocketAddr) {
    let launched = launch(&common::test_config(dir)).await.unwrap();
    let ftp = launched.adapters[1].local_addr();
    (launched, ftp)
}

async fn stop(launched: Launched) {
    launched.token.cancel(Trigger::Interrupt);
    ShutdownCoordinator::default()
        .run(launched.adapters, &launched.token, &launched.hook)
        .await;
}

#[tokio::test]
async fn login_navigate_and_list() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("docs")).unwrap();
    std::fs::write(dir.path().join("docs/readme.txt"), b"hello ftp").unwrap();
    let (launched, addr) = start(dir.path()).await;

    let (mut ftp, greeting) = FtpClient::connect(addr).await;
    assert_eq!(greeting, "220 netfs FTP server ready\r\n");
    assert!(ftp.login("admin", "password").await.starts_with("230"));
    assert!(ftp.cmd("SYST").await.starts_with("215"));
    assert!(ftp.cmd("FEAT").await.starts_with("211"));

    assert!(ftp.cmd("CWD docs").await.starts_with("250"));
    assert_eq!(ftp.cmd("PWD").await, "257 \"/docs\" is the current directory\r\n");
    assert!(ftp.cmd("CWD ../../..").await.starts_with("250"));
    assert_eq!(ftp.cmd("PWD").await, "257 \"/\" is the current directory\r\n");
    assert!(ftp.cmd("CWD missing").await.starts_with("550"));

    let (started, listing, done) = ftp.download("LIST docs").await;
    assert!(started.starts_with("150"));
    assert!(done.starts_with("226"));
    let listing = String::from_utf8(listing).unwrap();
    assert!(listing.contains("readme.txt"));
    assert!(listing.starts_with('-'));

    let (_, names, _) = ftp.download("NLST").await;
    assert_eq!(String::from_utf8(names).unwrap(), "docs\r\n");

    assert!(ftp.cmd("SIZE docs/readme.txt").await.starts_with("213 9"));
    assert!(ftp.cmd("QUIT").await.starts_with("221"));

    stop(launched).await;
}

#[tokio::test]
async fn retrieve_and_store_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("down.bin"), b"\x00\x01binary\xff").unwrap();
    let (launched, addr) = start(dir.path()).await;

    let (mut ftp, _) = FtpClient::connect(addr).await;
    ftp.login("admin", "password").await;
    assert!(ftp.cmd("TYPE I").await.starts_with("200"));

    let (started, bytes, done) = ftp.download("RETR down.bin").await;
    assert!(started.starts_with("150"));
    assert!(done.starts_with("226"));
    assert_eq!(bytes, b"\x00\x01binary\xff");

    let (started, done) = ftp.upload("STOR up.txt", b"uploaded").await;
    assert!(started.starts_with("150"));
    assert!(done.starts_with("226"));
    let (_, done) = ftp.upload("APPE up.txt", b" more").await;
    assert!(done.starts_with("226"));
    assert_eq!(
        std::fs::read(dir.path().join("up.txt")).unwrap(),
        b"uploaded more"
    );

    assert!(ftp.cmd("RNFR up.txt").await.starts_with("350"));
    assert!(ftp.cmd("RNTO moved.txt").await.starts_with("250"));
    assert!(dir.path().join("moved.txt").is_file());
    assert!(ftp.cmd("MKD sub").await.starts_with("257"));
    assert!(ftp.cmd("RMD sub").await.starts_with("250"));
    assert!(ftp.cmd("DELE moved.txt").await.starts_with("250"));
    assert!(!dir.path().join("moved.txt").exists());

    assert!(ftp.cmd("RETR ../../etc/passwd").await.starts_with("550"));
    assert!(ftp.cmd("PORT 127,0,0,1,4,1").await.starts_with("502"));
    assert!(ftp.cmd("SITE HELP").await.starts_with("502"));

    stop(launched).await;
}

#[tokio::test]
async fn wrong_password_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let (launched, addr) = start(dir.path()).await;

    let (mut ftp, _) = FtpClient::connect(addr).await;
    assert!(ftp.login("admin", "wrong").await.starts_with("530"));
    assert!(ftp.cmd("LIST").await.starts_with("530"));
    assert!(ftp.cmd("PASS password").await.starts_with("503"));

    stop(launched).await;
}

#[tokio::test]
async fn open_sessions_get_421_on_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let (launched, addr) = start(dir.path()).await;

    let (mut first, _) = FtpClient::connect(addr).await;
    let (mut second, _) = FtpClient::connect(addr).await;
    first.login("admin", "password").await;

    stop(launched).await;
    assert!(first.reply().await.starts_with("421"));
    assert!(second.reply().await.starts_with("421"));
}
