//! One FTP control connection.
//!
//! # Responsibilities
//! - Greet, authenticate and dispatch commands line by line
//! - Open passive data connections for LIST, NLST, RETR, STOR and APPE
//! - Answer `421` and hang up when the server closes
//!
//! # Design Decisions
//! - The close token is checked both while waiting for a command and while
//!   a command (including a transfer) runs, so shutdown never waits on a
//!   slow client
//! - Filesystem errors become `550` or `426` replies; only control-connection
//!   I/O errors end the session

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use crate::ftp::auth::Credentials;
use crate::ftp::command::{loggable, parse_command, Command};
use crate::ftp::listing;
use crate::ftp::path::VirtualPath;
use crate::ftp::reply::{self, Reply};
use crate::net::connection::SessionId;

const MAX_COMMAND_LENGTH: usize = 512;

/// Settings shared by every session of one server.
#[derive(Debug)]
pub(crate) struct SessionContext {
    pub root: PathBuf,
    pub credentials: Credentials,
    pub greeting: String,
    pub data_timeout: Duration,
}

/// Whether the control loop keeps reading.
enum Flow {
    Continue,
    Quit,
}

/// Result of reading one control line.
#[derive(Debug, PartialEq, Eq)]
enum LineRead {
    Line,
    TooLong,
    Closed,
}

/// Line reader for the control connection. At most `MAX_COMMAND_LENGTH + 1`
/// bytes of a line are ever buffered; the rest of an oversized line is
/// consumed and dropped before the next command is read.
struct CommandReader<R> {
    inner: R,
    discarding: bool,
}

impl<R: AsyncBufRead + Unpin> CommandReader<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            discarding: false,
        }
    }

    async fn next_line(&mut self, line: &mut Vec<u8>) -> io::Result<LineRead> {
        line.clear();
        if self.discarding {
            if !self.skip_line().await? {
                return Ok(LineRead::Closed);
            }
            self.discarding = false;
        }

        let limit = MAX_COMMAND_LENGTH as u64 + 1;
        let read = (&mut self.inner).take(limit).read_until(b'\n', line).await?;
        if read == 0 {
            return Ok(LineRead::Closed);
        }
        if line.len() > MAX_COMMAND_LENGTH {
            self.discarding = line.last() != Some(&b'\n');
            return Ok(LineRead::TooLong);
        }
        Ok(LineRead::Line)
    }

    /// Consume input through the next `\n`. Returns false on EOF.
    async fn skip_line(&mut self) -> io::Result<bool> {
        loop {
            let buf = self.inner.fill_buf().await?;
            if buf.is_empty() {
                return Ok(false);
            }
            match buf.iter().position(|&b| b == b'\n') {
                Some(end) => {
                    self.inner.consume(end + 1);
                    return Ok(true);
                }
                None => {
                    let len = buf.len();
                    self.inner.consume(len);
                }
            }
        }
    }
}

pub(crate) struct Session {
    id: SessionId,
    ctx: Arc<SessionContext>,
    reader: CommandReader<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
    local_ip: IpAddr,
    pending_user: Option<String>,
    logged_in: bool,
    cwd: VirtualPath,
    rename_from: Option<VirtualPath>,
    passive: Option<TcpListener>,
}

impl Session {
    pub fn new(id: SessionId, stream: TcpStream, ctx: Arc<SessionContext>) -> io::Result<Self> {
        let local_ip = stream.local_addr()?.ip();
        let (read_half, writer) = stream.into_split();
        Ok(Self {
            id,
            ctx,
            reader: CommandReader::new(BufReader::new(read_half)),
            writer,
            local_ip,
            pending_user: None,
            logged_in: false,
            cwd: VirtualPath::root(),
            rename_from: None,
            passive: None,
        })
    }

    /// Run until the client quits, disconnects, or `cancel` fires.
    pub async fn run(mut self, cancel: CancellationToken) -> io::Result<()> {
        let greeting = self.ctx.greeting.clone();
        self.reply(Reply::new(reply::READY, greeting)).await?;

        let mut line = Vec::new();
        loop {
            let read = tokio::select! {
                _ = cancel.cancelled() => None,
                read = self.reader.next_line(&mut line) => Some(read?),
            };
            match read {
                None => return self.closing().await,
                Some(LineRead::Closed) => {
                    tracing::debug!(session = %self.id, "Client closed control connection");
                    return Ok(());
                }
                Some(LineRead::TooLong) => {
                    self.reply(Reply::new(reply::SYNTAX_ERROR, "Command too long"))
                        .await?;
                    continue;
                }
                Some(LineRead::Line) => {}
            }

            let raw = String::from_utf8_lossy(&line).into_owned();
            tracing::info!(session = %self.id, "> {}", loggable(&raw));
            let command = parse_command(&raw);

            let flow = tokio::select! {
                _ = cancel.cancelled() => None,
                flow = self.dispatch(command) => Some(flow?),
            };
            match flow {
                None => return self.closing().await,
                Some(Flow::Quit) => return Ok(()),
                Some(Flow::Continue) => {}
            }
        }
    }

    async fn closing(&mut self) -> io::Result<()> {
        tracing::debug!(session = %self.id, "Closing session for shutdown");
        self.reply(Reply::new(
            reply::SERVICE_NOT_AVAILABLE,
            "Service closing control connection",
        ))
        .await
    }

    async fn reply(&mut self, reply: Reply) -> io::Result<()> {
        tracing::debug!(session = %self.id, "< {} {}", reply.code, reply.text());
        self.writer.write_all(reply.to_wire().as_bytes()).await?;
        self.writer.flush().await
    }

    async fn dispatch(&mut self, command: Command) -> io::Result<Flow> {
        if !self.logged_in && !command.allowed_before_login() {
            self.reply(Reply::new(reply::NOT_LOGGED_IN, "Please login with USER and PASS"))
                .await?;
            return Ok(Flow::Continue);
        }

        match command {
            Command::User(name) => self.user(name).await?,
            Command::Pass(password) => self.pass(password).await?,
            Command::Syst => {
                self.reply(Reply::new(reply::SYSTEM_TYPE, "UNIX Type: L8"))
                    .await?
            }
            Command::Feat => {
                let features = ["Features:", "EPSV", "MDTM", "PASV", "SIZE", "UTF8", "End"];
                self.reply(Reply::multiline(
                    reply::SYSTEM_STATUS,
                    features.iter().map(|f| f.to_string()).collect(),
                ))
                .await?
            }
            Command::Opts(option) => {
                let answer = if option.trim().eq_ignore_ascii_case("UTF8 ON") {
                    Reply::new(reply::OK, "UTF8 mode enabled")
                } else {
                    Reply::new(reply::ARGUMENT_ERROR, "Option not understood")
                };
                self.reply(answer).await?
            }
            Command::Noop => self.reply(Reply::new(reply::OK, "OK")).await?,
            Command::Pwd => {
                let text = format!("{} is the current directory", quote(&self.cwd));
                self.reply(Reply::new(reply::PATH_CREATED, text)).await?
            }
            Command::Cwd(arg) => self.cwd(arg).await?,
            Command::Cdup => {
                self.cwd = self.cwd.parent();
                let text = format!("Directory changed to {}", self.cwd);
                self.reply(Reply::new(reply::FILE_ACTION_OK, text)).await?
            }
            Command::Type(kind) => {
                let answer = match kind.trim().to_ascii_uppercase().as_str() {
                    "A" | "A N" => Reply::new(reply::OK, "Type set to A"),
                    "I" | "L 8" => Reply::new(reply::OK, "Type set to I"),
                    _ => Reply::new(reply::PARAMETER_NOT_IMPLEMENTED, "Type not supported"),
                };
                self.reply(answer).await?
            }
            Command::Mode(mode) => {
                self.only(mode, "S", "Mode set to S", "Only stream mode is supported")
                    .await?
            }
            Command::Stru(stru) => {
                self.only(stru, "F", "Structure set to F", "Only file structure is supported")
                    .await?
            }
            Command::Pasv => self.pasv(false).await?,
            Command::Epsv => self.pasv(true).await?,
            Command::Port => {
                self.reply(Reply::new(
                    reply::NOT_IMPLEMENTED,
                    "Active mode is not supported, use PASV",
                ))
                .await?
            }
            Command::List(arg) => self.list(arg, true).await?,
            Command::Nlst(arg) => self.list(arg, false).await?,
            Command::Retr(arg) => self.retr(arg).await?,
            Command::Stor(arg) => self.store(arg, false).await?,
            Command::Appe(arg) => self.store(arg, true).await?,
            Command::Dele(arg) => {
                self.file_op(arg, |path| async move { fs::remove_file(path).await }, "File deleted")
                    .await?
            }
            Command::Rmd(arg) => {
                self.file_op(arg, |path| async move { fs::remove_dir(path).await }, "Directory removed")
                    .await?
            }
            Command::Mkd(arg) => self.mkd(arg).await?,
            Command::Rnfr(arg) => self.rnfr(arg).await?,
            Command::Rnto(arg) => self.rnto(arg).await?,
            Command::Size(arg) => self.size(arg).await?,
            Command::Mdtm(arg) => self.mdtm(arg).await?,
            Command::Quit => {
                self.reply(Reply::new(reply::CLOSING, "Goodbye")).await?;
                return Ok(Flow::Quit);
            }
            Command::Unknown(verb) => {
                tracing::debug!(session = %self.id, verb = %verb, "Unsupported command");
                self.reply(Reply::new(reply::NOT_IMPLEMENTED, "Command not implemented"))
                    .await?
            }
        }
        Ok(Flow::Continue)
    }

    async fn user(&mut self, name: String) -> io::Result<()> {
        if name.is_empty() {
            return self.syntax_error().await;
        }
        self.logged_in = false;
        self.pending_user = Some(name);
        self.reply(Reply::new(reply::NEED_PASSWORD, "User name okay, need password"))
            .await
    }

    async fn pass(&mut self, password: String) -> io::Result<()> {
        let Some(user) = self.pending_user.take() else {
            return self
                .reply(Reply::new(reply::BAD_SEQUENCE, "Login with USER first"))
                .await;
        };
        if self.ctx.credentials.check(&user, &password) {
            self.logged_in = true;
            tracing::info!(session = %self.id, user = %user, "FTP login");
            self.reply(Reply::new(reply::LOGGED_IN, "User logged in, proceed"))
                .await
        } else {
            tracing::warn!(session = %self.id, user = %user, "FTP login failed");
            self.reply(Reply::new(reply::NOT_LOGGED_IN, "Login incorrect"))
                .await
        }
    }

    async fn cwd(&mut self, arg: String) -> io::Result<()> {
        if arg.is_empty() {
            return self.syntax_error().await;
        }
        let target = self.cwd.resolve(&arg);
        if is_dir(&self.real(&target)).await {
            let text = format!("Directory changed to {target}");
            self.cwd = target;
            self.reply(Reply::new(reply::FILE_ACTION_OK, text)).await
        } else {
            self.unavailable("No such directory").await
        }
    }

    async fn only(&mut self, arg: String, want: &str, ok: &str, refused: &str) -> io::Result<()> {
        let answer = if arg.trim().eq_ignore_ascii_case(want) {
            Reply::new(reply::OK, ok)
        } else {
            Reply::new(reply::PARAMETER_NOT_IMPLEMENTED, refused)
        };
        self.reply(answer).await
    }

    async fn pasv(&mut self, extended: bool) -> io::Result<()> {
        let ip = match self.local_ip {
            IpAddr::V6(v6) if !extended => match v6.to_ipv4_mapped() {
                Some(v4) => IpAddr::V4(v4),
                None => {
                    return self
                        .reply(Reply::new(reply::CANT_OPEN_DATA, "Use EPSV for IPv6"))
                        .await;
                }
            },
            ip => ip,
        };

        let listener = match TcpListener::bind(SocketAddr::new(ip, 0)).await {
            Ok(listener) => listener,
            Err(e) => {
                tracing::warn!(session = %self.id, error = %e, "Passive bind failed");
                return self
                    .reply(Reply::new(reply::CANT_OPEN_DATA, "Can't open passive port"))
                    .await;
            }
        };
        let port = listener.local_addr()?.port();
        self.passive = Some(listener);

        let answer = match ip {
            IpAddr::V4(v4) if !extended => {
                let [a, b, c, d] = v4.octets();
                Reply::new(
                    reply::PASSIVE,
                    format!(
                        "Entering Passive Mode ({a},{b},{c},{d},{},{})",
                        port >> 8,
                        port & 0xff
                    ),
                )
            }
            _ => Reply::new(
                reply::EXTENDED_PASSIVE,
                format!("Entering Extended Passive Mode (|||{port}|)"),
            ),
        };
        self.reply(answer).await
    }

    /// Send `150`, then accept the pending passive connection.
    async fn open_data(&mut self, what: &str) -> io::Result<Option<TcpStream>> {
        let Some(listener) = self.passive.take() else {
            self.reply(Reply::new(reply::CANT_OPEN_DATA, "Use PASV or EPSV first"))
                .await?;
            return Ok(None);
        };
        self.reply(Reply::new(
            reply::OPENING_DATA,
            format!("Opening BINARY mode data connection for {what}"),
        ))
        .await?;

        match tokio::time::timeout(self.ctx.data_timeout, listener.accept()).await {
            Ok(Ok((stream, peer))) => {
                tracing::debug!(session = %self.id, peer = %peer, "Data connection open");
                Ok(Some(stream))
            }
            Ok(Err(e)) => {
                tracing::warn!(session = %self.id, error = %e, "Data accept failed");
                self.reply(Reply::new(reply::CANT_OPEN_DATA, "Can't open data connection"))
                    .await?;
                Ok(None)
            }
            Err(_) => {
                tracing::warn!(session = %self.id, "Data connection timed out");
                self.reply(Reply::new(reply::CANT_OPEN_DATA, "Data connection timed out"))
                    .await?;
                Ok(None)
            }
        }
    }

    /// Report how a data transfer ended.
    async fn finish_transfer(&mut self, result: io::Result<u64>) -> io::Result<()> {
        match result {
            Ok(bytes) => {
                tracing::debug!(session = %self.id, bytes, "Transfer complete");
                self.reply(Reply::new(reply::TRANSFER_COMPLETE, "Transfer complete"))
                    .await
            }
            Err(e) => {
                tracing::warn!(session = %self.id, error = %e, "Transfer aborted");
                self.reply(Reply::new(reply::TRANSFER_ABORTED, "Transfer aborted"))
                    .await
            }
        }
    }

    async fn list(&mut self, arg: Option<String>, long: bool) -> io::Result<()> {
        let target = match &arg {
            Some(arg) => self.cwd.resolve(arg),
            None => self.cwd.clone(),
        };
        let real = self.real(&target);
        let listing = match render_listing(&real, target.file_name(), long).await {
            Ok(listing) => listing,
            Err(_) => return self.unavailable("No such file or directory").await,
        };

        let Some(mut data) = self.open_data("file list").await? else {
            return Ok(());
        };
        let result: io::Result<u64> = async {
            data.write_all(listing.as_bytes()).await?;
            data.shutdown().await?;
            Ok(listing.len() as u64)
        }
        .await;
        self.finish_transfer(result).await
    }

    async fn retr(&mut self, arg: String) -> io::Result<()> {
        if arg.is_empty() {
            return self.syntax_error().await;
        }
        let target = self.cwd.resolve(&arg);
        let mut file = match open_regular(&self.real(&target)).await {
            Some(file) => file,
            None => return self.unavailable("No such file").await,
        };

        let Some(mut data) = self.open_data(target.file_name()).await? else {
            return Ok(());
        };
        let result: io::Result<u64> = async {
            let copied = tokio::io::copy(&mut file, &mut data).await?;
            data.shutdown().await?;
            Ok(copied)
        }
        .await;
        self.finish_transfer(result).await
    }

    async fn store(&mut self, arg: String, append: bool) -> io::Result<()> {
        if arg.is_empty() {
            return self.syntax_error().await;
        }
        let target = self.cwd.resolve(&arg);
        if target.is_root() {
            return self
                .reply(Reply::new(reply::NAME_NOT_ALLOWED, "File name not allowed"))
                .await;
        }
        let opened = OpenOptions::new()
            .write(true)
            .create(true)
            .append(append)
            .truncate(!append)
            .open(self.real(&target))
            .await;
        let mut file = match opened {
            Ok(file) => file,
            Err(e) => {
                tracing::debug!(session = %self.id, path = %target, error = %e, "Cannot open for writing");
                return self.unavailable("Cannot write file").await;
            }
        };

        let Some(mut data) = self.open_data(target.file_name()).await? else {
            return Ok(());
        };
        let result: io::Result<u64> = async {
            let copied = tokio::io::copy(&mut data, &mut file).await?;
            file.flush().await?;
            Ok(copied)
        }
        .await;
        if result.is_ok() {
            tracing::info!(session = %self.id, path = %target, "File stored");
        }
        self.finish_transfer(result).await
    }

    async fn file_op<F, Fut>(&mut self, arg: String, op: F, done: &str) -> io::Result<()>
    where
        F: FnOnce(PathBuf) -> Fut,
        Fut: std::future::Future<Output = io::Result<()>>,
    {
        if arg.is_empty() {
            return self.syntax_error().await;
        }
        let target = self.cwd.resolve(&arg);
        if target.is_root() {
            return self.unavailable("Permission denied").await;
        }
        match op(self.real(&target)).await {
            Ok(()) => {
                tracing::info!(session = %self.id, path = %target, "{done}");
                self.reply(Reply::new(reply::FILE_ACTION_OK, done)).await
            }
            Err(e) => self.unavailable(&e.to_string()).await,
        }
    }

    async fn mkd(&mut self, arg: String) -> io::Result<()> {
        if arg.is_empty() {
            return self.syntax_error().await;
        }
        let target = self.cwd.resolve(&arg);
        match fs::create_dir(self.real(&target)).await {
            Ok(()) => {
                let text = format!("{} created", quote(&target));
                self.reply(Reply::new(reply::PATH_CREATED, text)).await
            }
            Err(e) => self.unavailable(&e.to_string()).await,
        }
    }

    async fn rnfr(&mut self, arg: String) -> io::Result<()> {
        if arg.is_empty() {
            return self.syntax_error().await;
        }
        let target = self.cwd.resolve(&arg);
        if !target.is_root() && fs::metadata(self.real(&target)).await.is_ok() {
            self.rename_from = Some(target);
            self.reply(Reply::new(reply::PENDING_FURTHER_INFO, "Ready for RNTO"))
                .await
        } else {
            self.unavailable("No such file or directory").await
        }
    }

    async fn rnto(&mut self, arg: String) -> io::Result<()> {
        let Some(from) = self.rename_from.take() else {
            return self
                .reply(Reply::new(reply::BAD_SEQUENCE, "RNFR required first"))
                .await;
        };
        if arg.is_empty() {
            return self.syntax_error().await;
        }
        let to = self.cwd.resolve(&arg);
        match fs::rename(self.real(&from), self.real(&to)).await {
            Ok(()) => {
                tracing::info!(session = %self.id, from = %from, to = %to, "Renamed");
                self.reply(Reply::new(reply::FILE_ACTION_OK, "Rename successful"))
                    .await
            }
            Err(e) => self.unavailable(&e.to_string()).await,
        }
    }

    async fn size(&mut self, arg: String) -> io::Result<()> {
        let target = self.cwd.resolve(&arg);
        match fs::metadata(self.real(&target)).await {
            Ok(meta) if meta.is_file() => {
                self.reply(Reply::new(reply::FILE_STATUS, meta.len().to_string()))
                    .await
            }
            _ => self.unavailable("No such file").await,
        }
    }

    async fn mdtm(&mut self, arg: String) -> io::Result<()> {
        let target = self.cwd.resolve(&arg);
        let modified = match fs::metadata(self.real(&target)).await {
            Ok(meta) if meta.is_file() => meta.modified().ok(),
            _ => None,
        };
        match modified {
            Some(at) => {
                self.reply(Reply::new(reply::FILE_STATUS, listing::mdtm(at)))
                    .await
            }
            None => self.unavailable("No such file").await,
        }
    }

    async fn syntax_error(&mut self) -> io::Result<()> {
        self.reply(Reply::new(reply::ARGUMENT_ERROR, "Syntax error in parameters"))
            .await
    }

    async fn unavailable(&mut self, text: &str) -> io::Result<()> {
        self.reply(Reply::new(reply::FILE_UNAVAILABLE, text)).await
    }

    fn real(&self, path: &VirtualPath) -> PathBuf {
        path.to_real(&self.ctx.root)
    }
}

/// `"path"` with embedded quotes doubled, as PWD and MKD replies require.
fn quote(path: &VirtualPath) -> String {
    format!("\"{}\"", path.to_string().replace('"', "\"\""))
}

async fn is_dir(path: &Path) -> bool {
    fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false)
}

/// Open `path` for reading if it is a regular file.
async fn open_regular(path: &Path) -> Option<File> {
    let file = File::open(path).await.ok()?;
    let meta = file.metadata().await.ok()?;
    meta.is_file().then_some(file)
}

/// LIST (long) or NLST (names only) output for a directory or single file.
async fn render_listing(real: &Path, name: &str, long: bool) -> io::Result<String> {
    let meta = fs::metadata(real).await?;
    let now = Utc::now();
    let mut lines = Vec::new();

    if meta.is_dir() {
        let mut entries = fs::read_dir(real).await?;
        while let Some(entry) = entries.next_entry().await? {
            let entry_name = entry.file_name().to_string_lossy().into_owned();
            let line = if long {
                match entry.metadata().await {
                    Ok(entry_meta) => listing::list_line(&entry_name, &entry_meta, now),
                    Err(_) => continue,
                }
            } else {
                entry_name.clone()
            };
            lines.push((entry_name, line));
        }
        lines.sort_by(|a, b| a.0.cmp(&b.0));
    } else {
        let line = if long {
            listing::list_line(name, &meta, now)
        } else {
            name.to_string()
        };
        lines.push((name.to_string(), line));
    }

    Ok(lines
        .into_iter()
        .map(|(_, line)| format!("{line}\r\n"))
        .collect())
}
