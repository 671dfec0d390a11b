//! Control-connection command parsing.

/// A parsed FTP command.
///
/// Aliases (`XPWD`, `XCWD`, ...) parse to the same variant as their
/// standard name. Arguments are kept verbatim; commands that need one get
/// an empty string when the client sent none, and the session answers 501.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    User(String),
    Pass(String),
    Syst,
    Feat,
    Opts(String),
    Noop,
    Pwd,
    Cwd(String),
    Cdup,
    Type(String),
    Mode(String),
    Stru(String),
    Pasv,
    Epsv,
    Port,
    List(Option<String>),
    Nlst(Option<String>),
    Retr(String),
    Stor(String),
    Appe(String),
    Dele(String),
    Mkd(String),
    Rmd(String),
    Rnfr(String),
    Rnto(String),
    Size(String),
    Mdtm(String),
    Quit,
    Unknown(String),
}

impl Command {
    /// Commands accepted before login.
    pub fn allowed_before_login(&self) -> bool {
        matches!(
            self,
            Command::User(_)
                | Command::Pass(_)
                | Command::Quit
                | Command::Syst
                | Command::Feat
                | Command::Noop
                | Command::Opts(_)
        )
    }
}

/// Parse one command line (without the CRLF).
pub fn parse_command(raw: &str) -> Command {
    let trimmed = raw.trim_end_matches(['\r', '\n']);
    let mut parts = trimmed.splitn(2, ' ');
    let verb = parts.next().unwrap_or("").trim().to_ascii_uppercase();
    let arg = parts.next().unwrap_or("").to_string();
    let optional = || {
        let listed = strip_list_flags(&arg);
        (!listed.is_empty()).then(|| listed.to_string())
    };

    match verb.as_str() {
        "USER" => Command::User(arg),
        "PASS" => Command::Pass(arg),
        "SYST" => Command::Syst,
        "FEAT" => Command::Feat,
        "OPTS" => Command::Opts(arg),
        "NOOP" => Command::Noop,
        "PWD" | "XPWD" => Command::Pwd,
        "CWD" | "XCWD" => Command::Cwd(arg),
        "CDUP" | "XCUP" => Command::Cdup,
        "TYPE" => Command::Type(arg),
        "MODE" => Command::Mode(arg),
        "STRU" => Command::Stru(arg),
        "PASV" => Command::Pasv,
        "EPSV" => Command::Epsv,
        "PORT" | "EPRT" => Command::Port,
        "LIST" => Command::List(optional()),
        "NLST" => Command::Nlst(optional()),
        "RETR" => Command::Retr(arg),
        "STOR" => Command::Stor(arg),
        "APPE" => Command::Appe(arg),
        "DELE" => Command::Dele(arg),
        "MKD" | "XMKD" => Command::Mkd(arg),
        "RMD" | "XRMD" => Command::Rmd(arg),
        "RNFR" => Command::Rnfr(arg),
        "RNTO" => Command::Rnto(arg),
        "SIZE" => Command::Size(arg),
        "MDTM" => Command::Mdtm(arg),
        "QUIT" => Command::Quit,
        _ => Command::Unknown(verb),
    }
}

/// Drop `ls`-style flags (`-la`) that many clients send with LIST.
fn strip_list_flags(arg: &str) -> &str {
    let mut rest = arg.trim();
    while rest.starts_with('-') {
        rest = rest
            .split_once(' ')
            .map(|(_, tail)| tail.trim_start())
            .unwrap_or("");
    }
    rest
}

/// Render a command line for logging with the PASS argument masked.
pub fn loggable(raw: &str) -> String {
    let trimmed = raw.trim_end_matches(['\r', '\n']);
    match trimmed.split_once(' ') {
        Some((verb, _)) if verb.eq_ignore_ascii_case("PASS") => format!("{verb} ****"),
        _ => trimmed.to_string(),
    }
}
