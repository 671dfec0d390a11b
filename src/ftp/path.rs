//! Virtual paths.
//!
//! Clients see `/` as the served root. Every path a client names is
//! resolved against the working directory and normalized lexically, so
//! `..` stops at `/` and the real path always stays under root.

use std::fmt;
use std::path::{Path, PathBuf};

/// A normalized absolute path inside the served tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualPath(Vec<String>);

impl VirtualPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Resolve `arg` relative to `self`. Absolute arguments start from root.
    pub fn resolve(&self, arg: &str) -> Self {
        let mut parts = if arg.starts_with('/') {
            Vec::new()
        } else {
            self.0.clone()
        };
        for part in arg.split(['/', '\\']) {
            match part {
                "" | "." => {}
                ".." => {
                    parts.pop();
                }
                name => parts.push(name.to_string()),
            }
        }
        Self(parts)
    }

    pub fn parent(&self) -> Self {
        let mut parts = self.0.clone();
        parts.pop();
        Self(parts)
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Last component, or `/` for root.
    pub fn file_name(&self) -> &str {
        self.0.last().map(String::as_str).unwrap_or("/")
    }

    /// Map onto the real filesystem under `root`.
    pub fn to_real(&self, root: &Path) -> PathBuf {
        let mut real = root.to_path_buf();
        real.extend(&self.0);
        real
    }
}

impl Default for VirtualPath {
    fn default() -> Self {
        Self::root()
    }
}

impl fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for part in &self.0 {
            write!(f, "/{part}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_relative_and_absolute() {
        let cwd = VirtualPath::root().resolve("docs/guide");
        assert_eq!(cwd.to_string(), "/docs/guide");
        assert_eq!(cwd.resolve("intro.md").to_string(), "/docs/guide/intro.md");
        assert_eq!(cwd.resolve("/other").to_string(), "/other");
        assert_eq!(cwd.resolve("../x/./y").to_string(), "/docs/x/y");
    }

    #[test]
    fn never_escapes_root() {
        let cwd = VirtualPath::root().resolve("a");
        let escaped = cwd.resolve("../../../../etc/passwd");
        assert_eq!(escaped.to_string(), "/etc/passwd");
        assert_eq!(
            escaped.to_real(Path::new("/srv/share")),
            PathBuf::from("/srv/share/etc/passwd")
        );
        assert!(VirtualPath::root().resolve("..").is_root());
        assert!(VirtualPath::root().resolve("..\\..\\win").to_string() == "/win");
    }

    #[test]
    fn parent_and_name() {
        let path = VirtualPath::root().resolve("/a/b.txt");
        assert_eq!(path.file_name(), "b.txt");
        assert_eq!(path.parent().to_string(), "/a");
        assert_eq!(VirtualPath::root().parent().to_string(), "/");
    }
}
