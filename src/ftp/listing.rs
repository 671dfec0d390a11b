//! LIST, NLST and MDTM formatting.

use chrono::{DateTime, Datelike, Utc};
use std::fs::Metadata;
use std::time::SystemTime;

/// One `ls -l` style line, as most FTP clients expect from LIST.
pub fn list_line(name: &str, meta: &Metadata, now: DateTime<Utc>) -> String {
    let kind = if meta.is_dir() { 'd' } else { '-' };
    let perms = if meta.permissions().readonly() {
        "r--r--r--"
    } else if meta.is_dir() {
        "rwxr-xr-x"
    } else {
        "rw-r--r--"
    };
    let modified = meta
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or(now);
    format!(
        "{kind}{perms} 1 owner group {size:>12} {date} {name}",
        size = meta.len(),
        date = list_date(modified, now),
    )
}

/// `Jan 02 15:04` within the current year, `Jan 02  2006` otherwise.
pub fn list_date(modified: DateTime<Utc>, now: DateTime<Utc>) -> String {
    if modified.year() == now.year() {
        modified.format("%b %d %H:%M").to_string()
    } else {
        modified.format("%b %d  %Y").to_string()
    }
}

/// MDTM timestamp, `YYYYMMDDHHMMSS` in UTC.
pub fn mdtm(modified: SystemTime) -> String {
    DateTime::<Utc>::from(modified)
        .format("%Y%m%d%H%M%S")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn dates_switch_to_year_form() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let recent = Utc.with_ymd_and_hms(2024, 1, 2, 15, 4, 0).unwrap();
        let old = Utc.with_ymd_and_hms(2006, 1, 2, 15, 4, 0).unwrap();
        assert_eq!(list_date(recent, now), "Jan 02 15:04");
        assert_eq!(list_date(old, now), "Jan 02  2006");
    }

    #[test]
    fn mdtm_format() {
        let at = Utc.with_ymd_and_hms(2023, 11, 5, 8, 9, 10).unwrap();
        assert_eq!(mdtm(at.into()), "20231105080910");
    }

    #[test]
    fn list_line_for_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, b"12345").unwrap();
        let meta = std::fs::metadata(&file).unwrap();

        let line = list_line("a.txt", &meta, Utc::now());
        assert!(line.starts_with("-rw-r--r-- 1 owner group"));
        assert!(line.ends_with(" a.txt"));
        assert!(line.contains(" 5 "));
    }
}
