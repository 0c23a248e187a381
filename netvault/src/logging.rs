//! Log output for the command-line tool.
//!
//! Records go to stderr and to a persistent log file. When the configured
//! directory cannot be written the file moves to [`FALLBACK_LOG_DIR`].
//! `password=`, `secret=` and `token=` values are masked before a record
//! is written anywhere.

use std::borrow::Cow;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use env_logger::{Env, Target};
use regex::Regex;

use crate::error::{Result, StorageError};

/// Default log directory.
pub const DEFAULT_LOG_DIR: &str = "/var/log/netvault";

/// Used when the configured directory is not writable.
pub const FALLBACK_LOG_DIR: &str = "logs";

/// Name of the log file inside the log directory.
pub const LOG_FILE_NAME: &str = "netvault.log";

static SECRET_ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(password|secret|token)=\S+").expect("Invalid regex pattern")
});

/// Mask the value of every `password=`, `secret=` or `token=` assignment.
pub fn scrub_secrets(message: &str) -> Cow<'_, str> {
    SECRET_ASSIGNMENT.replace_all(message, "${1}=***")
}

/// An opened, append-mode log file.
#[derive(Debug)]
pub struct LogFile {
    /// Full path of the file.
    pub path: PathBuf,

    /// The preferred directory was not writable.
    pub fell_back: bool,

    file: File,
}

/// Open `{preferred}/netvault.log`, or the same file under `fallback`.
///
/// The error reports the fallback location when both fail.
pub fn open_log_file(preferred: &Path, fallback: &Path) -> Result<LogFile> {
    match append_in(preferred) {
        Ok((path, file)) => Ok(LogFile {
            path,
            fell_back: false,
            file,
        }),
        Err(_) => {
            let (path, file) = append_in(fallback)?;
            Ok(LogFile {
                path,
                fell_back: true,
                file,
            })
        }
    }
}

fn append_in(dir: &Path) -> Result<(PathBuf, File)> {
    fs::create_dir_all(dir).map_err(|e| StorageError::io(dir, e))?;
    let path = dir.join(LOG_FILE_NAME);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| StorageError::io(&path, e))?;
    Ok((path, file))
}

/// Install the global logger.
///
/// `default_level` applies unless `RUST_LOG` is set. Without a log file
/// records only go to stderr.
pub fn init(default_level: &str, log_file: Option<LogFile>) {
    let env = Env::default().default_filter_or(default_level);
    let mut builder = env_logger::Builder::from_env(env);
    builder.format(|buf, record| {
        let message = record.args().to_string();
        writeln!(
            buf,
            "{} | {} | {}",
            buf.timestamp_seconds(),
            record.level(),
            scrub_secrets(&message)
        )
    });
    if let Some(log_file) = log_file {
        builder.target(Target::Pipe(Box::new(Tee {
            file: log_file.file,
        })));
    }
    builder.init();
}

/// Writes every record to stderr and to the log file.
struct Tee {
    file: File,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrub_secrets() {
        assert_eq!(
            scrub_secrets("device=r1 login password=hunter2 port=22"),
            "device=r1 login password=*** port=22"
        );
        assert_eq!(scrub_secrets("Secret=abc token=x.y.z"), "Secret=*** token=***");
        assert_eq!(scrub_secrets("enable_password=s3cret!"), "enable_password=***");
        assert_eq!(scrub_secrets("device=r1 saved"), "device=r1 saved");
        assert!(matches!(scrub_secrets("nothing here"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_open_log_file_in_preferred_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let preferred = tmp.path().join("var/log");

        let log = open_log_file(&preferred, &tmp.path().join("fallback")).unwrap();
        assert!(!log.fell_back);
        assert_eq!(log.path, preferred.join(LOG_FILE_NAME));
        assert!(log.path.is_file());
    }

    #[test]
    fn test_open_log_file_falls_back() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("not-a-dir");
        fs::write(&blocker, "").unwrap();
        let fallback = tmp.path().join("logs");

        let log = open_log_file(&blocker.join("logs"), &fallback).unwrap();
        assert!(log.fell_back);
        assert_eq!(log.path, fallback.join(LOG_FILE_NAME));
    }

    #[test]
    fn test_open_log_file_appends() {
        let tmp = tempfile::tempdir().unwrap();
        let first = open_log_file(tmp.path(), tmp.path()).unwrap();
        let mut tee = Tee { file: first.file };
        tee.write_all(b"first\n").unwrap();

        let second = open_log_file(tmp.path(), tmp.path()).unwrap();
        let mut tee = Tee { file: second.file };
        tee.write_all(b"second\n").unwrap();
        tee.flush().unwrap();

        let content = fs::read_to_string(tmp.path().join(LOG_FILE_NAME)).unwrap();
        assert_eq!(content, "first\nsecond\n");
    }

    #[test]
    fn test_open_log_file_both_unwritable() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("file");
        fs::write(&blocker, "").unwrap();

        let err = open_log_file(&blocker.join("a"), &blocker.join("b")).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Storage);
    }
}
