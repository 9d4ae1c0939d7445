//! `key=value` configuration file reader, vsftpd-style.
//!
//! The on-disk grammar is hand-rolled rather than routed through `serde`:
//! one `directive=value` pair per line, `#` starts a comment, blank lines
//! are ignored. An absent file is seeded with the documented defaults via
//! an atomic write (temp file in the same directory, `fsync`, `rename`,
//! `fsync` the directory) so a first run never silently runs on an
//! in-memory default that diverges from what's on disk.

use clap::Parser;
use std::{
    fs::{self, File, OpenOptions},
    io::Write,
    net::Ipv4Addr,
    path::{Path, PathBuf},
};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/cftp_server.conf";

#[derive(Debug)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_level(&self) -> log::Level {
        match self {
            Self::Trace => log::Level::Trace,
            Self::Debug => log::Level::Debug,
            Self::Info => log::Level::Info,
            Self::Warn => log::Level::Warn,
            Self::Error => log::Level::Error,
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        Some(match raw.to_ascii_lowercase().as_str() {
            "trace" => Self::Trace,
            "debug" => Self::Debug,
            "info" => Self::Info,
            "warn" => Self::Warn,
            "error" => Self::Error,
            _ => return None,
        })
    }
}

#[derive(Debug)]
pub struct Config {
    pub max_connections: usize,
    pub connection_accept_timeout_secs: u64,
    pub data_connection_accept_timeout_secs: u64,
    pub ipc_reply_timeout_secs: u64,
    pub passive_port_start: u16,
    pub passive_port_end: u16,
    pub port: u16,
    pub server_name: String,
    pub ssl_cert_file: PathBuf,
    pub ssl_key_file: PathBuf,
    pub log_level: LogLevel,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_connections: 512,
            connection_accept_timeout_secs: 60,
            data_connection_accept_timeout_secs: 60,
            ipc_reply_timeout_secs: 5,
            passive_port_start: 40000,
            passive_port_end: 41000,
            port: 21,
            server_name: "cftp".to_string(),
            ssl_cert_file: PathBuf::from("/etc/cftp/cert.pem"),
            ssl_key_file: PathBuf::from("/etc/cftp/key.pem"),
            log_level: LogLevel::Info,
        }
    }
}

#[derive(Parser)]
#[command(
    about = env!("CARGO_PKG_DESCRIPTION"),
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS")
)]
struct Cli {
    /// specify the configuration file path.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

impl Config {
    /// Parses the CLI, reads (or seeds) the config file, and returns the
    /// resolved configuration. Never returns a file-parse error for an
    /// absent file; an absent file is created with documented defaults.
    pub fn load() -> Result<Self, crate::error::Error> {
        let path = Cli::parse().config;
        if !path.exists() {
            let defaults = Self::default();
            seed_default_file(&path, &defaults)
                .map_err(|e| crate::error::Error::Config(format!("seeding {path:?}: {e}")))?;
            return Ok(defaults);
        }

        let raw = fs::read_to_string(&path)
            .map_err(|e| crate::error::Error::Config(format!("reading {path:?}: {e}")))?;
        Self::parse_str(&raw)
    }

    fn parse_str(raw: &str) -> Result<Self, crate::error::Error> {
        let mut cfg = Self::default();

        for (lineno, line) in raw.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(crate::error::Error::Config(format!(
                    "line {}: expected `key=value`",
                    lineno + 1
                )));
            };

            let key = key.trim();
            let value = value.trim();
            apply_directive(&mut cfg, key, value).map_err(|reason| {
                crate::error::Error::Config(format!("line {}: {reason}", lineno + 1))
            })?;
        }

        if cfg.passive_port_start > cfg.passive_port_end {
            std::mem::swap(&mut cfg.passive_port_start, &mut cfg.passive_port_end);
        }

        Ok(cfg)
    }

    /// Renders this configuration back into the on-disk `key=value` grammar,
    /// used both to seed a fresh file and in the config round-trip test.
    pub fn render(&self) -> String {
        format!(
            "# cftp_server configuration — see the directive table in the docs.\n\
             max_connections={}\n\
             connection_accept_timeout={}\n\
             data_connection_accept_timeout={}\n\
             ipc_reply_timeout={}\n\
             passive_port_start={}\n\
             passive_port_end={}\n\
             port={}\n\
             server_name={}\n\
             ssl_cert_file={}\n\
             ssl_key_file={}\n\
             log_level={}\n",
            self.max_connections,
            self.connection_accept_timeout_secs,
            self.data_connection_accept_timeout_secs,
            self.ipc_reply_timeout_secs,
            self.passive_port_start,
            self.passive_port_end,
            self.port,
            self.server_name,
            self.ssl_cert_file.display(),
            self.ssl_key_file.display(),
            log_level_name(&self.log_level),
        )
    }
}

fn log_level_name(level: &LogLevel) -> &'static str {
    match level {
        LogLevel::Trace => "trace",
        LogLevel::Debug => "debug",
        LogLevel::Info => "info",
        LogLevel::Warn => "warn",
        LogLevel::Error => "error",
    }
}

fn apply_directive(cfg: &mut Config, key: &str, value: &str) -> Result<(), String> {
    match key {
        "max_connections" => {
            cfg.max_connections = value
                .parse()
                .map_err(|_| format!("max_connections must be a positive integer: {value:?}"))?;
            if cfg.max_connections == 0 {
                return Err("max_connections must be positive".to_string());
            }
        }
        "connection_accept_timeout" => {
            cfg.connection_accept_timeout_secs = value
                .parse()
                .map_err(|_| format!("connection_accept_timeout must be >= 0: {value:?}"))?;
        }
        "data_connection_accept_timeout" => {
            cfg.data_connection_accept_timeout_secs = value
                .parse()
                .map_err(|_| format!("data_connection_accept_timeout must be >= 0: {value:?}"))?;
        }
        "ipc_reply_timeout" => {
            cfg.ipc_reply_timeout_secs = value
                .parse()
                .map_err(|_| format!("ipc_reply_timeout must be >= 0: {value:?}"))?;
        }
        "passive_port_start" => {
            cfg.passive_port_start = parse_port(value, 1024)?;
        }
        "passive_port_end" => {
            cfg.passive_port_end = parse_port(value, 1024)?;
        }
        "port" => {
            cfg.port = parse_port(value, 20)?;
        }
        "server_name" => {
            cfg.server_name = value.to_string();
        }
        "ssl_cert_file" => {
            cfg.ssl_cert_file = PathBuf::from(value);
        }
        "ssl_key_file" => {
            cfg.ssl_key_file = PathBuf::from(value);
        }
        "log_level" => {
            cfg.log_level =
                LogLevel::parse(value).ok_or_else(|| format!("unknown log_level {value:?}"))?;
        }
        other => return Err(format!("unknown directive {other:?}")),
    }

    Ok(())
}

fn parse_port(value: &str, min: u16) -> Result<u16, String> {
    let port: u16 = value
        .parse()
        .map_err(|_| format!("expected a port number: {value:?}"))?;
    if port < min {
        return Err(format!("port must be >= {min}: {port}"));
    }
    Ok(port)
}

/// Writes `defaults` to `path` atomically: a temp file in the same
/// directory, `fsync`, `rename` into place, then `fsync` the directory so
/// the rename itself is durable.
fn seed_default_file(path: &Path, defaults: &Config) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let tmp_path = dir.join(format!(
        ".{}.tmp",
        path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("cftp_server.conf")
    ));

    {
        let mut tmp = File::create(&tmp_path)?;
        tmp.write_all(defaults.render().as_bytes())?;
        tmp.sync_all()?;
    }

    fs::rename(&tmp_path, path)?;

    let dir_handle = OpenOptions::new().read(true).open(dir)?;
    dir_handle.sync_all()?;

    Ok(())
}

/// Unused outside of directive validation, but documents the address the
/// server binds its control listener to.
pub const CONTROL_BIND_ADDR: Ipv4Addr = Ipv4Addr::UNSPECIFIED;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_render_and_parse() {
        let defaults = Config::default();
        let rendered = defaults.render();
        let reparsed = Config::parse_str(&rendered).unwrap();
        assert_eq!(reparsed.max_connections, defaults.max_connections);
        assert_eq!(reparsed.port, defaults.port);
        assert_eq!(reparsed.passive_port_start, defaults.passive_port_start);
        assert_eq!(reparsed.passive_port_end, defaults.passive_port_end);
        assert_eq!(reparsed.ipc_reply_timeout_secs, defaults.ipc_reply_timeout_secs);
    }

    #[test]
    fn comments_and_blank_lines_are_ignored() {
        let cfg = Config::parse_str("# comment\n\nport=2121\n").unwrap();
        assert_eq!(cfg.port, 2121);
    }

    #[test]
    fn reversed_passive_range_is_swapped() {
        let cfg = Config::parse_str("passive_port_start=41000\npassive_port_end=40000\n").unwrap();
        assert_eq!(cfg.passive_port_start, 40000);
        assert_eq!(cfg.passive_port_end, 41000);
    }

    #[test]
    fn unknown_directive_is_rejected() {
        assert!(Config::parse_str("bogus=1\n").is_err());
    }

    #[test]
    fn zero_max_connections_is_rejected() {
        assert!(Config::parse_str("max_connections=0\n").is_err());
    }

    #[test]
    fn seeding_an_absent_file_writes_defaults_and_is_reparseable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cftp_server.conf");

        let defaults = Config::default();
        seed_default_file(&path, &defaults).unwrap();

        let on_disk = fs::read_to_string(&path).unwrap();
        let reparsed = Config::parse_str(&on_disk).unwrap();
        assert_eq!(reparsed.port, defaults.port);
        assert_eq!(reparsed.server_name, defaults.server_name);

        // no leftover temp file
        assert!(!dir.path().join(".cftp_server.conf.tmp").exists());
    }
}
