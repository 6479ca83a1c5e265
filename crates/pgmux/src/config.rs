//! Connection settings read from a config file.
//!
//! The settings live under a `database` section. The file format follows the extension:
//!
//! ```ini
//! [database]
//! charset = utf8
//! host = localhost
//! db = app
//! username = app
//! password = ${APP_DB_PASSWORD}
//! ```
//!
//! `${VAR}` references in values are expanded from the environment.

use crate::error::{MuxError, MuxResult};
use serde::Deserialize;
use std::path::Path;

const SECTION: &str = "database";

/// Supported config file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Ini,
    Json,
    Toml,
}

impl ConfigFormat {
    /// Pick a format from a file extension.
    pub fn from_path(path: &Path) -> MuxResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("ini") => Ok(ConfigFormat::Ini),
            Some("json") => Ok(ConfigFormat::Json),
            Some("toml") => Ok(ConfigFormat::Toml),
            _ => Err(MuxError::config("config file type not supported")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub charset: String,
    pub host: String,
    pub db: String,
    pub username: String,
    pub password: String,
    pub port: Option<u16>,
    /// Postgres schema put on the `search_path` and used to qualify table names.
    pub schema: Option<String>,
}

impl DatabaseConfig {
    pub fn from_file(path: impl AsRef<Path>) -> MuxResult<Self> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path)?;
        let raw = std::fs::read_to_string(path).map_err(|e| {
            MuxError::config(format!("failed to read config file {}: {e}", path.display()))
        })?;
        Self::from_str(format, &raw)
    }

    /// Parse config text in the given format.
    pub fn from_str(format: ConfigFormat, text: &str) -> MuxResult<Self> {
        let file: ConfigFile = match format {
            ConfigFormat::Ini => ini_file(text)?,
            ConfigFormat::Json => serde_json::from_str(text)
                .map_err(|e| MuxError::config(format!("failed to parse json config: {e}")))?,
            ConfigFormat::Toml => toml::from_str(text)
                .map_err(|e| MuxError::config(format!("failed to parse toml config: {e}")))?,
        };
        let mut section = file.database.ok_or_else(missing_section)?;
        section.expand_env()?;
        section.into_config()
    }

    /// Postgres `client_encoding` for the configured charset.
    pub fn client_encoding(&self) -> &str {
        match self.charset.to_ascii_lowercase().as_str() {
            "utf8" | "utf8mb4" | "utf-8" => "UTF8",
            _ => &self.charset,
        }
    }

    /// Driver configuration for these settings.
    pub fn pg_config(&self) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&self.host)
            .dbname(&self.db)
            .user(&self.username)
            .password(&self.password);
        if let Some(port) = self.port {
            config.port(port);
        }

        let mut options = format!("-c client_encoding={}", self.client_encoding());
        if let Some(schema) = &self.schema {
            options.push_str(&format!(" -c search_path={schema}"));
        }
        config.options(&options);
        config
    }
}

/// On-disk shape of a config file. Only the `database` section is read.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    database: Option<DatabaseSection>,
}

/// The `database` section before required entries are checked.
#[derive(Debug, Default, Deserialize)]
struct DatabaseSection {
    charset: Option<String>,
    host: Option<String>,
    db: Option<String>,
    username: Option<String>,
    password: Option<String>,
    port: Option<u16>,
    schema: Option<String>,
}

impl DatabaseSection {
    fn expand_env(&mut self) -> MuxResult<()> {
        let fields = [
            &mut self.charset,
            &mut self.host,
            &mut self.db,
            &mut self.username,
            &mut self.password,
            &mut self.schema,
        ];
        for value in fields.into_iter().flatten() {
            *value = expand_env_vars(value)?;
        }
        Ok(())
    }

    fn into_config(self) -> MuxResult<DatabaseConfig> {
        Ok(DatabaseConfig {
            charset: required(self.charset, "charset")?,
            host: required(self.host, "host")?,
            db: required(self.db, "db")?,
            username: required(self.username, "username")?,
            password: required(self.password, "password")?,
            port: self.port,
            schema: self.schema.filter(|s| !s.is_empty()),
        })
    }
}

/// rust-ini yields untyped properties, so the section is filled in by key.
fn ini_file(text: &str) -> MuxResult<ConfigFile> {
    let ini = ini::Ini::load_from_str(text)
        .map_err(|e| MuxError::config(format!("failed to parse ini config: {e}")))?;
    let Some(props) = ini.section(Some(SECTION)) else {
        return Ok(ConfigFile::default());
    };

    let get = |key: &str| props.get(key).map(str::to_string);
    let port = match props.get("port") {
        Some(p) => Some(p.trim().parse::<u16>().map_err(|_| {
            MuxError::config(format!("entry 'port' must be a port number, got '{p}'"))
        })?),
        None => None,
    };
    Ok(ConfigFile {
        database: Some(DatabaseSection {
            charset: get("charset"),
            host: get("host"),
            db: get("db"),
            username: get("username"),
            password: get("password"),
            port,
            schema: get("schema"),
        }),
    })
}

fn required(value: Option<String>, key: &str) -> MuxResult<String> {
    value.ok_or_else(|| {
        MuxError::config(format!(
            "entry '{key}' was not found in config file '{SECTION}' section"
        ))
    })
}

fn missing_section() -> MuxError {
    MuxError::config(format!("config file has no '{SECTION}' section"))
}

fn expand_env_vars(input: &str) -> MuxResult<String> {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next();

            let mut key = String::new();
            let mut closed = false;
            for ch in chars.by_ref() {
                if ch == '}' {
                    closed = true;
                    break;
                }
                key.push(ch);
            }

            if !closed {
                return Err(MuxError::config(format!(
                    "unterminated env var reference: ${{{key}"
                )));
            }
            if key.is_empty() {
                return Err(MuxError::config("invalid env var reference: ${}"));
            }

            let v = std::env::var(&key).map_err(|_| {
                MuxError::config(format!("missing env var for config expansion: {key}"))
            })?;
            out.push_str(&v);
            continue;
        }

        out.push(c);
    }

    Ok(out)
}
