use crate::error::Result;
use crate::session::{FileSessionStore, NoSessionStore, SessionStore};
use log::info;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Runtime configuration, normally read from a TOML file.  Every
/// field has a default, so an empty file is a valid configuration
/// for an 80x24 terminal on stdin/stdout.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Instance host to talk to, e.g. `mastodon.social`
    pub instance: String,

    /// Serial device to open.  When absent, the process's own
    /// stdin/stdout TTY is used.
    pub port: Option<PathBuf>,

    /// Line speed, used both to set up the serial port and to work
    /// out output pacing delays
    pub baud: u32,

    /// Throttle and chunk output for slow or XON/XOFF terminals
    pub flow_control: bool,

    /// Bytes written per paced chunk
    pub pacing_chunk: usize,

    pub rows: i32,
    pub columns: i32,

    /// Terminal accepts UTF-8.  When false, box drawing goes through
    /// the DEC special graphics set and other non-ASCII becomes `?`.
    pub utf8: bool,

    /// Posts requested per page fetch
    pub page_size: usize,

    /// Lines from the end of the loaded posts at which the next
    /// older page is requested
    pub scroll_margin: usize,

    pub request_timeout_ms: u64,

    /// Directory holding saved session records
    pub session_dir: Option<PathBuf>,

    /// Username to pre-fill on the login screen
    pub username: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            instance: String::new(),
            port: None,
            baud: 9600,
            flow_control: false,
            pacing_chunk: 32,
            rows: 24,
            columns: 80,
            utf8: false,
            page_size: 20,
            scroll_margin: 4,
            request_timeout_ms: 15_000,
            session_dir: None,
            username: String::new(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(text)?;
        config.rows = config.rows.clamp(4, 999);
        config.columns = config.columns.clamp(20, 999);
        config.pacing_chunk = config.pacing_chunk.max(1);
        config.page_size = config.page_size.max(1);
        Ok(config)
    }

    pub fn geometry(&self) -> Geometry {
        Geometry {
            rows: self.rows,
            columns: self.columns,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Where sessions are kept: files under `session_dir` if set,
    /// otherwise nowhere, so every run starts at the login screen
    pub fn session_store(&self) -> Box<dyn SessionStore> {
        match self.session_dir {
            Some(ref dir) => {
                info!("sessions saved in {}", dir.display());
                Box::new(FileSessionStore::new(dir))
            }
            None => Box::new(NoSessionStore),
        }
    }
}

/// Fixed terminal geometry: (rows, columns)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub rows: i32,
    pub columns: i32,
}
