use crate::error::Result;
use crate::feed::Visibility;
use log::debug;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::PathBuf;

/// An authenticated identity on one instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub host: String,
    pub username: String,
    pub display_name: String,
    /// Opaque credential understood by the feed service
    pub credential: String,
    #[serde(default)]
    pub prefs: Preferences,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    pub default_visibility: Visibility,
    /// Show content-warned posts expanded unless collapsed per post
    pub expand_spoilers: bool,
}

/// Storage for the session record of each instance host
pub trait SessionStore {
    fn load_session(&self, host: &str) -> Result<Option<Session>>;
    fn save_session(&self, session: &Session) -> Result<()>;
    fn forget_session(&self, host: &str) -> Result<()>;
}

/// Session records kept as one JSON file per host in a directory
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, host: &str) -> PathBuf {
        let name: String = host
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.session.json", name))
    }
}

impl SessionStore for FileSessionStore {
    fn load_session(&self, host: &str) -> Result<Option<Session>> {
        let path = self.path(host);
        match std::fs::read(&path) {
            Ok(data) => Ok(Some(serde_json::from_slice(&data)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("no saved session at {}", path.display());
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn save_session(&self, session: &Session) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let data = serde_json::to_vec_pretty(session)?;
        std::fs::write(self.path(&session.host), data)?;
        Ok(())
    }

    fn forget_session(&self, host: &str) -> Result<()> {
        match std::fs::remove_file(self.path(host)) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// Store that keeps nothing, for running without a session directory
pub struct NoSessionStore;

impl SessionStore for NoSessionStore {
    fn load_session(&self, _host: &str) -> Result<Option<Session>> {
        Ok(None)
    }

    fn save_session(&self, _session: &Session) -> Result<()> {
        Ok(())
    }

    fn forget_session(&self, _host: &str) -> Result<()> {
        Ok(())
    }
}
