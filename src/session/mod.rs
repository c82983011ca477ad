use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub is_staff: bool,
    #[serde(default)]
    pub is_superuser: bool,
}

impl User {
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }
}

/// Authenticated user and API token. Handed explicitly to whatever needs to
/// talk to the backend; there is no process-wide session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: Option<String>,
    pub user: Option<User>,
}

impl Session {
    pub fn new(token: String, user: User) -> Self {
        Self {
            token: Some(token),
            user: Some(user),
        }
    }

    pub fn with_token(token: &str) -> Self {
        Self {
            token: Some(token.to_string()),
            user: None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some() && self.token.as_deref().is_some_and(|t| !t.is_empty())
    }

    pub fn authorization_header(&self) -> Option<String> {
        self.token
            .as_deref()
            .filter(|t| !t.is_empty())
            .map(|t| format!("Token {t}"))
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to read session file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write session file {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode session: {source}")]
    Encode {
        #[source]
        source: serde_json::Error,
    },
}

/// Persisted copy of the session, one JSON file.
#[derive(Clone, Debug)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the saved session. A missing file is an anonymous session; an
    /// unreadable one is discarded and removed.
    pub fn hydrate(&self) -> Result<Session, SessionError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Session::default()),
            Err(e) => {
                return Err(SessionError::Read {
                    path: self.path.display().to_string(),
                    source: e,
                })
            }
        };
        match serde_json::from_str::<Session>(&contents) {
            Ok(session) if session.is_authenticated() => Ok(session),
            Ok(_) => Ok(Session::default()),
            Err(e) => {
                log::warn!(
                    "discarding unreadable session file {}: {e}",
                    self.path.display()
                );
                self.clear()?;
                Ok(Session::default())
            }
        }
    }

    pub fn persist(&self, session: &Session) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| SessionError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        let body =
            serde_json::to_vec_pretty(session).map_err(|source| SessionError::Encode { source })?;
        std::fs::write(&self.path, body).map_err(|e| SessionError::Write {
            path: self.path.display().to_string(),
            source: e,
        })
    }

    pub fn clear(&self) -> Result<(), SessionError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SessionError::Write {
                path: self.path.display().to_string(),
                source: e,
            }),
        }
    }
}
