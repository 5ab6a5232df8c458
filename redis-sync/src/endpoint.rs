use std::fmt;

use url::Url;

use crate::errors::SyncError;

/// Address of one Redis instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub db: i64,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Endpoint {
    /// Validate host, port and database number.
    ///
    /// The port is taken as a wide integer so out-of-range values from the
    /// command line or a config file are reported instead of wrapping.
    pub fn new(host: impl Into<String>, port: i64, db: i64) -> Result<Self, SyncError> {
        let host = host.into().trim().to_string();
        if host.is_empty() {
            return Err(SyncError::configuration("host must not be empty"));
        }
        let port = u16::try_from(port)
            .ok()
            .filter(|port| *port != 0)
            .ok_or_else(|| SyncError::configuration(format!("port must be between 1 and 65535, got {port}")))?;
        if db < 0 {
            return Err(SyncError::configuration(format!(
                "database number must not be negative, got {db}"
            )));
        }

        Ok(Self {
            host,
            port,
            db,
            username: None,
            password: None,
        })
    }

    pub fn with_credentials(mut self, username: Option<String>, password: Option<String>) -> Self {
        self.username = username.filter(|u| !u.is_empty());
        self.password = password.filter(|p| !p.is_empty());
        self
    }

    /// Whether both endpoints address the same logical database.
    pub fn same_database(&self, other: &Endpoint) -> bool {
        self.host.eq_ignore_ascii_case(&other.host) && self.port == other.port && self.db == other.db
    }

    /// Build a `redis://` URL with percent-encoded credentials.
    pub fn redis_url(&self) -> Result<Url, SyncError> {
        let mut url = Url::parse("redis://localhost").map_err(|err| SyncError::configuration(err.to_string()))?;

        let host = if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        url.set_host(Some(&host))
            .map_err(|err| SyncError::configuration(format!("invalid host '{}': {err}", self.host)))?;
        url.set_port(Some(self.port))
            .map_err(|_| SyncError::configuration(format!("cannot set port on '{}'", self.host)))?;
        url.set_path(&format!("/{}", self.db));

        if let Some(password) = &self.password {
            let username = self.username.as_deref().unwrap_or("");
            url.set_username(username)
                .map_err(|_| SyncError::configuration("cannot set username"))?;
            url.set_password(Some(password))
                .map_err(|_| SyncError::configuration("cannot set password"))?;
        } else if let Some(username) = &self.username {
            url.set_username(username)
                .map_err(|_| SyncError::configuration("cannot set username"))?;
        }

        Ok(url)
    }
}

/// Credentials never appear in the rendered form.
impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}/{}", self.host, self.port, self.db)
        } else {
            write!(f, "{}:{}/{}", self.host, self.port, self.db)
        }
    }
}

/// Parse a port given as text, e.g. from the command line.
pub fn parse_port(value: &str) -> Result<i64, SyncError> {
    value
        .trim()
        .parse::<i64>()
        .map_err(|_| SyncError::configuration(format!("port must be an integer, got '{value}'")))
}
