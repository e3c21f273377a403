use crate::error::Error;

/// Response text encoding for simple strings and bulk strings.
///
/// Simple strings always decode to `String` regardless of this setting (the
/// RESP simple-string type is inherently textual); this only controls
/// whether bulk-string payloads are decoded as UTF-8 text or left as raw
/// bytes. Default is `Utf8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Utf8,
    Raw,
}

/// Connection parameters shared by every `Conn` a `Pool` creates.
///
/// ```rust
/// use tokio_resp::Opts;
///
/// let mut opts = Opts::default();
/// opts.port = 6380;
///
/// let opts2 = Opts::try_from("redis://:hunter2@localhost:6380/1").unwrap();
/// assert_eq!(opts2.database, 1);
/// ```
#[derive(Debug, Clone)]
pub struct Opts {
    /// Hostname or IP address.
    pub host: String,

    /// Port number for the server.
    pub port: u16,

    /// Password sent via AUTH on connect. Cleared from the `Conn` after use.
    pub password: Option<String>,

    /// Logical database index selected via SELECT on connect.
    pub database: usize,

    /// Client name sent via CLIENT SETNAME on connect.
    pub name: Option<String>,

    /// Response text encoding for simple strings and bulk strings.
    pub encoding: Option<Encoding>,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            password: None,
            database: 0,
            name: None,
            encoding: Some(Encoding::Utf8),
        }
    }
}

impl TryFrom<&str> for Opts {
    type Error = Error;

    fn try_from(url: &str) -> Result<Self, Self::Error> {
        let parsed = url::Url::parse(url)
            .map_err(|e| Error::client(format!("failed to parse redis URL: {e}")))?;

        if parsed.scheme() != "redis" {
            return Err(Error::client(format!(
                "invalid URL scheme '{}', expected 'redis'",
                parsed.scheme()
            )));
        }

        let host = parsed
            .host_str()
            .ok_or_else(|| Error::client("missing host in redis URL"))?
            .to_string();
        let port = parsed.port().unwrap_or(6379);
        let password = parsed.password().map(ToString::to_string);

        let database = match parsed.path().strip_prefix('/') {
            Some("") | None => 0,
            Some(db) => db
                .parse()
                .map_err(|_| Error::client(format!("invalid database index '{db}'")))?,
        };

        Ok(Self {
            host,
            port,
            password,
            database,
            name: None,
            encoding: Some(Encoding::Utf8),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_opts() {
        let opts = Opts::default();
        assert_eq!(opts.host, "127.0.0.1");
        assert_eq!(opts.port, 6379);
        assert_eq!(opts.database, 0);
        assert!(opts.password.is_none());
    }

    #[test]
    fn parse_url_with_password_and_db() {
        let opts = Opts::try_from("redis://:hunter2@example.com:6380/3").unwrap();
        assert_eq!(opts.host, "example.com");
        assert_eq!(opts.port, 6380);
        assert_eq!(opts.password.as_deref(), Some("hunter2"));
        assert_eq!(opts.database, 3);
    }

    #[test]
    fn parse_url_minimal() {
        let opts = Opts::try_from("redis://localhost").unwrap();
        assert_eq!(opts.host, "localhost");
        assert_eq!(opts.port, 6379);
        assert_eq!(opts.database, 0);
    }

    #[test]
    fn rejects_wrong_scheme() {
        assert!(Opts::try_from("mysql://localhost").is_err());
    }
}
