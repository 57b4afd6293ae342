use ::url::{Host, Url};

use crate::error::{LiveviewError, Result};

/// Camera base URL, e.g. `http://192.168.122.1:8080`.
///
/// Only the `http` scheme is supported. An optional path prefix is kept so
/// that cameras behind a reverse proxy (`http://host/cam1`) still work;
/// trailing slashes are trimmed so that [`join`](Self::join) never produces
/// `//`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrl {
    host: String,
    port: u16,
    prefix: String,
}

impl BaseUrl {
    /// Parse a base URL.
    ///
    /// ```
    /// use liveview::http::BaseUrl;
    ///
    /// let url = BaseUrl::parse("http://192.168.122.1:8080/").unwrap();
    /// assert_eq!(url.host(), "192.168.122.1");
    /// assert_eq!(url.port(), 8080);
    /// assert_eq!(url.join("/sony/camera"), "/sony/camera");
    ///
    /// assert!(BaseUrl::parse("https://camera").is_err());
    /// ```
    pub fn parse(raw: &str) -> Result<Self> {
        let url = Url::parse(raw.trim()).map_err(|e| invalid(raw, &e.to_string()))?;

        if url.scheme() != "http" {
            return Err(invalid(raw, "only http:// is supported"));
        }
        if !url.username().is_empty() || url.password().is_some() {
            return Err(invalid(raw, "credentials are not supported"));
        }
        if url.query().is_some() {
            return Err(invalid(raw, "query is not supported"));
        }
        if url.fragment().is_some() {
            return Err(invalid(raw, "fragment is not supported"));
        }

        let host = match url.host() {
            Some(Host::Domain(domain)) if !domain.is_empty() => domain.to_string(),
            Some(Host::Ipv4(addr)) => addr.to_string(),
            Some(Host::Ipv6(addr)) => addr.to_string(),
            _ => return Err(invalid(raw, "missing host")),
        };
        let port = url
            .port_or_known_default()
            .ok_or_else(|| invalid(raw, "missing port"))?;

        Ok(Self {
            host,
            port,
            prefix: url.path().trim_end_matches('/').to_string(),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Value for the `Host` request header.
    pub fn authority(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Request target for `path` under this base URL.
    pub fn join(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.prefix, path)
        } else {
            format!("{}/{}", self.prefix, path)
        }
    }
}

fn invalid(raw: &str, reason: &str) -> LiveviewError {
    LiveviewError::InvalidUrl(format!("{raw}: {reason}"))
}

impl std::fmt::Display for BaseUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "http://{}{}", self.authority(), self.prefix)
    }
}
