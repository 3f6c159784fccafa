//! Configuration for the directory server and its clients.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Well-known path of the registration endpoint.
pub const DEFAULT_SERVICES_PATH: &str = "/services";

/// Well-known port of the directory.
pub const DEFAULT_DIRECTORY_PORT: u16 = 3000;

/// Outbound HTTP settings shared by patch delivery and the discovery client.
#[derive(Clone, Debug)]
pub struct HttpConfig {
    /// Upper bound for one request, including reading the status line.
    pub request_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Directory server configuration.
#[derive(Clone, Debug)]
pub struct DirectoryConfig {
    /// Address the registration endpoint listens on.
    pub bind_addr: SocketAddr,
    /// Path of the registration endpoint.
    pub services_path: String,
    /// Settings for pushing patches.
    pub http: HttpConfig,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_DIRECTORY_PORT)),
            services_path: DEFAULT_SERVICES_PATH.to_owned(),
            http: HttpConfig::default(),
        }
    }
}

impl DirectoryConfig {
    /// Set the listen address.
    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the registration path. A missing leading `/` is added.
    pub fn services_path(mut self, path: impl Into<String>) -> Self {
        self.services_path = normalize_path(path.into());
        self
    }

    /// Set the patch delivery timeout.
    pub fn request_timeout(mut self, d: Duration) -> Self {
        self.http.request_timeout = d;
        self
    }
}

/// Route paths must be absolute.
pub(crate) fn normalize_path(path: String) -> String {
    if path.starts_with('/') {
        path
    } else {
        format!("/{path}")
    }
}

/// Discovery client configuration.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Full URL of the directory's registration endpoint.
    pub directory_url: String,
    /// Settings for register/deregister calls.
    pub http: HttpConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            directory_url: format!("http://localhost:{DEFAULT_DIRECTORY_PORT}{DEFAULT_SERVICES_PATH}"),
            http: HttpConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Point the client at a directory.
    pub fn directory_url(mut self, url: impl Into<String>) -> Self {
        self.directory_url = url.into();
        self
    }

    /// Set the request timeout.
    pub fn request_timeout(mut self, d: Duration) -> Self {
        self.http.request_timeout = d;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_well_known_endpoint() {
        let dir = DirectoryConfig::default();
        assert_eq!(dir.bind_addr.port(), 3000);
        assert_eq!(dir.services_path, "/services");

        let client = ClientConfig::default();
        assert_eq!(client.directory_url, "http://localhost:3000/services");
    }

    #[test]
    fn services_path_is_made_absolute() {
        assert_eq!(DirectoryConfig::default().services_path("services").services_path, "/services");
        assert_eq!(DirectoryConfig::default().services_path("/v1/services").services_path, "/v1/services");
        assert_eq!(DirectoryConfig::default().services_path("").services_path, "/");
    }
}
