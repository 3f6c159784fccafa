//! Registration descriptor presented by a service instance.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::{Error, Result};

/// Identifier of a service kind. Several instances may share one name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceName(String);

impl ServiceName {
    /// Create a service name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Borrow the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if the name is the empty string.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServiceName {
    fn from(name: &str) -> Self {
        Self(name.to_owned())
    }
}

impl From<String> for ServiceName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Central log relay.
pub const LOG_SERVICE: &str = "LogService";
/// Grades CRUD service.
pub const GRADING_SERVICE: &str = "GradingService";
/// Web portal.
pub const PORTAL_SERVICE: &str = "PortalService";

/// A service instance's self-description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    /// Kind of service this instance provides.
    #[serde(rename = "ServiceName")]
    pub service_name: ServiceName,

    /// Address of this instance; unique among live registrations.
    #[serde(rename = "ServiceURL")]
    pub service_url: String,

    /// Service kinds this instance depends on.
    #[serde(
        rename = "RequiredServices",
        alias = "RequireServices",
        default,
        deserialize_with = "null_as_empty"
    )]
    pub required_services: Vec<ServiceName>,

    /// Where the directory pushes patches for this instance.
    #[serde(rename = "ServiceUpdateURL", default)]
    pub update_url: String,
}

impl Registration {
    /// Create a registration without dependencies.
    pub fn new(
        service_name: impl Into<ServiceName>,
        service_url: impl Into<String>,
        update_url: impl Into<String>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            service_url: service_url.into(),
            required_services: Vec::new(),
            update_url: update_url.into(),
        }
    }

    /// Declare a dependency on another service kind.
    pub fn require(mut self, name: impl Into<ServiceName>) -> Self {
        self.required_services.push(name.into());
        self
    }

    /// True if this instance declared `name` as a dependency.
    pub fn requires(&self, name: &ServiceName) -> bool {
        self.required_services.iter().any(|r| r == name)
    }

    /// Reject registrations the directory cannot track.
    ///
    /// An instance with dependencies must also say where to push updates.
    pub fn validate(&self) -> Result<()> {
        if self.service_name.is_empty() {
            return Err(Error::validation("service name is empty"));
        }
        if self.service_url.is_empty() {
            return Err(Error::validation("service URL is empty"));
        }
        if !self.required_services.is_empty() && self.update_url.is_empty() {
            return Err(Error::validation(format!(
                "service {} declares dependencies but no update URL",
                self.service_name
            )));
        }
        Ok(())
    }
}

/// Decode a JSON `null` list as an empty one.
pub(crate) fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
