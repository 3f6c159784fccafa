//! Minimal service discovery: a central directory that tracks live service
//! instances and pushes dependency updates, and a client-side provider cache.

#![deny(missing_docs)]

pub mod client;
pub mod config;
pub mod delivery;
pub mod directory;
pub mod error;
pub mod patch;
pub mod providers;
pub mod registration;
pub mod server;
pub mod service;
pub mod transport;

// Re-export key types
pub use client::DiscoveryClient;
pub use config::{ClientConfig, DirectoryConfig, HttpConfig};
pub use delivery::{DeliveryFailure, HttpPatchSender, PatchSender};
pub use directory::Directory;
pub use error::{Error, Result};
pub use patch::{Patch, PatchEntry};
pub use providers::ProviderCache;
pub use registration::{Registration, ServiceName, GRADING_SERVICE, LOG_SERVICE, PORTAL_SERVICE};
pub use server::{directory_router, DirectoryGuard, DirectoryServer};
pub use service::{ServiceGuard, ServiceHost};
pub use transport::HttpClient;
