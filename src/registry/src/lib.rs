//! Registry access for harbor-reaper.
//!
//! The cleanup engine only talks to a registry through [`RegistryClient`]:
//! list projects, repositories and artifacts, delete an artifact by digest.
//! [`HarborClient`] implements it against the Harbor v2.0 REST API.

pub mod client;
pub mod error;
pub mod harbor;
pub mod model;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use client::RegistryClient;
pub use error::RegistryError;
pub use harbor::{HarborClient, HarborSettings};
pub use model::{Artifact, Project, Repository, Tag};
