use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("failed to load kubeconfig {path}: {message}")]
    Kubeconfig { path: PathBuf, message: String },

    #[error("failed to create cluster client: {0}")]
    Client(String),

    #[error("failed to list {resource} in namespace {namespace}: {message}")]
    Api {
        resource: &'static str,
        namespace: String,
        message: String,
    },
}
