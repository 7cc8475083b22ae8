use std::fmt;

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadKind {
    Deployment,
    StatefulSet,
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkloadKind::Deployment => write!(f, "deployment"),
            WorkloadKind::StatefulSet => write!(f, "statefulset"),
        }
    }
}

/// Current state of a workload: its pod template images and creation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workload {
    pub kind: WorkloadKind,
    pub name: String,
    /// Container images of the pod template, in container order
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
    /// Label selector rendered as a list-query string, when the workload has one
    pub selector: Option<String>,
}

/// A historical revision of a workload (e.g. a ReplicaSet generation).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision {
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Revision {
    pub fn new<I, S>(images: I, created_at: DateTime<Utc>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            images: images.into_iter().map(Into::into).collect(),
            created_at,
        }
    }
}

impl Workload {
    pub fn deployment<I, S>(
        name: impl Into<String>,
        images: I,
        created_at: DateTime<Utc>,
        selector: Option<String>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind: WorkloadKind::Deployment,
            name: name.into(),
            images: images.into_iter().map(Into::into).collect(),
            created_at,
            selector,
        }
    }

    pub fn stateful_set<I, S>(name: impl Into<String>, images: I, created_at: DateTime<Utc>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind: WorkloadKind::StatefulSet,
            name: name.into(),
            images: images.into_iter().map(Into::into).collect(),
            created_at,
            selector: None,
        }
    }
}
