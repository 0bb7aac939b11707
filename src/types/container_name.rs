// ABOUTME: Validated container and snapshot names.
// ABOUTME: Snapshots are namespaced under their parent as `parent/snap`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Separator between a parent container name and a snapshot name.
pub const SNAPSHOT_DELIMITER: char = '/';

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContainerNameError {
    #[error("container name cannot be empty")]
    Empty,

    #[error("container name exceeds maximum length of 63 characters")]
    TooLong,

    #[error("container name cannot start with a digit or a hyphen")]
    InvalidStart,

    #[error("container name cannot end with a hyphen")]
    EndsWithHyphen,

    #[error("invalid character in container name: '{0}'")]
    InvalidChar(char),

    #[error("snapshot name cannot be empty")]
    EmptySnapshot,

    #[error("invalid character in snapshot name: '{0}'")]
    InvalidSnapshotChar(char),

    #[error("snapshot name cannot start with '.'")]
    HiddenSnapshot,
}

/// Name of a container, or of a snapshot when it has the form `parent/snap`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerName(String);

impl ContainerName {
    /// Parse either a regular container name or a full `parent/snap` snapshot name.
    pub fn new(value: &str) -> Result<Self, ContainerNameError> {
        match value.split_once(SNAPSHOT_DELIMITER) {
            Some((parent, snap)) => {
                let parent = Self::new_regular(parent)?;
                parent.snapshot(snap)
            }
            None => Self::new_regular(value),
        }
    }

    fn new_regular(value: &str) -> Result<Self, ContainerNameError> {
        if value.is_empty() {
            return Err(ContainerNameError::Empty);
        }

        if value.len() > 63 {
            return Err(ContainerNameError::TooLong);
        }

        if value.starts_with('-') || value.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(ContainerNameError::InvalidStart);
        }

        if value.ends_with('-') {
            return Err(ContainerNameError::EndsWithHyphen);
        }

        for c in value.chars() {
            if !c.is_ascii_alphanumeric() && c != '-' {
                return Err(ContainerNameError::InvalidChar(c));
            }
        }

        Ok(Self(value.to_string()))
    }

    /// Build the name of a snapshot of this container.
    ///
    /// Snapshots of snapshots are not a thing: the snapshot is always attached to
    /// the regular parent.
    pub fn snapshot(&self, snap: &str) -> Result<Self, ContainerNameError> {
        if snap.is_empty() {
            return Err(ContainerNameError::EmptySnapshot);
        }

        // Also rules out `.` and `..`, which would escape the parent's snapshot directory.
        if snap.starts_with('.') {
            return Err(ContainerNameError::HiddenSnapshot);
        }

        for c in snap.chars() {
            if c == SNAPSHOT_DELIMITER || c.is_whitespace() || c.is_control() {
                return Err(ContainerNameError::InvalidSnapshotChar(c));
            }
        }

        Ok(Self(format!(
            "{}{}{}",
            self.parent().as_str(),
            SNAPSHOT_DELIMITER,
            snap
        )))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_snapshot(&self) -> bool {
        self.0.contains(SNAPSHOT_DELIMITER)
    }

    /// The regular container this name belongs to (itself if not a snapshot).
    pub fn parent(&self) -> ContainerName {
        match self.0.split_once(SNAPSHOT_DELIMITER) {
            Some((parent, _)) => ContainerName(parent.to_string()),
            None => self.clone(),
        }
    }

    /// The snapshot part of a `parent/snap` name.
    pub fn snapshot_name(&self) -> Option<&str> {
        self.0.split_once(SNAPSHOT_DELIMITER).map(|(_, snap)| snap)
    }
}

impl fmt::Display for ContainerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for ContainerName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ContainerName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        ContainerName::new(&value).map_err(serde::de::Error::custom)
    }
}
