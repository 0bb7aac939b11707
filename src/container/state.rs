// ABOUTME: Rendered container state and the PUT /state action plan.
// ABOUTME: StatePut is the wire request; StateAction is what the lifecycle verbs execute.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::ContainerError;
use crate::runtime::NetworkAddress;
use crate::status::StatusCode;
use crate::types::{ContainerName, ImageId};

/// Point-in-time status of one container.
#[derive(Debug, Clone, Serialize)]
pub struct ContainerState {
    pub status: String,
    pub status_code: StatusCode,
    /// PID of the container's init, only while Running.
    pub init: Option<u32>,
    /// Addresses, only while Running.
    pub ips: Vec<NetworkAddress>,
}

impl ContainerState {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status: status.as_str().to_string(),
            status_code: status,
            init: None,
            ips: Vec::new(),
        }
    }
}

/// Full representation returned by `GET /1.0/containers/{name}`.
#[derive(Debug, Clone, Serialize)]
pub struct ContainerView {
    pub name: ContainerName,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageId>,
    pub state: ContainerState,
    pub snaps: Vec<String>,
}

fn default_timeout() -> i64 {
    -1
}

/// Body of `PUT /1.0/containers/{name}/state`.
#[derive(Debug, Clone, Deserialize)]
pub struct StatePut {
    pub action: String,

    /// Seconds; negative means no deadline.
    #[serde(default = "default_timeout")]
    pub timeout: i64,

    #[serde(default)]
    pub force: bool,
}

/// Lifecycle verb selected by a state request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateAction {
    Start,
    Stop,
    Shutdown { timeout: Option<Duration> },
    Restart { timeout: Option<Duration>, force: bool },
    Freeze,
    Unfreeze,
}

impl StatePut {
    fn deadline(&self) -> Option<Duration> {
        u64::try_from(self.timeout).ok().map(Duration::from_secs)
    }

    /// Pick the verb. A stop that is forced or has a zero timeout is a hard stop.
    pub fn plan(&self) -> Result<StateAction, ContainerError> {
        match self.action.as_str() {
            "start" => Ok(StateAction::Start),
            "stop" if self.force || self.timeout == 0 => Ok(StateAction::Stop),
            "stop" => Ok(StateAction::Shutdown {
                timeout: self.deadline(),
            }),
            "restart" => Ok(StateAction::Restart {
                timeout: self.deadline(),
                force: self.force || self.timeout == 0,
            }),
            "freeze" => Ok(StateAction::Freeze),
            "unfreeze" => Ok(StateAction::Unfreeze),
            other => Err(ContainerError::InvalidAction(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put(json: &str) -> StatePut {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn stop_defaults_to_unbounded_shutdown() {
        assert_eq!(
            put(r#"{"action":"stop"}"#).plan().unwrap(),
            StateAction::Shutdown { timeout: None }
        );
    }

    #[test]
    fn zero_timeout_or_force_is_hard_stop() {
        assert_eq!(
            put(r#"{"action":"stop","timeout":0}"#).plan().unwrap(),
            StateAction::Stop
        );
        assert_eq!(
            put(r#"{"action":"stop","timeout":30,"force":true}"#)
                .plan()
                .unwrap(),
            StateAction::Stop
        );
    }

    #[test]
    fn unknown_action_is_rejected() {
        let err = put(r#"{"action":"explode"}"#).plan().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::BadRequest);
    }
}
