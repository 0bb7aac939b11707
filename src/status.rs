// ABOUTME: Numeric status codes shared by container states and operations.
// ABOUTME: Rendered as both a human string and an integer in API envelopes.

use serde::{Serialize, Serializer};
use std::fmt;

/// Status codes used in API envelopes.
///
/// Container states and operation states share one table so clients can
/// interpret `status_code` without knowing which resource produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Ok,
    Started,
    Stopped,
    Running,
    Cancelling,
    Pending,
    Starting,
    Stopping,
    Aborting,
    Freezing,
    Frozen,
    Thawed,
    Error,
    Success,
    Failure,
    Cancelled,
}

impl StatusCode {
    pub fn code(self) -> u16 {
        match self {
            StatusCode::Ok => 100,
            StatusCode::Started => 101,
            StatusCode::Stopped => 102,
            StatusCode::Running => 103,
            StatusCode::Cancelling => 104,
            StatusCode::Pending => 105,
            StatusCode::Starting => 106,
            StatusCode::Stopping => 107,
            StatusCode::Aborting => 108,
            StatusCode::Freezing => 109,
            StatusCode::Frozen => 110,
            StatusCode::Thawed => 111,
            StatusCode::Error => 112,
            StatusCode::Success => 200,
            StatusCode::Failure => 400,
            StatusCode::Cancelled => 401,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::Started => "Started",
            StatusCode::Stopped => "Stopped",
            StatusCode::Running => "Running",
            StatusCode::Cancelling => "Cancelling",
            StatusCode::Pending => "Pending",
            StatusCode::Starting => "Starting",
            StatusCode::Stopping => "Stopping",
            StatusCode::Aborting => "Aborting",
            StatusCode::Freezing => "Freezing",
            StatusCode::Frozen => "Frozen",
            StatusCode::Thawed => "Thawed",
            StatusCode::Error => "Error",
            StatusCode::Success => "Success",
            StatusCode::Failure => "Failure",
            StatusCode::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Serialized as the integer code; the string form goes in a sibling `status` field.
impl Serialize for StatusCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_api_table() {
        assert_eq!(StatusCode::Ok.code(), 100);
        assert_eq!(StatusCode::Running.code(), 103);
        assert_eq!(StatusCode::Success.code(), 200);
        assert_eq!(StatusCode::Cancelled.code(), 401);
    }

    #[test]
    fn serializes_as_integer() {
        let json = serde_json::to_string(&StatusCode::Failure).unwrap();
        assert_eq!(json, "400");
    }
}
