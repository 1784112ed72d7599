//! Structured, serialisable operation results
//!
//! Collaborators that cannot consume a Rust `Result` (UI layers, scripts
//! reading `--json` output) get `{"success": true, ...}` or
//! `{"success": false, "error": {"kind": ..., "message": ...}}`.

use serde::Serialize;

use crate::error::{ErrorKind, SnapKeepError, SnapKeepResult};

#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&SnapKeepError> for ErrorReport {
    fn from(err: &SnapKeepError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Outcome<T> {
    pub success: bool,
    #[serde(flatten)]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorReport>,
}

impl<T> Outcome<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// A completed operation whose payload reports a negative result
    pub fn with_flag(success: bool, data: T) -> Self {
        Self {
            success,
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(err: &SnapKeepError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(err.into()),
        }
    }
}

impl<T> From<SnapKeepResult<T>> for Outcome<T> {
    fn from(result: SnapKeepResult<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::failed(&e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Payload {
        backup_id: String,
    }

    #[test]
    fn test_success_flattens_payload() {
        let outcome: Outcome<Payload> = Ok(Payload {
            backup_id: "b1".into(),
        })
        .into();
        let value = serde_json::to_value(&outcome).unwrap();

        assert_eq!(value["success"], true);
        assert_eq!(value["backup_id"], "b1");
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_failure_carries_kind() {
        let outcome: Outcome<Payload> = Err(SnapKeepError::backup_not_found("b9")).into();
        let value = serde_json::to_value(&outcome).unwrap();

        assert_eq!(value["success"], false);
        assert_eq!(value["error"]["kind"], "NotFound");
        assert_eq!(value["error"]["message"], "Backup not found: b9");
    }
}
