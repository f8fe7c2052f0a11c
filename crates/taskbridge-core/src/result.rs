use std::fmt;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

/// Closed set of failure codes handed to adapters.
///
/// Adapters map these onto exit codes and protocol error flags. They must
/// never look at the diagnostic text that produced a code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotRunning,
    TaskNotFound,
    ProjectNotFound,
    TagNotFound,
    FolderNotFound,
    PerspectiveNotFound,
    InvalidDateFormat,
    InvalidIdFormat,
    ValidationError,
    AutomationError,
    JsonParseError,
    UnknownError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NotRunning => "NOT_RUNNING",
            ErrorCode::TaskNotFound => "TASK_NOT_FOUND",
            ErrorCode::ProjectNotFound => "PROJECT_NOT_FOUND",
            ErrorCode::TagNotFound => "TAG_NOT_FOUND",
            ErrorCode::FolderNotFound => "FOLDER_NOT_FOUND",
            ErrorCode::PerspectiveNotFound => "PERSPECTIVE_NOT_FOUND",
            ErrorCode::InvalidDateFormat => "INVALID_DATE_FORMAT",
            ErrorCode::InvalidIdFormat => "INVALID_ID_FORMAT",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::AutomationError => "AUTOMATION_ERROR",
            ErrorCode::JsonParseError => "JSON_PARSE_ERROR",
            ErrorCode::UnknownError => "UNKNOWN_ERROR",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ErrorCode::TaskNotFound
                | ErrorCode::ProjectNotFound
                | ErrorCode::TagNotFound
                | ErrorCode::FolderNotFound
                | ErrorCode::PerspectiveNotFound
        )
    }

    /// Codes produced locally, before any interpreter process is spawned.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ErrorCode::InvalidIdFormat | ErrorCode::InvalidDateFormat | ErrorCode::ValidationError
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct ErrorRecord {
    pub code: ErrorCode,
    pub message: String,
    /// Raw diagnostic text, for humans only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ErrorRecord {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Envelope returned by every bridge operation.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedResult<T> {
    Success { data: T },
    Failure { error: ErrorRecord },
}

pub fn success<T>(data: T) -> TypedResult<T> {
    TypedResult::Success { data }
}

pub fn failure<T>(error: ErrorRecord) -> TypedResult<T> {
    TypedResult::Failure { error }
}

/// Failure for errors that fit no other code.
pub fn failure_message<T>(message: impl Into<String>) -> TypedResult<T> {
    failure(ErrorRecord::new(ErrorCode::UnknownError, message))
}

impl<T> TypedResult<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, TypedResult::Success { .. })
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            TypedResult::Success { data } => Some(data),
            TypedResult::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorRecord> {
        match self {
            TypedResult::Success { .. } => None,
            TypedResult::Failure { error } => Some(error),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> TypedResult<U> {
        match self {
            TypedResult::Success { data } => success(f(data)),
            TypedResult::Failure { error } => failure(error),
        }
    }

    pub fn and_then<U>(self, f: impl FnOnce(T) -> TypedResult<U>) -> TypedResult<U> {
        match self {
            TypedResult::Success { data } => f(data),
            TypedResult::Failure { error } => failure(error),
        }
    }

    pub fn into_result(self) -> Result<T, ErrorRecord> {
        match self {
            TypedResult::Success { data } => Ok(data),
            TypedResult::Failure { error } => Err(error),
        }
    }
}

impl<T: Serialize> Serialize for TypedResult<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("TypedResult", 3)?;
        match self {
            TypedResult::Success { data } => {
                state.serialize_field("success", &true)?;
                state.serialize_field("data", data)?;
                state.serialize_field("error", &Option::<ErrorRecord>::None)?;
            }
            TypedResult::Failure { error } => {
                state.serialize_field("success", &false)?;
                state.serialize_field("data", &Option::<T>::None)?;
                state.serialize_field("error", error)?;
            }
        }
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_serializes_with_null_error() {
        let value = serde_json::to_value(success(vec![1, 2])).expect("json");
        assert_eq!(
            value,
            serde_json::json!({"success": true, "data": [1, 2], "error": null})
        );
    }

    #[test]
    fn failure_serializes_with_null_data() {
        let result: TypedResult<u32> =
            failure(ErrorRecord::new(ErrorCode::TaskNotFound, "Task not found").with_detail("raw"));
        let value = serde_json::to_value(result).expect("json");
        assert_eq!(value["success"], false);
        assert!(value["data"].is_null());
        assert_eq!(value["error"]["code"], "TASK_NOT_FOUND");
        assert_eq!(value["error"]["detail"], "raw");
    }

    #[test]
    fn failure_message_is_an_unknown_error() {
        let result: TypedResult<()> = failure_message("fragment missing");
        let error = result.into_result().expect_err("failure");
        assert_eq!(error.code, ErrorCode::UnknownError);
        assert_eq!(error.message, "fragment missing");
        assert!(error.detail.is_none());
    }

    #[test]
    fn code_strings_match_serde_names() {
        for code in [
            ErrorCode::NotRunning,
            ErrorCode::PerspectiveNotFound,
            ErrorCode::JsonParseError,
        ] {
            let json = serde_json::to_value(code).expect("json");
            assert_eq!(json, code.as_str());
        }
    }
}
