use std::process::ExitCode;

use anyhow::Result;
use serde::Serialize;
use taskbridge_core::batch::{BatchItem, BatchOutcome};
use taskbridge_core::result::{ErrorCode, ErrorRecord, TypedResult};
use taskbridge_render::{render, OutputFormat, Render};

pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_VALIDATION: u8 = 2;
pub const EXIT_NOT_RUNNING: u8 = 3;
pub const EXIT_NOT_FOUND: u8 = 4;
pub const EXIT_PARSE: u8 = 5;
pub const EXIT_PARTIAL: u8 = 6;

pub fn exit_code(error: &ErrorRecord) -> u8 {
    match error.code {
        ErrorCode::NotRunning => EXIT_NOT_RUNNING,
        code if code.is_not_found() => EXIT_NOT_FOUND,
        code if code.is_validation() => EXIT_VALIDATION,
        ErrorCode::JsonParseError => EXIT_PARSE,
        _ => EXIT_FAILURE,
    }
}

/// Prints a result and returns the process exit code for it. JSON always
/// goes to stdout; text and CSV failures go to stderr.
pub fn emit<T: Render + Serialize>(result: &TypedResult<T>, format: OutputFormat) -> Result<ExitCode> {
    let body = render(result, format)?;
    let code = match result.error() {
        None => 0,
        Some(error) => exit_code(error),
    };
    if code != 0 && format != OutputFormat::Json {
        eprintln!("{}", body);
    } else if !body.is_empty() {
        if body.ends_with('\n') {
            print!("{}", body);
        } else {
            println!("{}", body);
        }
    }
    Ok(ExitCode::from(code))
}

/// Like [`emit`], but a batch with any failed id exits as partial.
pub fn emit_batch(
    result: &TypedResult<BatchOutcome<BatchItem>>,
    format: OutputFormat,
) -> Result<ExitCode> {
    let code = emit(result, format)?;
    match result.data() {
        Some(outcome) if !outcome.is_complete_success() => Ok(ExitCode::from(EXIT_PARTIAL)),
        _ => Ok(code),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_by_error_category() {
        let cases = [
            (ErrorCode::NotRunning, EXIT_NOT_RUNNING),
            (ErrorCode::TaskNotFound, EXIT_NOT_FOUND),
            (ErrorCode::PerspectiveNotFound, EXIT_NOT_FOUND),
            (ErrorCode::InvalidIdFormat, EXIT_VALIDATION),
            (ErrorCode::InvalidDateFormat, EXIT_VALIDATION),
            (ErrorCode::ValidationError, EXIT_VALIDATION),
            (ErrorCode::JsonParseError, EXIT_PARSE),
            (ErrorCode::AutomationError, EXIT_FAILURE),
            (ErrorCode::UnknownError, EXIT_FAILURE),
        ];
        for (code, expected) in cases {
            assert_eq!(exit_code(&ErrorRecord::new(code, "x")), expected, "{}", code);
        }
    }
}
