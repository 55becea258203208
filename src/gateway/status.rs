//! Response status supplied by a gateway app.

use axum::http::StatusCode;
use thiserror::Error;

/// Status as handed to `StartResponse::start`: a bare code or a status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Code(u16),
    Line(String),
}

/// A status that cannot be turned into a code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("status cannot be turned into a code: {0}")]
pub struct InvalidStatus(pub String);

impl Status {
    /// Resolve to a status code. Lines must begin with the code, optionally
    /// followed by a space and a reason phrase.
    pub fn resolve(&self) -> Result<StatusCode, InvalidStatus> {
        let code = match self {
            Status::Code(code) => *code,
            Status::Line(line) => line
                .split(' ')
                .next()
                .and_then(|code| code.parse::<u16>().ok())
                .ok_or_else(|| InvalidStatus(format!("{:?}", line)))?,
        };
        StatusCode::from_u16(code).map_err(|_| InvalidStatus(code.to_string()))
    }
}

impl From<u16> for Status {
    fn from(code: u16) -> Self {
        Status::Code(code)
    }
}

impl From<StatusCode> for Status {
    fn from(code: StatusCode) -> Self {
        Status::Code(code.as_u16())
    }
}

impl From<&str> for Status {
    fn from(line: &str) -> Self {
        Status::Line(line.to_string())
    }
}

impl From<String> for Status {
    fn from(line: String) -> Self {
        Status::Line(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_and_line() {
        assert_eq!(Status::from(200u16).resolve(), Ok(StatusCode::OK));
        assert_eq!(
            Status::from("404 Not Found").resolve(),
            Ok(StatusCode::NOT_FOUND)
        );
        assert_eq!(Status::from("204").resolve(), Ok(StatusCode::NO_CONTENT));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(Status::from("OK 200").resolve().is_err());
        assert!(Status::from("").resolve().is_err());
        assert!(Status::from(" 200 OK").resolve().is_err());
        assert!(Status::from(42u16).resolve().is_err());
    }
}
