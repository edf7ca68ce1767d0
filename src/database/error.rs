use std::fmt::{self, Display};

use serde::Serialize;
use warp::{
    http::StatusCode,
    reject::{self, Rejection},
    reply::{self, Reply, Response},
};

/// Error surfaced at the request boundary. `code` is the HTTP status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub code: u16,
    pub info: Option<String>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    detail: &'a str,
}

impl Error {
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn detail(&self) -> &str {
        match &self.info {
            Some(info) => info,
            None => self.status().canonical_reason().unwrap_or("Unknown error"),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code, self.detail())
    }
}

impl std::error::Error for Error {}

impl reject::Reject for Error {}

impl Reply for Error {
    fn into_response(self) -> Response {
        let body = reply::json(&ErrorBody {
            detail: self.detail(),
        });
        reply::with_status(body, self.status()).into_response()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HtmlError {
    InvalidRequest,
    Unauthorized,
    NotFound,
    MethodNotAllowed,
    PayloadTooLarge,
    InternalServerError,
}

impl HtmlError {
    pub fn code(&self) -> u16 {
        match self {
            HtmlError::InvalidRequest => 400,
            HtmlError::Unauthorized => 401,
            HtmlError::NotFound => 404,
            HtmlError::MethodNotAllowed => 405,
            HtmlError::PayloadTooLarge => 413,
            HtmlError::InternalServerError => 500,
        }
    }

    pub fn new(self, info: &str) -> Error {
        Error {
            code: self.code(),
            info: Some(info.to_string()),
        }
    }

    pub fn default(self) -> Error {
        let info = match self {
            HtmlError::InvalidRequest => "Invalid request",
            HtmlError::Unauthorized => "Authentication credentials were not provided",
            HtmlError::NotFound => "Not found",
            HtmlError::MethodNotAllowed => "Method not allowed",
            HtmlError::PayloadTooLarge => "Payload too large",
            HtmlError::InternalServerError => "Internal server error",
        };
        self.new(info)
    }
}

pub struct QueryError {
    error: Error,
}

impl QueryError {
    pub fn new(info: String) -> Self {
        log::error!("Query failed: {info}");
        Self {
            error: HtmlError::InternalServerError.default(),
        }
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::Database(e) if e.is_unique_violation() => Self {
                error: HtmlError::InvalidRequest.new(unique_violation_info(e.constraint())),
            },
            sqlx::Error::Database(e) if e.is_foreign_key_violation() => Self {
                error: HtmlError::InvalidRequest.new("Referenced object does not exist"),
            },
            sqlx::Error::Database(e) => Self::new(format!("{e}")),
            sqlx::Error::RowNotFound => Self {
                error: HtmlError::NotFound.default(),
            },
            sqlx::Error::Configuration(e) => Self::new(format!("{e}")),
            sqlx::Error::Io(e) => Self::new(format!("{e}")),
            sqlx::Error::Tls(e) => Self::new(format!("{e}")),
            sqlx::Error::Protocol(e) => Self::new(e),
            sqlx::Error::TypeNotFound { type_name } => {
                Self::new(format!("Type not found: {type_name}"))
            }
            sqlx::Error::ColumnNotFound(e) => Self::new(e),
            sqlx::Error::ColumnDecode { index, source } => {
                Self::new(format!("Column decode {index} ({source})"))
            }
            sqlx::Error::Decode(e) => Self::new(format!("{e}")),
            sqlx::Error::PoolTimedOut => Self::new(String::from("Pool timed out")),
            sqlx::Error::PoolClosed => Self::new(String::from("Pool closed")),
            sqlx::Error::Migrate(e) => Self::new(format!("{e}")),
            e => Self::new(format!("{e}")),
        }
    }
}

fn unique_violation_info(constraint: Option<&str>) -> &'static str {
    match constraint {
        Some("users_email_key") => "User with this email already exists",
        _ => "Object already exists",
    }
}

impl From<QueryError> for Error {
    fn from(value: QueryError) -> Self {
        value.error
    }
}

impl From<sqlx::Error> for Error {
    fn from(value: sqlx::Error) -> Self {
        QueryError::from(value).into()
    }
}

/// Malformed value in a query string or payload field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeError {
    info: String,
}

impl TypeError {
    pub fn new(info: &str) -> Self {
        Self {
            info: info.to_string(),
        }
    }
}

impl From<TypeError> for Error {
    fn from(value: TypeError) -> Self {
        HtmlError::InvalidRequest.new(&value.info)
    }
}

impl Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.info)
    }
}

impl std::error::Error for TypeError {}

impl From<TypeError> for Rejection {
    fn from(value: TypeError) -> Self {
        Error::from(value).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_errors_are_bad_requests() {
        let error: Error = TypeError::new("Invalid id").into();

        assert_eq!(error.code, 400);
        assert_eq!(error.detail(), "Invalid id");
    }

    #[test]
    fn row_not_found_hides_existence() {
        let error: Error = sqlx::Error::RowNotFound.into();

        assert_eq!(error.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn internal_errors_do_not_leak_details() {
        let error: Error = sqlx::Error::PoolTimedOut.into();

        assert_eq!(error.code, 500);
        assert_eq!(error.detail(), "Internal server error");
    }

    #[test]
    fn error_reply_carries_status() {
        let response = HtmlError::Unauthorized.default().into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
