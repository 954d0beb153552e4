use mongodb::error::Error as DbError;
use rocket::{
    http::{Status, StatusClass},
    response::{self, status::Custom, Responder},
    serde::json::Json,
    Catcher, Request,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logging::RequestId;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while handling a request.
#[derive(Debug, Error)]
pub enum Error {
    /// The datastore rejected or failed an operation.
    #[error(transparent)]
    Db(#[from] DbError),
    /// The image store failed to read or write a file.
    #[error("Image storage failed: {0}")]
    Io(#[from] std::io::Error),
    /// Missing or malformed input.
    #[error("{0}")]
    Validation(String),
    /// The voter session already has a recorded vote.
    #[error("{0}")]
    DuplicateVote(String),
    /// The admin secret did not match.
    #[error("{0}")]
    Unauthorized(String),
    /// A vote arrived outside the voting window.
    #[error("{0}")]
    VotingClosed(String),
    #[error("{0} not found")]
    NotFound(String),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// The HTTP status this error is reported with.
    pub fn status(&self) -> Status {
        match self {
            Self::Db(_) | Self::Io(_) => Status::InternalServerError,
            Self::Validation(_) => Status::BadRequest,
            Self::DuplicateVote(_) => Status::Conflict,
            Self::Unauthorized(_) => Status::Unauthorized,
            Self::VotingClosed(_) => Status::Forbidden,
            Self::NotFound(_) => Status::NotFound,
        }
    }

    /// The message shown to the caller. Storage failures stay generic; the
    /// details only go to the log.
    fn public_message(&self) -> String {
        match self {
            Self::Db(_) | Self::Io(_) => "Storage operation failed".to_string(),
            other => other.to_string(),
        }
    }
}

/// JSON body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let id = req.local_cache(RequestId::next);
        let status = self.status();
        match status.class() {
            StatusClass::ServerError => error!("  req{id} failed: {self}"),
            _ => warn!("  req{id} rejected: {self}"),
        }
        let body = ErrorBody {
            error: self.public_message(),
        };
        Custom(status, Json(body)).respond_to(req)
    }
}

pub fn catchers() -> Vec<Catcher> {
    catchers![malformed_request, unprocessable_body, not_found, fallback]
}

/// The body or form could not be parsed at all.
#[catch(400)]
fn malformed_request() -> Error {
    Error::Validation("Malformed request".to_string())
}

/// The body parsed, but fields had the wrong type or shape.
#[catch(422)]
fn unprocessable_body() -> Error {
    Error::Validation("Malformed request body".to_string())
}

/// No route matched, which includes bodies with the wrong content type.
#[catch(404)]
fn not_found(req: &Request<'_>) -> Error {
    Error::not_found(format!("{} {}", req.method(), req.uri().path()))
}

#[catch(default)]
fn fallback(status: Status, _req: &Request<'_>) -> Custom<Json<ErrorBody>> {
    let body = ErrorBody {
        error: status.reason().unwrap_or("Request failed").to_string(),
    };
    Custom(status, Json(body))
}
