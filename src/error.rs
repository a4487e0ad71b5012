use chrono::Utc;
use rocket::http::Status;
use rocket::response::{self, Responder};
use rocket::{Request, Response};
use serde::Serialize;
use std::io::Cursor;

use crate::auth::AuthError;

/// Error type returned by route handlers.
///
/// Renders the structured JSON body used across the whole API:
/// a status code, a message array and a timestamp.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(Vec<String>),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    DatabaseError(sqlx::Error),
    InternalError(String),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    status_code: u16,
    message: Vec<String>,
    timestamp: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(vec![message.into()])
    }

    fn status(&self) -> Status {
        match self {
            ApiError::BadRequest(_) => Status::BadRequest,
            ApiError::Unauthorized(_) => Status::Unauthorized,
            ApiError::Forbidden(_) => Status::Forbidden,
            ApiError::NotFound(_) => Status::NotFound,
            ApiError::Conflict(_) => Status::Conflict,
            ApiError::DatabaseError(_) | ApiError::InternalError(_) => {
                Status::InternalServerError
            }
        }
    }

    fn messages(&self) -> Vec<String> {
        match self {
            ApiError::BadRequest(messages) => messages.clone(),
            ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::InternalError(msg) => vec![msg.clone()],
            ApiError::DatabaseError(_) => vec!["Une erreur interne est survenue".to_string()],
        }
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let status = self.status();
        match &self {
            ApiError::DatabaseError(e) => log::error!("database error: {}", e),
            ApiError::InternalError(msg) => log::error!("internal error: {}", msg),
            other => log::debug!("request failed: {:?}", other),
        }

        let body = ErrorBody {
            status_code: status.code,
            message: self.messages(),
            timestamp: Utc::now().to_rfc3339(),
        };

        let json = serde_json::to_string(&body).unwrap_or_else(|_| {
            r#"{"statusCode":500,"message":["Une erreur interne est survenue"]}"#.to_string()
        });

        Response::build()
            .status(status)
            .header(rocket::http::ContentType::JSON)
            .sized_body(json.len(), Cursor::new(json))
            .ok()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Ressource non trouvée".to_string()),
            _ => ApiError::DatabaseError(err),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err.status().code {
            400 => ApiError::BadRequest(vec![err.to_string()]),
            401 => ApiError::Unauthorized(err.to_string()),
            403 => ApiError::Forbidden(err.to_string()),
            404 => ApiError::NotFound(err.to_string()),
            409 => ApiError::Conflict(err.to_string()),
            _ => ApiError::InternalError(err.to_string()),
        }
    }
}
