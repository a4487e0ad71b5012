//! Error catchers rendering the structured JSON body for failures that never
//! reach a handler (guard rejections, unmatched routes, malformed bodies).

use chrono::Utc;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::Request;
use serde::Serialize;

/// Failure recorded by a request guard so the catcher can surface the precise
/// message instead of a generic one.
#[derive(Debug, Default)]
pub struct GuardFailure(pub Option<(u16, String)>);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaughtError {
    status_code: u16,
    message: Vec<String>,
    timestamp: String,
}

fn body(request: &Request<'_>, status: Status, fallback: &str) -> Json<CaughtError> {
    let cached = request.local_cache(GuardFailure::default);
    let message = match &cached.0 {
        Some((code, message)) if *code == status.code => message.clone(),
        _ => fallback.to_string(),
    };

    Json(CaughtError {
        status_code: status.code,
        message: vec![message],
        timestamp: Utc::now().to_rfc3339(),
    })
}

#[catch(400)]
pub fn bad_request(request: &Request<'_>) -> Json<CaughtError> {
    body(request, Status::BadRequest, "Données invalides")
}

#[catch(401)]
pub fn unauthorized(request: &Request<'_>) -> Json<CaughtError> {
    body(request, Status::Unauthorized, "Non authentifié")
}

#[catch(403)]
pub fn forbidden(request: &Request<'_>) -> Json<CaughtError> {
    body(request, Status::Forbidden, "Accès refusé")
}

#[catch(404)]
pub fn not_found(request: &Request<'_>) -> Json<CaughtError> {
    body(request, Status::NotFound, "Ressource non trouvée")
}

#[catch(422)]
pub fn unprocessable(request: &Request<'_>) -> Json<CaughtError> {
    body(request, Status::UnprocessableEntity, "Données invalides")
}

#[catch(500)]
pub fn internal_error(request: &Request<'_>) -> Json<CaughtError> {
    body(
        request,
        Status::InternalServerError,
        "Une erreur interne est survenue",
    )
}
