//! JWT authentication middleware
//!
//! Validates the bearer token and inserts an AuthContext into request
//! extensions for the handler-side extractor.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use noteforge_common::{
    auth::extract_bearer_token,
    errors::AppError,
};

use crate::AppState;

/// Require a valid bearer token on the request
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized {
            message: "Missing Authorization header".to_string(),
        })?;

    let token = extract_bearer_token(auth_header).ok_or_else(|| AppError::Unauthorized {
        message: "Authorization header must be a bearer token".to_string(),
    })?;

    let claims = state.jwt.validate_token(token)?;
    let context = state.jwt.context_from_claims(claims)?;

    request.extensions_mut().insert(context);

    Ok(next.run(request).await)
}
