use axum::{extract::State, Json};
use validator::Validate;

use crate::dtos::auth_dtos::{RegisterRequest, RegisterResponse};
use crate::errors::{AppError, Result};
use crate::state::AppState;

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>> {
    req.validate()
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    state.otp_service.register(&req.email, &req.password).await?;

    Ok(Json(RegisterResponse {
        success: true,
        message: "Account created".to_string(),
    }))
}
