use axum::{extract::State, Json};
use validator::Validate;

use crate::dtos::auth_dtos::{
    ForgotPasswordRequest, ForgotPasswordResponse, ResetPasswordRequest, ResetPasswordResponse,
    VerifyOtpRequest, VerifyOtpResponse,
};
use crate::errors::{AppError, Result};
use crate::state::AppState;

// 1. Forgot Password - request a recovery code
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<Json<ForgotPasswordResponse>> {
    req.validate()
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    let expires_at = state.otp_service.request_code(&req.email).await?;

    Ok(Json(ForgotPasswordResponse {
        success: true,
        message: "Recovery code sent to your email".to_string(),
        expires_at,
    }))
}

// 2. Verify the code
pub async fn verify_otp(
    State(state): State<AppState>,
    Json(req): Json<VerifyOtpRequest>,
) -> Result<Json<VerifyOtpResponse>> {
    req.validate()
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    state.otp_service.verify_code(&req.email, &req.code).await?;

    Ok(Json(VerifyOtpResponse {
        success: true,
        message: "Code verified successfully".to_string(),
    }))
}

// 3. Reset password with a valid code
pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<ResetPasswordResponse>> {
    req.validate()
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    state
        .otp_service
        .reset_password(&req.email, &req.code, &req.new_password)
        .await?;

    Ok(Json(ResetPasswordResponse {
        success: true,
        message: "Password reset successful".to_string(),
    }))
}
