use axum::{routing::post, Router};

use crate::{handlers::auth_otp, state::AppState};

pub fn auth_otp_routes() -> Router<AppState> {
    Router::new()
        // Request a recovery code for password reset
        .route("/auth/forgot-password", post(auth_otp::forgot_password))
        // Verify a submitted code
        .route("/auth/verify-otp", post(auth_otp::verify_otp))
        // Reset the password with a verified code
        .route("/auth/reset-password", post(auth_otp::reset_password))
}
