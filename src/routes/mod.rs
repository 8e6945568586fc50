pub mod auth;
pub mod auth_otp_routes;
