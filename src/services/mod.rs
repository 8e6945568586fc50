pub mod clock;
pub mod mail_service;
pub mod otp_generator;
pub mod otp_service;
pub mod password_service;
pub mod rate_limiter;
