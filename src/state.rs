use mongodb::Database;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::database::mongo::MongoAccountStore;
use crate::services::clock::SystemClock;
use crate::services::mail_service::MailService;
use crate::services::otp_generator::{OtpGenerator, RandomCodeSource};
use crate::services::otp_service::OtpService;
use crate::services::password_service::PasswordService;
use crate::services::rate_limiter::RateLimiter;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub otp_service: Arc<OtpService>,
}

impl AppState {
    pub fn new(db: Database, config: &AppConfig) -> Self {
        let store = Arc::new(MongoAccountStore::new(db.clone()));
        let mailer = Arc::new(MailService::new(config));
        let generator = OtpGenerator::new(Arc::new(RandomCodeSource));

        let otp_service = Arc::new(OtpService::new(
            store,
            mailer,
            generator,
            RateLimiter::new(),
            PasswordService::new(),
            Arc::new(SystemClock),
        ));

        AppState { db, otp_service }
    }
}
