use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub database_name: String,
    pub mail_api_url: String,
    pub mail_api_key: String,
    pub mail_from: String,
    pub port: u16,
    pub host: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        dotenv().ok();

        AppConfig {
            database_url: env::var("DATABASE_URL")
                .expect("DATABASE_URL must be set"),
            database_name: env::var("DATABASE_NAME")
                .unwrap_or_else(|_| "recoverydb".to_string()),
            mail_api_url: env::var("MAIL_API_URL")
                .expect("MAIL_API_URL must be set"),
            mail_api_key: env::var("MAIL_API_KEY")
                .expect("MAIL_API_KEY must be set"),
            mail_from: env::var("MAIL_FROM")
                .unwrap_or_else(|_| "no-reply@recovery.local".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .expect("PORT must be a number"),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
        }
    }
}
