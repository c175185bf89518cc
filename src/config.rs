use anyhow::anyhow;
use shuttle_runtime::SecretStore;

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: String,
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub frontend_url: String,
    pub loops_api_key: String,
    pub loops_verify_email_id: String,
    pub aws_region: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub s3_bucket: String,
    pub cookie_secure: bool,
    pub admin_seed: Option<(String, String)>,
}

fn required(secret_store: &SecretStore, key: &str) -> Result<String, anyhow::Error> {
    secret_store
        .get(key)
        .ok_or_else(|| anyhow!("{} not found", key))
}

impl AppConfig {
    pub fn new(secret_store: &SecretStore) -> Result<Self, anyhow::Error> {
        let cookie_secure = match secret_store.get("COOKIE_SECURE") {
            Some(value) => value
                .parse::<bool>()
                .map_err(|_| anyhow!("COOKIE_SECURE must be true or false, got {}", value))?,
            None => true,
        };

        // Both halves are needed to seed an admin account
        let admin_seed = match (
            secret_store.get("ADMIN_EMAIL"),
            secret_store.get("ADMIN_PASSWORD"),
        ) {
            (Some(email), Some(password)) => Some((email, password)),
            _ => None,
        };

        Ok(AppConfig {
            database_url: required(secret_store, "DATABASE_URL")?,
            jwt_secret: required(secret_store, "JWT_SECRET")?,
            stripe_secret_key: required(secret_store, "STRIPE_SECRET_KEY")?,
            stripe_webhook_secret: required(secret_store, "STRIPE_WEBHOOK_SECRET")?,
            frontend_url: required(secret_store, "FRONTEND_URL")?
                .trim_end_matches('/')
                .to_string(),
            loops_api_key: required(secret_store, "LOOPS_API_KEY")?,
            loops_verify_email_id: required(secret_store, "LOOPS_VERIFY_EMAIL_ID")?,
            aws_region: required(secret_store, "AWS_REGION")?,
            aws_access_key_id: required(secret_store, "AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: required(secret_store, "AWS_SECRET_ACCESS_KEY")?,
            s3_bucket: required(secret_store, "S3_BUCKET")?,
            cookie_secure,
            admin_seed,
        })
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        AppConfig {
            database_url: "postgres://localhost/studio_test".to_string(),
            jwt_secret: "test-secret".to_string(),
            stripe_secret_key: "sk_test_123".to_string(),
            stripe_webhook_secret: "whsec_test".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            loops_api_key: String::new(),
            loops_verify_email_id: String::new(),
            aws_region: "us-east-1".to_string(),
            aws_access_key_id: String::new(),
            aws_secret_access_key: String::new(),
            s3_bucket: "studio-test".to_string(),
            cookie_secure: false,
            admin_seed: None,
        }
    }
}
