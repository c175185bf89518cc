use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error};

use crate::config::AppConfig;

const LOOPS_TRANSACTIONAL_URL: &str = "https://app.loops.so/api/v1/transactional";

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TransactionalEmail {
    pub transactional_id: String,
    pub email: String,
    pub data_variables: serde_json::Value,
}

pub fn verification_link(frontend_url: &str, token: &str) -> String {
    format!("{}/verify-email?token={}", frontend_url, token)
}

pub fn verification_email(
    app_config: &AppConfig,
    email: &str,
    name: &str,
    token: &str,
) -> TransactionalEmail {
    TransactionalEmail {
        transactional_id: app_config.loops_verify_email_id.clone(),
        email: email.to_string(),
        data_variables: json!({
            "name": name,
            "verifyUrl": verification_link(&app_config.frontend_url, token),
        }),
    }
}

/// Sends on a spawned task; failures are only logged.
pub fn send_in_background(client: Client, api_key: String, message: TransactionalEmail) {
    let send_future = async move {
        let response = client
            .post(LOOPS_TRANSACTIONAL_URL)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&message)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                debug!("Sent transactional email to {}", message.email);
            }
            Ok(resp) => {
                let status = resp.status();
                let body = resp
                    .text()
                    .await
                    .unwrap_or_else(|_| "Failed to read response body".to_string());
                error!("Loops rejected email to {}: {} {}", message.email, status, body);
            }
            Err(e) => {
                error!("Failed to send email to {}: {:?}", message.email, e);
            }
        }
    };

    actix_web::rt::spawn(send_future);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_uses_loops_field_names() {
        let config = AppConfig::for_tests();
        let message = verification_email(&config, "jane@example.com", "Jane", "abc123");
        let value = serde_json::to_value(&message).unwrap();

        assert_eq!(value["email"], "jane@example.com");
        assert!(value.get("transactionalId").is_some());
        assert_eq!(
            value["dataVariables"]["verifyUrl"],
            "http://localhost:5173/verify-email?token=abc123"
        );
    }
}
