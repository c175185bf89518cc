use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use actix_web::web;
use anyhow::anyhow;
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::user::UserRole;

pub const AUTH_COOKIE: &str = "token";
const TOKEN_TTL_DAYS: i64 = 7;
pub const MIN_PASSWORD_LEN: usize = 8;

lazy_static! {
    static ref EMAIL_REGEX: Regex =
        Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$").unwrap();
    static ref DUMMY_HASH: String =
        bcrypt::hash("no-such-account", bcrypt::DEFAULT_COST).unwrap_or_default();
}

#[derive(Clone)]
pub struct JWTKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JWTKeys {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: UserRole,
    pub exp: usize,
    pub iat: usize,
}

pub fn sign_jwt(
    user_id: Uuid,
    role: UserRole,
    keys: &JWTKeys,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now().timestamp() as usize;
    let claims = Claims {
        sub: user_id,
        role,
        exp: now + 3600 * 24 * TOKEN_TTL_DAYS as usize,
        iat: now,
    };

    encode(&Header::default(), &claims, &keys.encoding)
}

pub fn verify_jwt(token: &str, keys: &JWTKeys) -> Result<Claims, jsonwebtoken::errors::Error> {
    decode::<Claims>(token, &keys.decoding, &Validation::default()).map(|data| data.claims)
}

pub fn auth_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build(AUTH_COOKIE, token)
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::days(TOKEN_TTL_DAYS))
        .finish()
}

pub fn cleared_cookie(secure: bool) -> Cookie<'static> {
    let mut cookie = auth_cookie(String::new(), secure);
    cookie.make_removal();
    cookie
}

/// Runs on the blocking pool; bcrypt is slow on purpose.
pub async fn hash_password(password: String) -> AppResult<String> {
    web::block(move || bcrypt::hash(password, bcrypt::DEFAULT_COST))
        .await
        .map_err(|e| AppError::Internal(anyhow!("Password hashing did not finish: {}", e)))?
        .map_err(|e| AppError::Internal(anyhow!("Failed to hash password: {}", e)))
}

/// A malformed stored hash counts as a mismatch. Without a stored hash the password is
/// checked against a throwaway one, so unknown accounts take as long as wrong passwords.
pub async fn verify_password(password: String, hash: Option<String>) -> bool {
    web::block(move || match hash {
        Some(hash) => bcrypt::verify(password, &hash).unwrap_or(false),
        None => {
            let _ = bcrypt::verify(password, &DUMMY_HASH);
            false
        }
    })
    .await
    .unwrap_or(false)
}

pub fn normalize_email(email: &str) -> AppResult<String> {
    let email = email.trim().to_lowercase();
    if !EMAIL_REGEX.is_match(&email) {
        return Err(AppError::bad_request("Invalid email address"));
    }
    Ok(email)
}

pub fn validate_password(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::bad_request(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jwt_round_trip() {
        let keys = JWTKeys::new(b"secret");
        let user_id = Uuid::new_v4();
        let token = sign_jwt(user_id, UserRole::Admin, &keys).unwrap();

        let claims = verify_jwt(&token, &keys).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.role, UserRole::Admin);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn jwt_rejects_other_secret() {
        let token = sign_jwt(Uuid::new_v4(), UserRole::Customer, &JWTKeys::new(b"one")).unwrap();
        assert!(verify_jwt(&token, &JWTKeys::new(b"two")).is_err());
    }

    #[test]
    fn jwt_rejects_expired_token() {
        let keys = JWTKeys::new(b"secret");
        let claims = Claims {
            sub: Uuid::new_v4(),
            role: UserRole::Customer,
            exp: 1_000,
            iat: 0,
        };
        let token = encode(&Header::default(), &claims, &keys.encoding).unwrap();
        assert!(verify_jwt(&token, &keys).is_err());
    }

    #[actix_web::test]
    async fn password_hash_verifies() {
        let hash = hash_password("correct horse".into()).await.unwrap();
        assert!(verify_password("correct horse".into(), Some(hash.clone())).await);
        assert!(!verify_password("wrong horse".into(), Some(hash)).await);
        assert!(!verify_password("anything".into(), Some("not-a-bcrypt-hash".into())).await);
    }

    #[actix_web::test]
    async fn unknown_account_still_pays_for_a_hash() {
        assert!(!verify_password("correct horse".into(), None).await);
        assert!(DUMMY_HASH.starts_with("$2"));
        assert!(bcrypt::verify("no-such-account", &DUMMY_HASH).unwrap());
    }

    #[test]
    fn emails_are_normalized() {
        assert_eq!(
            normalize_email("  Jane.Doe@Example.COM ").unwrap(),
            "jane.doe@example.com"
        );
        assert!(normalize_email("not-an-email").is_err());
        assert!(normalize_email("a@b").is_err());
    }

    #[test]
    fn short_passwords_rejected() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("long enough").is_ok());
    }

    #[test]
    fn cookie_flags() {
        let cookie = auth_cookie("abc".to_string(), true);
        assert_eq!(cookie.name(), AUTH_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));

        let removal = cleared_cookie(false);
        assert_eq!(removal.value(), "");
        assert_eq!(removal.max_age(), Some(CookieDuration::ZERO));
    }
}
