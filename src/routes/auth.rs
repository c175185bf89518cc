use std::sync::Arc;

use actix_web::{get, post, put, web, HttpResponse};
use tracing::{info, warn};

use crate::auth::{
    auth_cookie, cleared_cookie, hash_password, normalize_email, sign_jwt, validate_password,
    verify_password,
};
use crate::error::{AppError, AppResult};
use crate::mailer::{send_in_background, verification_email};
use crate::middleware::auth::AuthenticatedUser;
use crate::models::user::{NewUser, PublicUser, User, UserRole};
use crate::types::{
    ChangePasswordRequest, LoginRequest, RegisterRequest, UpdateProfileRequest, VerifyEmailQuery,
};
use crate::{AppConfig, AppState};

fn session_response(
    user: User,
    app_state: &AppState,
    app_config: &AppConfig,
) -> AppResult<HttpResponse> {
    let token = sign_jwt(user.id, user.role, &app_state.jwt_keys)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to sign JWT: {}", e)))?;

    Ok(HttpResponse::Ok()
        .cookie(auth_cookie(token, app_config.cookie_secure))
        .json(PublicUser::from(user)))
}

#[post("/register")]
async fn register(
    app_state: web::Data<Arc<AppState>>,
    app_config: web::Data<Arc<AppConfig>>,
    web::Json(req): web::Json<RegisterRequest>,
) -> AppResult<HttpResponse> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("Name is required"));
    }
    let email = normalize_email(&req.email)?;
    validate_password(&req.password)?;

    let user = User::create(
        &app_state.pool,
        NewUser {
            name,
            email: &email,
            password_hash: hash_password(req.password.clone()).await?,
            role: UserRole::Customer,
            is_verified: false,
            date_of_birth: req.date_of_birth,
            phone: req.phone.as_deref(),
        },
    )
    .await?;

    if let Some(token) = &user.verification_token {
        send_in_background(
            app_state.http_client.clone(),
            app_config.loops_api_key.clone(),
            verification_email(&app_config, &user.email, &user.name, token),
        );
    }

    info!("Registered user {}", user.id);
    session_response(user, &app_state, &app_config)
}

#[post("/login")]
async fn login(
    app_state: web::Data<Arc<AppState>>,
    app_config: web::Data<Arc<AppConfig>>,
    web::Json(req): web::Json<LoginRequest>,
) -> AppResult<HttpResponse> {
    let invalid = || AppError::Unauthorized("Invalid email or password".into());

    let email = normalize_email(&req.email).map_err(|_| invalid())?;
    let user = User::find_by_email(&app_state.pool, &email).await?;
    let stored_hash = user.as_ref().map(|u| u.password_hash.clone());
    let verified = verify_password(req.password, stored_hash).await;

    let user = match user {
        Some(user) if verified => user,
        Some(user) => {
            warn!("Failed login for {}", user.id);
            return Err(invalid());
        }
        None => return Err(invalid()),
    };

    info!("User {} logged in", user.id);
    session_response(user, &app_state, &app_config)
}

#[post("/logout")]
async fn logout(app_config: web::Data<Arc<AppConfig>>) -> HttpResponse {
    HttpResponse::Ok()
        .cookie(cleared_cookie(app_config.cookie_secure))
        .json(serde_json::json!({ "message": "Logged out" }))
}

#[get("/me")]
async fn me(
    app_state: web::Data<Arc<AppState>>,
    authenticated_user: AuthenticatedUser,
) -> AppResult<web::Json<PublicUser>> {
    let user = User::get(&app_state.pool, authenticated_user.user_id).await?;
    Ok(web::Json(user.into()))
}

#[put("/me")]
async fn update_me(
    app_state: web::Data<Arc<AppState>>,
    authenticated_user: AuthenticatedUser,
    web::Json(req): web::Json<UpdateProfileRequest>,
) -> AppResult<web::Json<PublicUser>> {
    let name = req.name.as_deref().map(str::trim);
    if name.is_some_and(str::is_empty) {
        return Err(AppError::bad_request("Name cannot be empty"));
    }

    let user = User::update_profile(
        &app_state.pool,
        authenticated_user.user_id,
        name,
        req.phone.as_deref(),
        req.date_of_birth,
    )
    .await?;
    Ok(web::Json(user.into()))
}

#[put("/password")]
async fn change_password(
    app_state: web::Data<Arc<AppState>>,
    authenticated_user: AuthenticatedUser,
    web::Json(req): web::Json<ChangePasswordRequest>,
) -> AppResult<HttpResponse> {
    let user = User::get(&app_state.pool, authenticated_user.user_id).await?;
    if !verify_password(req.current_password, Some(user.password_hash.clone())).await {
        return Err(AppError::Unauthorized("Current password is incorrect".into()));
    }
    validate_password(&req.new_password)?;

    let password_hash = hash_password(req.new_password).await?;
    User::set_password(&app_state.pool, user.id, &password_hash).await?;
    info!("User {} changed their password", user.id);
    Ok(HttpResponse::NoContent().finish())
}

#[get("/verify")]
async fn verify_email(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<VerifyEmailQuery>,
) -> AppResult<web::Json<PublicUser>> {
    let user = User::verify_email(&app_state.pool, query.token.trim()).await?;
    Ok(web::Json(user.into()))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(register)
        .service(login)
        .service(logout)
        .service(me)
        .service(update_me)
        .service(change_password)
        .service(verify_email);
}
