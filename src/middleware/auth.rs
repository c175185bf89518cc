use std::{
    future::{ready, Ready},
    sync::Arc,
};

use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    web, Error, FromRequest, HttpMessage, HttpRequest,
};
use anyhow::anyhow;
use futures_util::future::LocalBoxFuture;
use sqlx::{query_as, PgPool};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::{verify_jwt, JWTKeys, AUTH_COOKIE};
use crate::error::AppError;
use crate::models::user::UserRole;

#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub role: UserRole,
}

/// An authenticated user who is still an admin in the database, not just in their token.
#[derive(Clone, Debug)]
pub struct AdminUser {
    pub user_id: Uuid,
}

/// Source of a user's current role, registered as app data.
#[derive(Clone)]
pub enum RoleLookup {
    Database(PgPool),
    #[cfg(test)]
    Fixed(std::collections::HashMap<Uuid, UserRole>),
}

impl RoleLookup {
    async fn current_role(&self, user_id: Uuid) -> Result<Option<UserRole>, AppError> {
        match self {
            RoleLookup::Database(pool) => {
                let row: Option<(UserRole,)> = query_as("SELECT role FROM users WHERE id = $1")
                    .bind(user_id)
                    .fetch_optional(pool)
                    .await?;
                Ok(row.map(|(role,)| role))
            }
            #[cfg(test)]
            RoleLookup::Fixed(roles) => Ok(roles.get(&user_id).copied()),
        }
    }
}

pub struct Authentication {
    pub keys: Arc<JWTKeys>,
}

impl<S, B> Transform<S, ServiceRequest> for Authentication
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthenticationMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthenticationMiddleware {
            service,
            keys: self.keys.clone(),
        }))
    }
}

pub struct AuthenticationMiddleware<S> {
    service: S,
    keys: Arc<JWTKeys>,
}

/// Cookie first, then `Authorization: Bearer`.
fn extract_token(req: &ServiceRequest) -> Option<String> {
    if let Some(cookie) = req.cookie(AUTH_COOKIE) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }

    req.headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
}

impl<S, B> Service<ServiceRequest> for AuthenticationMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // Requests without a valid token pass through unauthenticated; extractors decide
        match extract_token(&req) {
            Some(token) => match verify_jwt(&token, &self.keys) {
                Ok(claims) => {
                    debug!("Authenticated user: {}", claims.sub);
                    req.extensions_mut().insert(AuthenticatedUser {
                        user_id: claims.sub,
                        role: claims.role,
                    });
                }
                Err(e) => {
                    warn!("Invalid token on {}: {:?}", req.path(), e);
                }
            },
            None => {
                debug!("No credentials on {}", req.path());
            }
        };

        let fut = self.service.call(req);

        Box::pin(async move {
            let res = fut.await?;
            Ok(res)
        })
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthenticatedUser>()
                .cloned()
                .ok_or_else(|| AppError::Unauthorized("Authentication required".into()).into()),
        )
    }
}

impl FromRequest for AdminUser {
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let user = req.extensions().get::<AuthenticatedUser>().cloned();
        let roles = req.app_data::<web::Data<RoleLookup>>().cloned();

        Box::pin(async move { confirm_admin(user, roles).await.map_err(Error::from) })
    }
}

async fn confirm_admin(
    user: Option<AuthenticatedUser>,
    roles: Option<web::Data<RoleLookup>>,
) -> Result<AdminUser, AppError> {
    let user = user.ok_or_else(|| AppError::Unauthorized("Authentication required".into()))?;
    if user.role != UserRole::Admin {
        return Err(AppError::Forbidden("Admin access required".into()));
    }

    let roles = roles.ok_or_else(|| AppError::Internal(anyhow!("Role lookup missing")))?;
    match roles.current_role(user.user_id).await? {
        Some(UserRole::Admin) => Ok(AdminUser {
            user_id: user.user_id,
        }),
        _ => {
            warn!("Admin token for {} no longer matches a current admin", user.user_id);
            Err(AppError::Forbidden("Admin access required".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{auth_cookie, sign_jwt};
    use actix_web::{http::StatusCode, test, App, HttpResponse};
    use std::collections::HashMap;

    async fn whoami(user: AuthenticatedUser) -> HttpResponse {
        HttpResponse::Ok().body(user.user_id.to_string())
    }

    async fn admin_only(_admin: AdminUser) -> HttpResponse {
        HttpResponse::Ok().finish()
    }

    fn keys() -> Arc<JWTKeys> {
        Arc::new(JWTKeys::new(b"middleware-secret"))
    }

    #[actix_web::test]
    async fn cookie_token_authenticates() {
        let keys = keys();
        let app = test::init_service(
            App::new()
                .wrap(Authentication { keys: keys.clone() })
                .route("/me", web::get().to(whoami)),
        )
        .await;

        let user_id = Uuid::new_v4();
        let token = sign_jwt(user_id, UserRole::Customer, &keys).unwrap();
        let req = test::TestRequest::get()
            .uri("/me")
            .cookie(auth_cookie(token, false))
            .to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert_eq!(body, user_id.to_string());
    }

    #[actix_web::test]
    async fn bearer_token_authenticates() {
        let keys = keys();
        let app = test::init_service(
            App::new()
                .wrap(Authentication { keys: keys.clone() })
                .route("/me", web::get().to(whoami)),
        )
        .await;

        let token = sign_jwt(Uuid::new_v4(), UserRole::Customer, &keys).unwrap();
        let req = test::TestRequest::get()
            .uri("/me")
            .insert_header((AUTHORIZATION, format!("Bearer {}", token)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn missing_or_bad_token_is_unauthorized() {
        let app = test::init_service(
            App::new()
                .wrap(Authentication { keys: keys() })
                .route("/me", web::get().to(whoami)),
        )
        .await;

        let req = test::TestRequest::get().uri("/me").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::get()
            .uri("/me")
            .insert_header((AUTHORIZATION, "Bearer garbage"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn customers_are_not_admins() {
        let keys = keys();
        let admin_id = Uuid::new_v4();
        let roles = RoleLookup::Fixed(HashMap::from([(admin_id, UserRole::Admin)]));
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(roles))
                .wrap(Authentication { keys: keys.clone() })
                .route("/admin", web::get().to(admin_only)),
        )
        .await;

        let customer = sign_jwt(Uuid::new_v4(), UserRole::Customer, &keys).unwrap();
        let req = test::TestRequest::get()
            .uri("/admin")
            .cookie(auth_cookie(customer, false))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let admin = sign_jwt(admin_id, UserRole::Admin, &keys).unwrap();
        let req = test::TestRequest::get()
            .uri("/admin")
            .cookie(auth_cookie(admin, false))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn demoted_admin_token_is_forbidden() {
        let keys = keys();
        let demoted = Uuid::new_v4();
        let roles = RoleLookup::Fixed(HashMap::from([(demoted, UserRole::Customer)]));
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(roles))
                .wrap(Authentication { keys: keys.clone() })
                .route("/admin", web::get().to(admin_only)),
        )
        .await;

        let stale = sign_jwt(demoted, UserRole::Admin, &keys).unwrap();
        let req = test::TestRequest::get()
            .uri("/admin")
            .cookie(auth_cookie(stale, false))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let deleted = sign_jwt(Uuid::new_v4(), UserRole::Admin, &keys).unwrap();
        let req = test::TestRequest::get()
            .uri("/admin")
            .insert_header((AUTHORIZATION, format!("Bearer {}", deleted)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }
}
