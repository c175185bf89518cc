use std::sync::Arc;

use actix_web::{get, put, web};
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AdminUser;
use crate::models::report::dashboard_stats;
use crate::models::user::{PublicUser, User, UserRole};
use crate::routes::{orders, packages, products};
use crate::types::{DashboardStats, UpdateRoleRequest, UserListQuery};
use crate::AppState;

fn check_role_change(actor: Uuid, target: Uuid, role: UserRole) -> AppResult<()> {
    if actor == target && role != UserRole::Admin {
        return Err(AppError::bad_request("You cannot remove your own admin role"));
    }
    Ok(())
}

#[get("/stats")]
async fn stats(
    app_state: web::Data<Arc<AppState>>,
    _admin: AdminUser,
) -> AppResult<web::Json<DashboardStats>> {
    Ok(web::Json(dashboard_stats(&app_state.pool).await?))
}

#[get("/users")]
async fn list_users(
    app_state: web::Data<Arc<AppState>>,
    _admin: AdminUser,
    query: web::Query<UserListQuery>,
) -> AppResult<web::Json<Vec<PublicUser>>> {
    let users = User::list(&app_state.pool, query.verified).await?;
    Ok(web::Json(users.into_iter().map(PublicUser::from).collect()))
}

#[put("/users/{user_id}/role")]
async fn set_user_role(
    app_state: web::Data<Arc<AppState>>,
    admin: AdminUser,
    user_id: web::Path<Uuid>,
    web::Json(req): web::Json<UpdateRoleRequest>,
) -> AppResult<web::Json<PublicUser>> {
    let user_id = user_id.into_inner();
    check_role_change(admin.user_id, user_id, req.role)?;

    let user = User::set_role(&app_state.pool, user_id, req.role).await?;
    info!("Admin {} set role of {} to {:?}", admin.user_id, user.id, user.role);
    Ok(web::Json(user.into()))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(stats)
        .service(list_users)
        .service(set_user_role)
        .service(products::admin_list_products)
        .service(packages::admin_list_packages)
        .service(orders::admin_list_orders);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_cannot_demote_self() {
        let me = Uuid::new_v4();
        assert!(check_role_change(me, me, UserRole::Customer).is_err());
        assert!(check_role_change(me, me, UserRole::Admin).is_ok());
        assert!(check_role_change(me, Uuid::new_v4(), UserRole::Customer).is_ok());
    }
}
