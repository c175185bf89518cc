use actix_web::web;
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::models::booking::{Booking, BookingDetail, BookingStatus};
use crate::models::notification::{Audience, Notification};
use crate::models::order::{Order, OrderItem, OrderStatus};
use crate::models::package::Package;
use crate::models::product::Product;
use crate::models::staff::{Staff, StaffRole};
use crate::models::user::{PublicUser, UserRole};
use crate::types::{
    AddToCartRequest, AssignStaffRequest, BookingReport, CartLine, CartResponse,
    ChangePasswordRequest, CheckoutResponse, CreateBookingRequest, CreateNotificationRequest,
    CreatePackageRequest, CreateProductRequest, CreateStaffRequest, DashboardStats, Interval,
    LabelCount, LoginRequest, OrderWithItems, PlaceOrderRequest, PresignRequest, PresignResponse,
    ProductSales, RegisterRequest, SalesPoint, SalesReport, TrendPoint,
    UpdateBookingStatusRequest, UpdateCartItemRequest, UpdateNotificationRequest,
    UpdateOrderStatusRequest, UpdatePackageRequest, UpdateProductRequest, UpdateProfileRequest,
    UpdateRoleRequest, UpdateStaffRequest, UserReport,
};

#[derive(OpenApi)]
#[openapi(
    info(title = "Studio API", description = "Photo studio bookings, shop and admin reporting"),
    components(schemas(
        PublicUser, UserRole, RegisterRequest, LoginRequest, UpdateProfileRequest,
        ChangePasswordRequest, UpdateRoleRequest,
        Product, CreateProductRequest, UpdateProductRequest,
        Package, CreatePackageRequest, UpdatePackageRequest,
        Staff, StaffRole, CreateStaffRequest, UpdateStaffRequest,
        Booking, BookingDetail, BookingStatus, CreateBookingRequest, UpdateBookingStatusRequest,
        AssignStaffRequest,
        CartLine, CartResponse, AddToCartRequest, UpdateCartItemRequest,
        Order, OrderItem, OrderStatus, OrderWithItems, PlaceOrderRequest, UpdateOrderStatusRequest,
        CheckoutResponse,
        Notification, Audience, CreateNotificationRequest, UpdateNotificationRequest,
        Interval, TrendPoint, LabelCount, BookingReport, UserReport, SalesPoint, ProductSales,
        SalesReport, DashboardStats,
        PresignRequest, PresignResponse,
    ))
)]
pub struct ApiDoc;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(Scalar::with_url("/docs", ApiDoc::openapi()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_core_schemas() {
        let doc = ApiDoc::openapi();
        let schemas = doc.components.expect("components").schemas;
        for name in ["Booking", "Order", "Product", "Notification", "DashboardStats"] {
            assert!(schemas.contains_key(name), "missing schema {}", name);
        }
    }
}
