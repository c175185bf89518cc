use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::order::{Order, OrderItem, OrderStatus};

#[derive(Deserialize, ToSchema, Default)]
pub struct PlaceOrderRequest {
    pub shipping_address: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct OrderQuery {
    pub status: Option<OrderStatus>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}
