pub mod admin;
pub mod auth;
pub mod bookings;
pub mod cart;
pub mod notifications;
pub mod orders;
pub mod packages;
pub mod pay;
pub mod products;
pub mod reports;
pub mod staff;
pub mod uploads;
pub mod webhook;
