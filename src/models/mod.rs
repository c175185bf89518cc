pub mod booking;
pub mod cart;
pub mod notification;
pub mod order;
pub mod package;
pub mod product;
pub mod report;
pub mod staff;
pub mod user;

pub use booking::Booking;
pub use cart::CartItem;
pub use notification::Notification;
pub use order::Order;
pub use package::Package;
pub use product::Product;
pub use staff::Staff;
pub use user::User;
