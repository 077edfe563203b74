pub mod booking;
pub mod item;
pub mod order;
pub mod order_item;
pub mod payment;
pub mod product;
pub mod service_item;
pub mod tenant;
pub mod user;
