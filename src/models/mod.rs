pub mod alert;
pub mod candidate;
pub mod driver;
pub mod metric;
pub mod notification;
pub mod order;
pub mod records;
pub mod user;
