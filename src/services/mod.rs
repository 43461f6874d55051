pub mod collector;
pub mod dispatch;
