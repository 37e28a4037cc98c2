pub mod ai;
pub mod auth;
pub mod billing;
pub mod coupons;
pub mod domains;
