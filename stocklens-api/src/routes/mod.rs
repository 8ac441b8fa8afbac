/// HTTP route handlers

pub mod auth;
pub mod count;
pub mod health;
pub mod records;
