pub mod auth_service;
pub mod mail_service;
