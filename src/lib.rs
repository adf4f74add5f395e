pub mod api;
pub mod booker;
pub mod config;
pub mod confirmation;
pub mod error;
pub mod mailer;
pub mod ticket;
pub mod upload;
