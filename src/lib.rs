pub mod analytics;
pub mod conf;
pub mod docs;
pub mod jwt;
pub mod mail;
pub mod otp;
pub mod server;
pub mod tracing;
pub mod types;
