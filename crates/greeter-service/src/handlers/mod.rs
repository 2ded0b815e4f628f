//! HTTP request handlers for the greeter service.

pub mod greetings;
pub mod health;

pub use greetings::greetings;
pub use health::health_check;
