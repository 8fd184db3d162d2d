pub mod broadcast;
pub mod events;
pub mod health;
pub mod notifications;
pub mod payments;
pub mod sweeps;
pub mod webhooks;

pub use health::health_check;
