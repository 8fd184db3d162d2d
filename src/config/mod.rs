pub mod cors;
pub mod security;
pub mod settings;

pub use cors::create_cors_layer;
pub use security::create_security_headers_layer;
pub use settings::{ConfigError, DatabaseBackend, Settings};
