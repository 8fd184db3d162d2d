pub mod error;
pub mod extract;
pub mod logging;
pub mod response;

pub use error::{AppError, AppResult};
pub use extract::{parse_id, ApiJson};
