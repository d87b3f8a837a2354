pub mod error;
pub mod handlers;
pub mod models;
pub mod server;

pub use error::ApiError;
pub use models::AppState;
