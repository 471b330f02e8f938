pub mod env;
pub mod errors;
pub mod logger;
pub mod models;

pub use errors::ValidationError;
