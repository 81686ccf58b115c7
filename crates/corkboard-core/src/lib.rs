pub mod config;
pub mod error;
pub mod result;

pub use config::ServerConfig;
pub use error::CorkboardError;
pub use result::CorkboardResult;
