mod database {
    pub mod actions;
    pub mod error;
    pub mod form;
    pub mod pagination;
    pub mod schema;
}
mod authentication {
    pub mod cryptography;
    pub mod jwt;
    pub mod middleware;
    pub mod permissions;
}
mod config;
mod constants;

mod shopping {
    pub mod aggregate;
    pub mod pdf;
}

pub use authentication::*;
pub use config::*;
pub use constants::*;
pub use database::*;
pub use shopping::*;
