mod database {
    pub mod actions;
    pub mod error;
    pub mod export;
    pub mod filter;
    pub mod pagination;
    pub mod schema;
}
mod authentication {
    pub mod cryptography;
    pub mod jwt;
    pub mod middleware;
    pub mod permissions;
}
mod api {
    pub mod handlers;
    pub mod routes;
}
mod constants;
mod validation;

pub use api::routes::api_routes;
pub use authentication::*;
pub use constants::*;
pub use database::*;
pub use validation::*;
