pub mod config;
pub mod errors;
pub mod kernel;
pub mod profiles;
pub mod store;
pub mod types;
pub mod uri;
