//! External API integrations

pub mod entity_api;

pub use entity_api::EntityApiClient;
