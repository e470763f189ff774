//! Domain models for the produce collection depot

mod container;
mod counterparty;
mod movement;
mod product;
mod shipment;

pub use container::*;
pub use counterparty::*;
pub use movement::*;
pub use product::*;
pub use shipment::*;
