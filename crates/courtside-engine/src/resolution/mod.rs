//! Element resolution: roles in, live element handles out.

pub mod resolver;
pub mod result;

pub use resolver::ElementResolver;
pub use result::{ElementHandle, Interaction, ResolveError};
