pub mod backend;
pub mod booking;
pub mod capture;
pub mod config;
pub mod error;
pub mod login;
pub mod navigation;
pub mod notify;
pub mod outcome;
pub mod page;
pub mod request;
pub mod resolution;
pub mod schedule;
pub mod selectors;
pub mod wait;
pub mod workflow;

pub use courtside_common::error_mapping;
pub use courtside_common::protocol;
pub use error::EngineError;
pub use workflow::{BookingRun, RunReport};
