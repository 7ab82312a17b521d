//! Chromium backend driven over the DevTools protocol.

pub mod backend;
pub mod cdp;
pub mod inject;

pub use backend::HeadlessBackend;
pub use cdp::LaunchOptions;
