/// The page probe JavaScript implementation.
/// This string is injected into browser contexts by backends; it installs
/// `window.__courtside.process(action)`.
pub const PROBE_JS: &str = include_str!("probe.js");

/// Expression that is true once the probe is installed in the current document.
pub const PROBE_LOADED_CHECK: &str = "typeof window.__courtside !== 'undefined'";
