//! WebDriver backend for an already running driver (chromedriver, geckodriver, WPEWebDriver).

pub mod backend;
pub mod webdriver;

pub use backend::EmbeddedBackend;
