pub use self::app_config::{AppConfig, AppConfigHarness};

mod app_config;
