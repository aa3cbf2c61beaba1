mod configs;
mod defaults;
mod envconfig;
mod validate;

pub use configs::{AppConfig, AuthConfig, DatabaseConfig, GeneralConfig, GoogleConfig, LoggingConfig};
pub use envconfig::EnvConfig;
