//! TOML config file loading and creation.

mod loader;
mod template;

#[cfg(test)]
mod tests;

pub use loader::{
    create_default_config, default_config_path, load_default, load_from_path, CONFIG_ENV_VAR,
};
