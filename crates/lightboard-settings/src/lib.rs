//! # lightboard-settings
//!
//! Configuration management with layered sources.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`LightboardSettings::default()`]
//! 2. **Settings file**: `~/.lightboard/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `LIGHTBOARD_*` overrides (highest priority)
//!
//! There is no global instance: the binary loads settings once and hands the
//! relevant sections to the server and client constructors.
//!
//! # Usage
//!
//! ```no_run
//! use lightboard_settings::load_settings;
//!
//! let settings = load_settings().unwrap_or_default();
//! println!("listening on {}:{}", settings.server.host, settings.server.port);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;
