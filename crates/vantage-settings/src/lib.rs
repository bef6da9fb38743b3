//! # vantage-settings
//!
//! Configuration management with layered sources for the Vantage server.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults** — [`VantageSettings::default()`]
//! 2. **Settings file** — optional JSON file (deep-merged over defaults)
//! 3. **Environment variables** — `VANTAGE_*` overrides (highest priority)
//!
//! The loaded value is plain data: the binary loads it once and passes it
//! down to the server and store constructors. There is no ambient global.
//!
//! # Usage
//!
//! ```no_run
//! use vantage_settings::load_settings;
//!
//! let settings = load_settings(None).unwrap();
//! println!("listening on {}:{}", settings.server.host, settings.server.port);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings};
pub use types::*;
