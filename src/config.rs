//! Layered TOML configuration. See spec §4.9, scenario S8.
//!
//! Grounded on the ambient config idiom the pack's daemons use (a registry
//! of named sections dispatched to typed handlers, serde-driven parsing) --
//! generalized here to `serde` + `toml` since this crate is a library core,
//! not a standalone daemon binary.

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::ConfigError;

/// Controls how `Config::validate` reacts to per-section validation
/// failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Collect every section's errors before returning.
    DryRun,
    /// Stop at the first error.
    Live,
}

const KNOWN_SECTIONS: &[&str] = &["tables", "faces", "log"];
const KNOWN_FACE_SECTIONS: &[&str] = &["udp", "tcp", "unix", "ether"];

fn default_name_depth_limit() -> u32 {
    32
}

fn default_pit_lifetime_ms() -> u64 {
    crate::pit::DEFAULT_INTEREST_LIFETIME_MS
}

fn default_measurements_lifetime_ms() -> u64 {
    crate::measurements::DEFAULT_LIFETIME_MS
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TablesConfig {
    pub name_depth_limit: u32,
    pub default_pit_lifetime_ms: u64,
    pub default_measurements_lifetime_ms: u64,
}

impl Default for TablesConfig {
    fn default() -> Self {
        TablesConfig {
            name_depth_limit: default_name_depth_limit(),
            default_pit_lifetime_ms: default_pit_lifetime_ms(),
            default_measurements_lifetime_ms: default_measurements_lifetime_ms(),
        }
    }
}

impl TablesConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.name_depth_limit == 0 {
            return Err(ConfigError::InvalidValue {
                section: "tables".to_string(),
                field: "name_depth_limit".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/// A single protocol's face section (`faces.udp`, `faces.tcp`, ...).
///
/// `keep_alive_interval` is accepted for wire compatibility with existing
/// configuration files; this crate parses and stores it but never acts on
/// it (see the Open Question in DESIGN.md).
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FaceSectionConfig {
    pub listen: Option<String>,
    pub default_next_hop_cost: i64,
    pub keep_alive_interval: Option<u64>,
}

impl Default for FaceSectionConfig {
    fn default() -> Self {
        FaceSectionConfig {
            listen: None,
            default_next_hop_cost: 0,
            keep_alive_interval: None,
        }
    }
}

impl FaceSectionConfig {
    fn validate(&self, name: &str) -> Result<(), ConfigError> {
        if self.default_next_hop_cost < 0 {
            return Err(ConfigError::InvalidValue {
                section: format!("faces.{name}"),
                field: "default_next_hop_cost".to_string(),
                reason: format!("{} is out of range, must be non-negative", self.default_next_hop_cost),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct FacesConfig {
    pub udp: Option<FaceSectionConfig>,
    pub tcp: Option<FaceSectionConfig>,
    pub unix: Option<FaceSectionConfig>,
    pub ether: Option<FaceSectionConfig>,

    /// Any section under `[faces.*]` this struct doesn't name explicitly;
    /// rejected by `validate` unless the section is one of
    /// `KNOWN_FACE_SECTIONS`.
    #[serde(flatten)]
    pub extra: HashMap<String, toml::Value>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub targets: HashMap<String, String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: default_log_level(),
            targets: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub tables: TablesConfig,
    pub faces: FacesConfig,
    pub log: LogConfig,

    /// Top-level sections this struct doesn't name; rejected by `validate`
    /// unless the section is one of `KNOWN_SECTIONS`.
    #[serde(flatten)]
    pub extra: HashMap<String, toml::Value>,
}

impl Config {
    pub fn parse(toml_text: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Runs every section's validator. In `Mode::DryRun`, collects every
    /// error before returning; in `Mode::Live`, stops at the first.
    pub fn validate(&self, mode: Mode) -> Result<(), Vec<ConfigError>> {
        let mut errors = Vec::new();

        for key in self.extra.keys() {
            if !KNOWN_SECTIONS.contains(&key.as_str()) {
                errors.push(ConfigError::UnknownSection(key.clone()));
                if mode == Mode::Live {
                    return Err(errors);
                }
            }
        }

        for key in self.faces.extra.keys() {
            if !KNOWN_FACE_SECTIONS.contains(&key.as_str()) {
                errors.push(ConfigError::UnknownSection(format!("faces.{key}")));
                if mode == Mode::Live {
                    return Err(errors);
                }
            }
        }

        if let Err(e) = self.tables.validate() {
            errors.push(e);
            if mode == Mode::Live {
                return Err(errors);
            }
        }

        for (name, section) in [
            ("udp", &self.faces.udp),
            ("tcp", &self.faces.tcp),
            ("unix", &self.faces.unix),
            ("ether", &self.faces.ether),
        ] {
            if let Some(section) = section {
                if let Err(e) = section.validate(name) {
                    errors.push(e);
                    if mode == Mode::Live {
                        return Err(errors);
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate_cleanly() {
        let cfg = Config::parse("").unwrap();
        assert_eq!(cfg.tables.name_depth_limit, 32);
        assert!(cfg.validate(Mode::Live).is_ok());
    }

    #[test]
    fn udp_keep_alive_interval_is_parsed_but_inert() {
        let cfg = Config::parse(
            r#"
            [faces.udp]
            keep_alive_interval = 30
            "#,
        )
        .unwrap();
        assert_eq!(cfg.faces.udp.as_ref().unwrap().keep_alive_interval, Some(30));
        assert!(cfg.validate(Mode::Live).is_ok());
    }

    #[test]
    fn s8_dry_run_aggregates_both_errors_live_stops_at_first() {
        let toml_text = r#"
            [bogus_section]
            x = 1

            [faces.udp]
            default_next_hop_cost = -5
            "#;
        let cfg = Config::parse(toml_text).unwrap();

        let dry_run_errors = cfg.validate(Mode::DryRun).unwrap_err();
        assert_eq!(dry_run_errors.len(), 2);

        let live_errors = cfg.validate(Mode::Live).unwrap_err();
        assert_eq!(live_errors.len(), 1);
        assert_eq!(live_errors[0], ConfigError::UnknownSection("bogus_section".to_string()));
    }

    #[test]
    fn unknown_face_section_is_rejected() {
        let cfg = Config::parse(
            r#"
            [faces.bluetooth]
            listen = "bt://0"
            "#,
        )
        .unwrap();
        let errors = cfg.validate(Mode::Live).unwrap_err();
        assert_eq!(errors[0], ConfigError::UnknownSection("faces.bluetooth".to_string()));
    }
}
