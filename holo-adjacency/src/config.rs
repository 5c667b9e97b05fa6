//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

#![allow(clippy::derivable_impls)]

use std::net::Ipv4Addr;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::error::Error;

// Instance-wide settings.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct InstanceCfg {
    pub router_id: Ipv4Addr,
    pub area_border_router: bool,
    pub as_boundary_router: bool,
    // Used for neighbors whose Hellos don't carry a dead interval.
    pub dead_interval: u16,
    pub rxmt_interval: u16,
    // How often the bulk-query key snapshot is refreshed.
    pub query_refresh_interval: u16,
    // Skip the MTU check on received DBD packets.
    pub mtu_ignore: bool,
}

// ===== impl InstanceCfg =====

impl InstanceCfg {
    pub const DFLT_FILEPATH: &'static str = "/etc/holo-adjacency.toml";

    // Loads the configuration from a TOML file.
    //
    // A missing or unreadable file yields the default configuration; a file
    // that fails to parse or carries a zero interval is an error.
    pub fn load(config_file: Option<&str>) -> Result<InstanceCfg, Error> {
        let config_file = config_file.unwrap_or(InstanceCfg::DFLT_FILEPATH);

        match std::fs::read_to_string(config_file) {
            Ok(config_str) => {
                let config: InstanceCfg = toml::from_str(&config_str)
                    .map_err(|error| {
                        Error::ConfigParseError(config_file.to_owned(), error)
                    })?;
                config.validate().map_err(|field| {
                    Error::ConfigInvalid(config_file.to_owned(), field)
                })?;
                Ok(config)
            }
            Err(error) => {
                warn!(
                    path = %config_file, %error,
                    "failed to load configuration file, using defaults"
                );
                Ok(InstanceCfg::default())
            }
        }
    }

    // Returns the name of the first interval set to zero.
    fn validate(&self) -> Result<(), &'static str> {
        [
            ("dead-interval", self.dead_interval),
            ("rxmt-interval", self.rxmt_interval),
            ("query-refresh-interval", self.query_refresh_interval),
        ]
        .into_iter()
        .find(|(_, value)| *value == 0)
        .map_or(Ok(()), |(field, _)| Err(field))
    }

    // Periodic timers can't run with a zero period.
    pub(crate) fn rxmt_interval(&self) -> Duration {
        Duration::from_secs(self.rxmt_interval.max(1).into())
    }

    pub(crate) fn query_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.query_refresh_interval.max(1).into())
    }
}

impl Default for InstanceCfg {
    fn default() -> InstanceCfg {
        InstanceCfg {
            router_id: Ipv4Addr::UNSPECIFIED,
            area_border_router: false,
            as_boundary_router: false,
            dead_interval: 40,
            rxmt_interval: 5,
            query_refresh_interval: 10,
            mtu_ignore: false,
        }
    }
}

// ===== unit tests =====

#[cfg(test)]
mod tests {
    use const_addrs::ip4;

    use super::*;

    #[test]
    fn parse_partial_config() {
        let config: InstanceCfg = toml::from_str(
            r#"
            router-id = "10.10.10.1"
            as-boundary-router = true
            rxmt-interval = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.router_id, ip4!("10.10.10.1"));
        assert!(config.as_boundary_router);
        assert!(!config.area_border_router);
        assert_eq!(config.rxmt_interval, 2);
        assert_eq!(config.dead_interval, 40);
    }

    #[test]
    fn reject_unknown_keys() {
        assert!(toml::from_str::<InstanceCfg>("hello-interval = 10").is_err());
    }

    #[test]
    fn zero_interval_is_rejected() {
        let path = std::env::temp_dir().join(format!(
            "holo-adjacency-zero-interval-{}.toml",
            std::process::id()
        ));
        std::fs::write(&path, "router-id = \"1.1.1.1\"\nrxmt-interval = 0\n")
            .unwrap();
        let result = InstanceCfg::load(path.to_str());
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(
            result,
            Err(Error::ConfigInvalid(_, "rxmt-interval"))
        ));
    }

    #[test]
    fn zero_interval_is_clamped() {
        let config = InstanceCfg {
            rxmt_interval: 0,
            query_refresh_interval: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err("rxmt-interval"));
        assert_eq!(config.rxmt_interval(), Duration::from_secs(1));
        assert_eq!(config.query_refresh_interval(), Duration::from_secs(1));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = InstanceCfg::load(Some("/nonexistent/holo-adjacency.toml"));
        assert_eq!(config.unwrap(), InstanceCfg::default());
    }
}
