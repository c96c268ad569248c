//! YAML configuration file
//!
//! ```yaml
//! smtp_host: mail.example.org
//! smtp_port: 587
//! username: alice
//! password: secret
//! # optional
//! proxy_port: 9150
//! user_agent: false
//! verify_certificates: false
//! timeout: 120
//! ```

use std::convert::TryFrom;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::de::{self, Deserializer, Visitor};
use serde_derive::Deserialize;

use crate::delivery::{DeliveryTarget, DEFAULT_PROXY_PORT};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    pub smtp_host: String,
    #[serde(deserialize_with = "deserialize_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub proxy_port: Option<u16>,
    #[serde(default)]
    pub user_agent: Option<bool>,
    #[serde(default)]
    pub verify_certificates: Option<bool>,
    /// Seconds
    #[serde(default)]
    pub timeout: Option<u64>,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let config: Config = serde_yaml::from_str(content)?;
        Ok(config)
    }

    /// Delivery target described by this file
    pub fn target(&self) -> DeliveryTarget {
        DeliveryTarget {
            host: self.smtp_host.clone(),
            port: self.smtp_port,
            proxy_port: self.proxy_port.unwrap_or(DEFAULT_PROXY_PORT),
            username: self.username.clone(),
            password: self.password.clone(),
            verify_certificates: self.verify_certificates.unwrap_or(false),
            timeout: self.timeout.map(Duration::from_secs),
        }
    }
}

/// Accepts `587` as well as `"587"`
fn deserialize_port<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    struct PortVisitor;

    impl<'de> Visitor<'de> for PortVisitor {
        type Value = u16;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a port number")
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<u16, E> {
            u16::try_from(value).map_err(|_| E::custom(format!("port out of range: {}", value)))
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<u16, E> {
            u16::try_from(value).map_err(|_| E::custom(format!("port out of range: {}", value)))
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<u16, E> {
            value
                .trim()
                .parse()
                .map_err(|_| E::custom(format!("invalid port: {:?}", value)))
        }
    }

    deserializer.deserialize_any(PortVisitor)
}
