//! # Emulator Configuration
//!
//! This module defines the identity of the emulated printer and the runtime
//! settings collected from the command line.
//!
//! ## Usage
//!
//! ```
//! use cloudprnt_emulator::printer::EmulatorConfig;
//!
//! let config = EmulatorConfig::new("http://localhost:8080/cloudprnt.php", 5)?;
//! assert_eq!(config.poll_interval.as_secs(), 5);
//! assert_eq!(config.identity.as_str(), "00:11:62:00:00:01");
//! # Ok::<(), cloudprnt_emulator::CloudPrntError>(())
//! ```

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;

use crate::error::CloudPrntError;

/// Hardware address reported when none is configured.
///
/// 00:11:62 is the Star Micronics OUI.
pub const DEFAULT_MAC: &str = "00:11:62:00:00:01";

/// Topic prefix used by CloudPRNT MQTT brokers.
pub const DEFAULT_TOPIC_NAMESPACE: &str = "star/cloudprnt";

/// Value reported for the `ClientType` client action.
pub const CLIENT_TYPE: &str = "CloudPRNT Emulator";

/// Value reported for the `ClientVersion` client action.
pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// # Printer Identity
///
/// The MAC address this emulator claims. It is sent as `mac` on every HTTP
/// request, as `printerMAC` in every status body and used as the MQTT client
/// id, so it never changes once the process has started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrinterIdentity(String);

impl PrinterIdentity {
    /// Validate and wrap a MAC address (XX:XX:XX:XX:XX:XX).
    ///
    /// Hex digits are normalized to lowercase.
    pub fn new(mac: &str) -> Result<Self, CloudPrntError> {
        if !is_valid_mac(mac) {
            return Err(CloudPrntError::Config(format!(
                "Invalid MAC address '{}', expected XX:XX:XX:XX:XX:XX",
                mac
            )));
        }
        Ok(Self(mac.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for PrinterIdentity {
    fn default() -> Self {
        Self(DEFAULT_MAC.to_string())
    }
}

impl fmt::Display for PrinterIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validate a MAC address format (XX:XX:XX:XX:XX:XX).
pub fn is_valid_mac(mac: &str) -> bool {
    let parts: Vec<&str> = mac.split(':').collect();
    if parts.len() != 6 {
        return false;
    }
    parts
        .iter()
        .all(|part| part.len() == 2 && part.chars().all(|c| c.is_ascii_hexdigit()))
}

/// HTTP basic-auth credentials applied to every request to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub user: String,
    pub password: Option<String>,
}

/// # Emulator Configuration
///
/// Everything the session needs to know, collected once at startup.
#[derive(Debug, Clone)]
pub struct EmulatorConfig {
    /// CloudPRNT endpoint the printer polls
    pub poll_url: Url,

    /// Delay between poll cycles
    pub poll_interval: Duration,

    /// Rotate decoded raster jobs by 180° before writing them
    pub rotate: bool,

    /// Device identity
    pub identity: PrinterIdentity,

    /// Optional basic-auth credentials
    pub auth: Option<BasicAuth>,

    /// Directory output files are written to
    pub output_dir: PathBuf,

    /// MQTT topic prefix
    pub topic_namespace: String,
}

impl EmulatorConfig {
    /// Build a configuration with default identity and output settings.
    ///
    /// ## Errors
    ///
    /// Returns [`CloudPrntError::Config`] if the URL is not an absolute
    /// http(s) URL or the interval is zero.
    pub fn new(poll_url: &str, poll_interval_secs: u64) -> Result<Self, CloudPrntError> {
        let poll_url = Url::parse(poll_url)
            .map_err(|e| CloudPrntError::Config(format!("Invalid poll URL '{}': {}", poll_url, e)))?;
        if !matches!(poll_url.scheme(), "http" | "https") {
            return Err(CloudPrntError::Config(format!(
                "Poll URL must use http or https, got '{}'",
                poll_url.scheme()
            )));
        }
        if poll_interval_secs == 0 {
            return Err(CloudPrntError::Config(
                "Poll interval must be at least 1 second".to_string(),
            ));
        }

        Ok(Self {
            poll_url,
            poll_interval: Duration::from_secs(poll_interval_secs),
            rotate: false,
            identity: PrinterIdentity::default(),
            auth: None,
            output_dir: PathBuf::from("."),
            topic_namespace: DEFAULT_TOPIC_NAMESPACE.to_string(),
        })
    }
}
