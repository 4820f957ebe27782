//! Layered table configuration
//!
//! Controls the defaults applied to eager layers whose options leave the
//! expiry or the reconcile strategy unspecified. Loadable from RON:
//!
//! ```ron
//! (
//!     default_expiry_ms: Some(3000),
//!     default_reconcile: Expire,
//! )
//! ```

use crate::error::{Error, Result};
use crate::layer::Expiry;
use crate::reconcile::{AlwaysExpire, AlwaysIgnore, Reconcile};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Reconcile strategy used when an eager layer does not name one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ReconcilePolicy {
    /// Drop the layer as soon as anything changes underneath it
    #[default]
    Expire,
    /// Keep the layer until it times out or is expired explicitly
    Ignore,
}

impl ReconcilePolicy {
    /// Build the strategy object for this policy
    pub fn strategy(&self) -> Box<dyn Reconcile> {
        match self {
            ReconcilePolicy::Expire => Box::new(AlwaysExpire),
            ReconcilePolicy::Ignore => Box::new(AlwaysIgnore),
        }
    }
}

/// Configuration for a layered table
///
/// # Example
///
/// ```
/// use veneer_layers::{Expiry, LayerConfig};
///
/// let config = LayerConfig::default();
/// assert_eq!(config.default_expiry(), Expiry::In(3000));
///
/// let config = LayerConfig::from_ron_str("(default_expiry_ms: None)").unwrap();
/// assert_eq!(config.default_expiry(), Expiry::Never);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerConfig {
    /// Lifetime of a layer created without an explicit expiry
    ///
    /// `None` keeps such layers until they are expired explicitly or by
    /// reconciliation.
    #[serde(default = "default_expiry_ms")]
    pub default_expiry_ms: Option<u64>,
    /// Strategy for layers created without one
    #[serde(default)]
    pub default_reconcile: ReconcilePolicy,
}

fn default_expiry_ms() -> Option<u64> {
    Some(3000)
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            default_expiry_ms: default_expiry_ms(),
            default_reconcile: ReconcilePolicy::default(),
        }
    }
}

impl LayerConfig {
    /// Parse a configuration from RON text
    pub fn from_ron_str(text: &str) -> Result<Self> {
        ron::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Read a RON configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_ron_str(&text)
    }

    /// Builder-style: change the default lifetime
    pub fn with_default_expiry_ms(mut self, expiry_ms: Option<u64>) -> Self {
        self.default_expiry_ms = expiry_ms;
        self
    }

    /// Builder-style: change the default reconcile policy
    pub fn with_default_reconcile(mut self, policy: ReconcilePolicy) -> Self {
        self.default_reconcile = policy;
        self
    }

    /// Expiry applied to layers created without one
    pub fn default_expiry(&self) -> Expiry {
        match self.default_expiry_ms {
            Some(ms) => Expiry::In(ms),
            None => Expiry::Never,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LayerConfig::default();
        assert_eq!(config.default_expiry_ms, Some(3000));
        assert_eq!(config.default_reconcile, ReconcilePolicy::Expire);
        assert_eq!(config.default_expiry(), Expiry::In(3000));
    }

    #[test]
    fn test_parse_full() {
        let config = LayerConfig::from_ron_str(
            "(default_expiry_ms: Some(250), default_reconcile: Ignore)",
        )
        .unwrap();
        assert_eq!(config.default_expiry(), Expiry::In(250));
        assert_eq!(config.default_reconcile, ReconcilePolicy::Ignore);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config = LayerConfig::from_ron_str("(default_reconcile: Expire)").unwrap();
        assert_eq!(config, LayerConfig::default());
    }

    #[test]
    fn test_parse_error_is_config_error() {
        let result = LayerConfig::from_ron_str("(default_reconcile: Sometimes)");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let result = LayerConfig::load("/nonexistent/veneer.ron");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_builders() {
        let config = LayerConfig::default()
            .with_default_expiry_ms(None)
            .with_default_reconcile(ReconcilePolicy::Ignore);
        assert_eq!(config.default_expiry(), Expiry::Never);
        assert_eq!(config.default_reconcile, ReconcilePolicy::Ignore);
    }
}
