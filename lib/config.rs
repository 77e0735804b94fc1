//! Switches for the consistency checks.
//!
//! A configuration can be built in code or read from TOML, e.g.
//! ```toml
//! check_herm = true
//! check_symm = false
//! ```
//! Keys left out keep their default (`true`); unknown keys are rejected.

use serde::Deserialize;
use crate::error::{ CheckKind, OpResult };

/// Which consistency checks to run.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CheckConfig {
    pub check_herm: bool,
    pub check_symm: bool,
    pub check_pcon: bool,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self { check_herm: true, check_symm: true, check_pcon: true }
    }
}

impl CheckConfig {
    /// Configuration with every check turned off.
    pub fn none() -> Self {
        Self { check_herm: false, check_symm: false, check_pcon: false }
    }

    /// Turn a single check on or off.
    pub fn with(mut self, kind: CheckKind, enabled: bool) -> Self {
        match kind {
            CheckKind::Hermiticity => { self.check_herm = enabled; },
            CheckKind::Symmetry => { self.check_symm = enabled; },
            CheckKind::ParticleConservation => { self.check_pcon = enabled; },
        }
        self
    }

    pub fn is_enabled(&self, kind: CheckKind) -> bool {
        match kind {
            CheckKind::Hermiticity => self.check_herm,
            CheckKind::Symmetry => self.check_symm,
            CheckKind::ParticleConservation => self.check_pcon,
        }
    }

    /// Parse a configuration from a TOML document.
    pub fn from_toml_str(s: &str) -> OpResult<Self> { Ok(toml::from_str(s)?) }
}

#[cfg(test)]
mod tests {
    use crate::error::OpError;
    use super::*;

    #[test]
    fn missing_keys_keep_defaults() {
        let config = CheckConfig::from_toml_str("check_symm = false").unwrap();
        assert_eq!(
            config,
            CheckConfig { check_herm: true, check_symm: false, check_pcon: true },
        );
        assert_eq!(CheckConfig::from_toml_str("").unwrap(), CheckConfig::default());
    }

    #[test]
    fn unknown_keys_rejected() {
        let res = CheckConfig::from_toml_str("check_hermiticity = false");
        assert!(matches!(res, Err(OpError::Config(_))));
        let res = CheckConfig::from_toml_str("check_herm = 1");
        assert!(matches!(res, Err(OpError::Config(_))));
    }

    #[test]
    fn builder_toggles_single_checks() {
        let config = CheckConfig::none().with(CheckKind::Symmetry, true);
        assert!(config.is_enabled(CheckKind::Symmetry));
        assert!(!config.is_enabled(CheckKind::Hermiticity));
        assert!(!config.is_enabled(CheckKind::ParticleConservation));
        let config = config.with(CheckKind::Symmetry, false);
        assert_eq!(config, CheckConfig::none());
    }
}
