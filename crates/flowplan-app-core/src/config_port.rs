// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Preferences port shared by flowplan tools.

use crate::config::{ConfigError, ConfigService, ConfigStore};
use crate::prefs::{PlannerPrefs, PREFS_KEY};

/// Loads and saves [`PlannerPrefs`].
pub trait PrefsPort {
    /// Stored preferences, or the defaults when nothing is stored.
    fn load_prefs(&self) -> Result<PlannerPrefs, ConfigError>;
    /// Persist preferences.
    fn save_prefs(&self, prefs: &PlannerPrefs) -> Result<(), ConfigError>;
}

impl<S: ConfigStore> PrefsPort for ConfigService<S> {
    fn load_prefs(&self) -> Result<PlannerPrefs, ConfigError> {
        self.load_or_default(PREFS_KEY)
    }

    fn save_prefs(&self, prefs: &PlannerPrefs) -> Result<(), ConfigError> {
        self.save(PREFS_KEY, prefs)
    }
}
