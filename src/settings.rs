//! Theme preference: process-wide configuration with write-through
//! persistence.
//!
//! Init rule: a persisted explicit choice wins; otherwise the OS preference
//! supplied by the caller applies. Update rule: every explicit change is
//! written to disk immediately, and once a choice was made explicitly,
//! later OS preference changes no longer apply.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ServiceError, ServiceResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
}

#[derive(Serialize, Deserialize)]
struct StoredPreference {
    theme: Theme,
}

pub struct ThemePreference {
    path: PathBuf,
    theme: Theme,
    explicit: bool,
}

impl ThemePreference {
    /// Load from `path`, falling back to the caller-supplied OS preference
    /// when nothing was persisted (or the file is unreadable).
    pub fn load(path: impl Into<PathBuf>, system_default: Theme) -> Self {
        let path = path.into();
        match fs::read_to_string(&path)
            .ok()
            .and_then(|raw| serde_json::from_str::<StoredPreference>(&raw).ok())
        {
            Some(stored) => Self {
                path,
                theme: stored.theme,
                explicit: true,
            },
            None => Self {
                path,
                theme: system_default,
                explicit: false,
            },
        }
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    /// Whether the current theme came from an explicit user choice.
    pub fn is_explicit(&self) -> bool {
        self.explicit
    }

    /// Explicit change; persisted before returning.
    pub fn set(&mut self, theme: Theme) -> ServiceResult<()> {
        self.theme = theme;
        self.explicit = true;
        let raw = serde_json::to_string(&StoredPreference { theme })?;
        fs::write(&self.path, raw).map_err(|e| {
            warn!(path = %self.path.display(), error = %e, "theme preference not persisted");
            ServiceError::Storage(format!("failed to persist theme preference: {}", e))
        })
    }

    pub fn toggle(&mut self) -> ServiceResult<Theme> {
        let next = match self.theme {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        };
        self.set(next)?;
        Ok(next)
    }

    /// OS preference change; applies only while no explicit choice exists.
    pub fn system_changed(&mut self, theme: Theme) {
        if !self.explicit {
            self.theme = theme;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_default_until_explicit_choice() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("theme.json");

        let mut prefs = ThemePreference::load(&path, Theme::Dark);
        assert_eq!(prefs.theme(), Theme::Dark);
        assert!(!prefs.is_explicit());

        prefs.system_changed(Theme::Light);
        assert_eq!(prefs.theme(), Theme::Light);

        prefs.set(Theme::Dark).unwrap();
        prefs.system_changed(Theme::Light);
        assert_eq!(prefs.theme(), Theme::Dark, "explicit choice wins");
    }

    #[test]
    fn test_write_through_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("theme.json");

        let mut prefs = ThemePreference::load(&path, Theme::Light);
        prefs.toggle().unwrap();
        assert_eq!(prefs.theme(), Theme::Dark);

        let reloaded = ThemePreference::load(&path, Theme::Light);
        assert_eq!(reloaded.theme(), Theme::Dark);
        assert!(reloaded.is_explicit());
    }

    #[test]
    fn test_corrupt_file_falls_back_to_system() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("theme.json");
        fs::write(&path, "not json").unwrap();

        let prefs = ThemePreference::load(&path, Theme::Dark);
        assert_eq!(prefs.theme(), Theme::Dark);
        assert!(!prefs.is_explicit());
    }
}
