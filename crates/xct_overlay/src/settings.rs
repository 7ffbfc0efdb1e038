//! Run configuration stored as TOML.
//!
//! ```toml
//! game_dir = "/games/x3"
//! addon_dir = "addon"
//! override_dir = "/work/overrides"
//! backup_policy = "prefer-loose"
//! ```
//!
//! Relative `addon_dir`, `override_dir` and `output_dir` values are resolved
//! against `game_dir`.

use crate::error::{Error, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

/// Which source wins when an un-ledgered loose file and a displaced backup of
/// it are both present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackupPolicy {
    /// The loose file wins; the backup is only read for paths we produced.
    #[default]
    PreferLoose,
    /// A backup wins whenever one exists.
    PreferBackup,
}

/// Settings for one customization run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Game installation root holding the base containers and loose files.
    pub game_dir: Utf8PathBuf,

    /// Directory of add-on containers and loose add-on files.
    #[serde(default = "default_addon_dir")]
    pub addon_dir: Utf8PathBuf,

    /// Operator-supplied folder that outranks every other source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_dir: Option<Utf8PathBuf>,

    /// Where modified assets are written. Defaults to the add-on directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<Utf8PathBuf>,

    /// Ledger file name inside the output directory.
    #[serde(default = "default_ledger_file")]
    pub ledger_file: String,

    /// Suffix appended to a displaced file's name to form its backup.
    #[serde(default = "default_backup_suffix")]
    pub backup_suffix: String,

    #[serde(default)]
    pub backup_policy: BackupPolicy,
}

fn default_addon_dir() -> Utf8PathBuf {
    Utf8PathBuf::from("addon")
}

fn default_ledger_file() -> String {
    "xct_ledger.json".to_string()
}

fn default_backup_suffix() -> String {
    ".xct_backup".to_string()
}

impl Settings {
    pub fn new(game_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            game_dir: game_dir.into(),
            addon_dir: default_addon_dir(),
            override_dir: None,
            output_dir: None,
            ledger_file: default_ledger_file(),
            backup_suffix: default_backup_suffix(),
            backup_policy: BackupPolicy::default(),
        }
    }

    pub fn with_addon_dir(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.addon_dir = dir.into();
        self
    }

    pub fn with_override_dir(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.override_dir = Some(dir.into());
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn with_backup_policy(mut self, policy: BackupPolicy) -> Self {
        self.backup_policy = policy;
        self
    }

    /// Parse settings from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load settings from a TOML file.
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_std_path())?;
        let settings = Self::from_toml_str(&contents)?;
        tracing::debug!("Loaded settings from {}", path);
        Ok(settings)
    }

    /// Save settings as TOML, creating parent directories if needed.
    pub fn save(&self, path: &Utf8Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent.as_std_path())?;
        }
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path.as_std_path(), contents)?;
        Ok(())
    }

    /// Fail with [`Error::InvalidGameDir`] unless the game directory exists.
    pub fn validate(&self) -> Result<()> {
        if !self.game_dir.as_std_path().is_dir() {
            return Err(Error::InvalidGameDir(self.game_dir.clone()));
        }
        Ok(())
    }

    fn resolve(&self, dir: &Utf8Path) -> Utf8PathBuf {
        // `join` keeps absolute paths as-is.
        self.game_dir.join(dir)
    }

    pub fn addon_root(&self) -> Utf8PathBuf {
        self.resolve(&self.addon_dir)
    }

    pub fn override_root(&self) -> Option<Utf8PathBuf> {
        self.override_dir.as_deref().map(|dir| self.resolve(dir))
    }

    pub fn output_root(&self) -> Utf8PathBuf {
        match &self.output_dir {
            Some(dir) => self.resolve(dir),
            None => self.addon_root(),
        }
    }

    pub fn ledger_path(&self) -> Utf8PathBuf {
        self.output_root().join(&self.ledger_file)
    }

    /// Loose-file roots in search order: output, add-on, game. Duplicates removed.
    pub fn loose_roots(&self) -> Vec<Utf8PathBuf> {
        let mut roots: Vec<Utf8PathBuf> = Vec::with_capacity(3);
        for root in [self.output_root(), self.addon_root(), self.game_dir.clone()] {
            if !roots.contains(&root) {
                roots.push(root);
            }
        }
        roots
    }

    /// Backup location for a displaced file.
    pub fn backup_path_for(&self, file: &Utf8Path) -> Utf8PathBuf {
        Utf8PathBuf::from(format!("{}{}", file, self.backup_suffix))
    }
}
