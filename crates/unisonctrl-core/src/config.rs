//! Controller configuration
//!
//! The file is parsed into [`ConfigFile`] (the on-disk schema, unknown keys
//! rejected), then resolved into an immutable [`Config`]: defaults applied,
//! paths sanitized, host/user/home detected, and every violation collected
//! into a single [`Error::ConfigInvalid`].

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use unisonctrl_fs::{ConfigStore, sanitize_path};

use crate::rules::{SortMethod, SyncRule};
use crate::{Error, Result};

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "/etc/unisonctrl/config.toml";

/// Subdirectory of `data_dir` holding one record file per instance
const RUNNING_DATA_SUBDIR: &str = "running-sync-instances";

/// Lock file serializing passes, inside `data_dir`
const LOCK_FILE: &str = "unisonctrl.lock";

fn default_unison_path() -> PathBuf {
    PathBuf::from("/usr/bin/unison")
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/tmp/unisonctrl")
}

fn default_unison_log_dir() -> PathBuf {
    PathBuf::from("/var/log/unisonctrl/unison-instance-logs")
}

fn default_true() -> bool {
    true
}

/// Timing of the escalating termination sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TerminationPolicy {
    /// How long to wait for exit after SIGTERM
    #[serde(default = "TerminationPolicy::default_grace_ms")]
    pub grace_period_ms: u64,
    /// How long to wait for exit after SIGKILL
    #[serde(default = "TerminationPolicy::default_kill_ms")]
    pub kill_period_ms: u64,
    /// Liveness polling interval within each window
    #[serde(default = "TerminationPolicy::default_poll_ms")]
    pub poll_interval_ms: u64,
}

impl TerminationPolicy {
    fn default_grace_ms() -> u64 {
        3_000
    }

    fn default_kill_ms() -> u64 {
        3_000
    }

    fn default_poll_ms() -> u64 {
        100
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn kill_period(&self) -> Duration {
        Duration::from_millis(self.kill_period_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for TerminationPolicy {
    fn default() -> Self {
        Self {
            grace_period_ms: Self::default_grace_ms(),
            kill_period_ms: Self::default_kill_ms(),
            poll_interval_ms: Self::default_poll_ms(),
        }
    }
}

/// On-disk configuration schema
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default = "default_unison_path")]
    pub unison_path: PathBuf,
    pub unison_local_root: PathBuf,
    pub unison_remote_root: PathBuf,
    /// SSH target, e.g. `syncd@10.0.0.5` or a `~/.ssh/config` host alias
    pub unison_remote_ssh_conn: String,
    #[serde(default)]
    pub unison_remote_ssh_keyfile: Option<PathBuf>,
    /// Identity unison uses for its archive names; defaults to the hostname
    #[serde(default)]
    pub unison_local_hostname: Option<String>,
    #[serde(default)]
    pub unison_home_dir: Option<PathBuf>,
    #[serde(default)]
    pub unison_user: Option<String>,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_unison_log_dir")]
    pub unison_log_dir: PathBuf,
    #[serde(default = "default_true")]
    pub make_root_directories_if_not_found: bool,
    /// Passed verbatim to every instance
    #[serde(default)]
    pub global_unison_config_options: Vec<String>,
    pub sync_hierarchy_rules: Vec<SyncRule>,
    #[serde(default)]
    pub termination: TerminationPolicy,

    // Keys of older configurations; accepted and ignored with a warning
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unisonctrl_log_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotate_logs: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhooks: Option<serde_json::Value>,
}

/// Resolved, validated configuration. Immutable for the life of a pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Config {
    pub unison_path: PathBuf,
    pub local_root: PathBuf,
    pub remote_root: PathBuf,
    pub remote_ssh_conn: String,
    pub remote_ssh_keyfile: Option<PathBuf>,
    pub local_hostname: String,
    pub home_dir: PathBuf,
    pub user: String,
    pub data_dir: PathBuf,
    pub unison_log_dir: PathBuf,
    pub make_root_directories_if_not_found: bool,
    pub global_options: Vec<String>,
    pub rules: Vec<SyncRule>,
    pub termination: TerminationPolicy,
    /// Obsolete keys present in the file
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ignored_keys: Vec<String>,
}

impl Config {
    /// Load, resolve and validate the configuration at `path`.
    ///
    /// The format follows the file extension (TOML, JSON or YAML).
    pub fn load(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading configuration");
        let file: ConfigFile = ConfigStore::new().load(path)?;
        file.resolve(path)
    }

    /// Parse TOML content directly; `origin` only labels errors.
    pub fn from_toml_str(content: &str, origin: &Path) -> Result<Self> {
        let file: ConfigFile = toml::from_str(content).map_err(|e| {
            Error::Fs(unisonctrl_fs::Error::ConfigParse {
                path: origin.to_path_buf(),
                format: "TOML".into(),
                message: e.to_string(),
            })
        })?;
        file.resolve(origin)
    }

    /// Directory holding the per-instance record files
    pub fn running_data_dir(&self) -> PathBuf {
        self.data_dir.join(RUNNING_DATA_SUBDIR)
    }

    /// Lock file serializing reconciliation passes
    pub fn lock_path(&self) -> PathBuf {
        self.data_dir.join(LOCK_FILE)
    }

    /// Log file of one instance
    pub fn instance_log_path(&self, syncname: &str) -> PathBuf {
        self.unison_log_dir.join(format!("{syncname}.log"))
    }

    /// `ssh://<conn>/<remote_root>`; an absolute remote root yields the
    /// double slash unison expects.
    pub fn remote_root_url(&self) -> String {
        format!(
            "ssh://{}/{}",
            self.remote_ssh_conn,
            self.remote_root.to_string_lossy()
        )
    }

    /// Non-fatal findings worth showing an operator.
    ///
    /// Unknown sort methods load fine but abort every partitioning pass.
    pub fn warnings(&self) -> Vec<String> {
        let ignored = self
            .ignored_keys
            .iter()
            .map(|key| format!("'{key}' is no longer supported and is ignored"));

        ignored
            .chain(self.rules.iter().filter_map(|rule| match &rule.sort_method {
                SortMethod::Unrecognized(method) => Some(format!(
                    "rule '{}': sort_method '{}' is not recognized; every pass will abort",
                    rule.syncname, method
                )),
                _ => None,
            }))
            .chain(self.rules.iter().filter_map(|rule| {
                let raw = rule.sort_count.as_ref()?;
                raw.as_positive().is_none().then(|| {
                    format!(
                        "rule '{}': sort_count {:?} is not a positive integer; default used",
                        rule.syncname, raw
                    )
                })
            }))
            .collect()
    }
}

impl ConfigFile {
    /// Apply defaults and validate; `origin` labels errors.
    pub fn resolve(self, origin: &Path) -> Result<Config> {
        let mut violations = Vec::new();

        let local_root = sanitize_path(&self.unison_local_root);
        if local_root.as_os_str().is_empty() {
            violations.push("unison_local_root must not be empty".to_string());
        } else if !local_root.is_absolute() {
            violations.push(format!(
                "unison_local_root must be absolute, got '{}'",
                local_root.display()
            ));
        }

        let remote_root = sanitize_path(&self.unison_remote_root);
        if remote_root.as_os_str().is_empty() {
            violations.push("unison_remote_root must not be empty".to_string());
        }

        let remote_ssh_conn = self.unison_remote_ssh_conn.trim().to_string();
        if remote_ssh_conn.is_empty() {
            violations.push("unison_remote_ssh_conn must not be empty".to_string());
        }

        let unison_path = sanitize_path(&self.unison_path);
        if unison_path.as_os_str().is_empty() {
            violations.push("unison_path must not be empty".to_string());
        }

        let local_hostname = self
            .unison_local_hostname
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .or_else(sysinfo::System::host_name);
        if local_hostname.is_none() {
            violations
                .push("unison_local_hostname is not set and the hostname cannot be detected".into());
        }

        let home_dir = self
            .unison_home_dir
            .map(|p| sanitize_path(&p))
            .filter(|p| !p.as_os_str().is_empty())
            .or_else(dirs::home_dir);
        if home_dir.is_none() {
            violations.push("unison_home_dir is not set and no home directory was found".into());
        }

        let user = self
            .unison_user
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .or_else(|| std::env::var("USER").ok())
            .or_else(|| std::env::var("LOGNAME").ok());
        if user.is_none() {
            violations.push("unison_user is not set and USER/LOGNAME are empty".into());
        }

        if self.termination.poll_interval_ms == 0 {
            violations.push("termination.poll_interval_ms must be greater than zero".into());
        }

        validate_rules(&self.sync_hierarchy_rules, &mut violations);

        let ignored_keys: Vec<String> = [
            ("unisonctrl_log_dir", self.unisonctrl_log_dir.is_some()),
            ("rotate_logs", self.rotate_logs.is_some()),
            ("webhooks", self.webhooks.is_some()),
        ]
        .into_iter()
        .filter(|(_, present)| *present)
        .map(|(key, _)| key.to_string())
        .collect();

        if !violations.is_empty() {
            return Err(Error::ConfigInvalid {
                path: origin.to_path_buf(),
                violations,
            });
        }

        Ok(Config {
            unison_path,
            local_root,
            remote_root,
            remote_ssh_conn,
            remote_ssh_keyfile: self
                .unison_remote_ssh_keyfile
                .map(|p| sanitize_path(&p))
                .filter(|p| !p.as_os_str().is_empty()),
            local_hostname: local_hostname.unwrap_or_default(),
            home_dir: home_dir.unwrap_or_default(),
            user: user.unwrap_or_default(),
            data_dir: sanitize_path(&self.data_dir),
            unison_log_dir: sanitize_path(&self.unison_log_dir),
            make_root_directories_if_not_found: self.make_root_directories_if_not_found,
            global_options: self.global_unison_config_options,
            rules: self.sync_hierarchy_rules,
            termination: self.termination,
            ignored_keys,
        })
    }
}

fn validate_rules(rules: &[SyncRule], violations: &mut Vec<String>) {
    if rules.is_empty() {
        violations.push("sync_hierarchy_rules must contain at least one rule".into());
    }

    let mut seen = BTreeSet::new();
    for (index, rule) in rules.iter().enumerate() {
        let label = format!("sync_hierarchy_rules[{index}]");

        if rule.syncname.is_empty() {
            violations.push(format!("{label}: syncname must not be empty"));
        } else if !is_valid_syncname(&rule.syncname) {
            violations.push(format!(
                "{label}: syncname '{}' may only contain letters, digits, '-' and '_'",
                rule.syncname
            ));
        } else if !seen.insert(rule.syncname.as_str()) {
            violations.push(format!("{label}: duplicate syncname '{}'", rule.syncname));
        }

        let selector = rule.dir_selector.trim();
        if selector.is_empty() {
            violations.push(format!("{label}: dir_selector must not be empty"));
        } else if selector.starts_with('/') {
            violations.push(format!(
                "{label}: dir_selector '{selector}' must be relative to the sync root"
            ));
        } else if selector.split('/').any(|segment| segment == "..") {
            violations.push(format!(
                "{label}: dir_selector '{selector}' must not leave the sync root"
            ));
        } else if let Err(e) = glob::Pattern::new(selector) {
            violations.push(format!("{label}: dir_selector '{selector}' is not a valid glob: {e}"));
        }
    }
}

fn is_valid_syncname(name: &str) -> bool {
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
