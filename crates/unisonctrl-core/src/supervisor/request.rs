//! Command line and environment of one sync instance

use std::path::PathBuf;

use serde::Serialize;

use crate::config::Config;

/// Everything needed to launch one unison process
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpawnRequest {
    pub syncname: String,
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub working_dir: PathBuf,
    /// stdout and stderr of the process are appended here
    pub log_path: PathBuf,
}

impl SpawnRequest {
    /// Build the invocation for `syncname` covering `dirs` (relative to the
    /// local root, in sync order).
    ///
    /// Argument order: local root, remote URL, optional `-sshargs`, one
    /// `-path` per directory, the global options verbatim, then `-label`
    /// and `-logfile`.
    pub fn for_instance(config: &Config, syncname: &str, dirs: &[String]) -> Self {
        let log_path = config.instance_log_path(syncname);

        let mut args = vec![
            config.local_root.to_string_lossy().into_owned(),
            config.remote_root_url(),
        ];

        if let Some(keyfile) = &config.remote_ssh_keyfile {
            args.push("-sshargs".into());
            args.push(format!("-i {}", keyfile.display()));
        }

        for dir in dirs {
            args.push("-path".into());
            args.push(dir.clone());
        }

        args.extend(config.global_options.iter().cloned());
        args.push(format!("-label={syncname}"));
        args.push(format!("-logfile={}", log_path.display()));

        let home = config.home_dir.to_string_lossy().into_owned();
        let env = vec![
            ("UNISONLOCALHOSTNAME".to_string(), config.local_hostname.clone()),
            ("HOME".to_string(), home.clone()),
            ("USER".to_string(), config.user.clone()),
            ("LOGNAME".to_string(), config.user.clone()),
            ("PWD".to_string(), home),
        ];

        Self {
            syncname: syncname.to_string(),
            program: config.unison_path.clone(),
            args,
            env,
            working_dir: config.home_dir.clone(),
            log_path,
        }
    }

    /// Shell-like rendering for logs and dry runs
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.to_string_lossy().into_owned())
            .chain(self.args.iter().map(|arg| {
                if arg.contains(char::is_whitespace) {
                    format!("\"{arg}\"")
                } else {
                    arg.clone()
                }
            }))
            .collect::<Vec<_>>()
            .join(" ")
    }
}
