//! [`Supervisor`] backed by real OS processes

use std::collections::BTreeSet;
use std::fs::OpenOptions;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::Pid as NixPid;
use sysinfo::{Pid, Process, ProcessStatus, System};

use super::{ActualProcesses, SpawnRequest, SpawnedProcess, Supervisor};
use crate::config::{Config, TerminationPolicy};
use crate::{Error, Result};

/// Spawns and signals unison processes through the OS
#[derive(Debug, Clone)]
pub struct OsSupervisor {
    binary: PathBuf,
    /// `binary` with symlinks resolved, when it exists
    canonical: Option<PathBuf>,
    policy: TerminationPolicy,
}

impl OsSupervisor {
    pub fn new(binary: &Path, policy: TerminationPolicy) -> Self {
        Self {
            binary: binary.to_path_buf(),
            canonical: dunce::canonicalize(binary).ok(),
            policy,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.unison_path, config.termination)
    }

    fn is_binary_path(&self, path: &Path) -> bool {
        path == self.binary || self.canonical.as_deref() == Some(path)
    }

    /// Matches the configured binary directly, or a wrapper script at that
    /// path, which runs as its interpreter with the script as first argument.
    fn is_sync_binary(&self, process: &Process) -> bool {
        let direct = match process.exe() {
            Some(exe) => self.is_binary_path(exe),
            None => self
                .binary
                .file_name()
                .is_some_and(|name| process.name() == name.to_string_lossy()),
        };
        direct
            || process
                .cmd()
                .get(1)
                .is_some_and(|script| self.is_binary_path(Path::new(script)))
    }

    /// Whether `pid` is running. Exited children are reaped on the way;
    /// zombies count as dead.
    pub fn is_alive(&self, pid: u32) -> bool {
        let Some(target) = nix_pid(pid) else {
            return false;
        };

        if let Ok(WaitStatus::Exited(..) | WaitStatus::Signaled(..)) =
            waitpid(target, Some(WaitPidFlag::WNOHANG))
        {
            return false;
        }

        match kill(target, None) {
            Err(Errno::ESRCH) => false,
            _ => !is_zombie(pid),
        }
    }

    /// Send `signal`; a process that is already gone is not an error.
    fn signal(&self, pid: u32, signal: Signal) -> Result<()> {
        let Some(target) = nix_pid(pid) else {
            return Ok(());
        };
        match kill(target, signal) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(source) => Err(Error::Signal { pid, source }),
        }
    }

    /// Poll until `pid` exits or `window` elapses. Returns true on exit.
    fn wait_for_exit(&self, pid: u32, window: Duration) -> bool {
        let deadline = Instant::now() + window;
        loop {
            if !self.is_alive(pid) {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            std::thread::sleep(self.policy.poll_interval().min(deadline - now));
        }
    }
}

impl Supervisor for OsSupervisor {
    fn spawn(&self, request: &SpawnRequest) -> Result<SpawnedProcess> {
        let spawn_error = |source: std::io::Error| Error::Spawn {
            syncname: request.syncname.clone(),
            source,
        };

        let stdout = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&request.log_path)
            .map_err(spawn_error)?;
        let stderr = stdout.try_clone().map_err(spawn_error)?;

        tracing::debug!(
            syncname = %request.syncname,
            command = %request.command_line(),
            "Spawning sync instance"
        );

        let child = Command::new(&request.program)
            .args(&request.args)
            .envs(request.env.iter().map(|(k, v)| (k, v)))
            .current_dir(&request.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .process_group(0)
            .spawn()
            .map_err(spawn_error)?;

        let pid = child.id();
        // Tracked by pid from here on; exited children are reaped in is_alive
        drop(child);

        let mut system = System::new();
        let started_at = system
            .refresh_process(Pid::from_u32(pid))
            .then(|| system.process(Pid::from_u32(pid)).map(Process::start_time))
            .flatten();

        Ok(SpawnedProcess { pid, started_at })
    }

    fn list_actual(&self) -> ActualProcesses {
        let mut system = System::new();
        system.refresh_processes();

        let actual: ActualProcesses = system
            .processes()
            .iter()
            .filter(|(_, process)| process.status() != ProcessStatus::Zombie)
            .filter(|(_, process)| self.is_sync_binary(process))
            .map(|(pid, process)| (pid.as_u32(), process.start_time()))
            .collect();

        tracing::debug!(binary = %self.binary.display(), count = actual.len(), "Enumerated sync processes");
        actual
    }

    fn terminate(&self, pid: u32, known_pids: &BTreeSet<u32>) -> Result<()> {
        if !known_pids.contains(&pid) {
            tracing::error!(pid, "Refusing to signal unrecorded pid");
            return Err(Error::Unauthorized { pid });
        }

        if !self.is_alive(pid) {
            tracing::debug!(pid, "Process already gone");
            return Ok(());
        }

        self.signal(pid, Signal::SIGTERM)?;
        if self.wait_for_exit(pid, self.policy.grace_period()) {
            tracing::debug!(pid, "Process exited after SIGTERM");
            return Ok(());
        }

        tracing::warn!(pid, grace_ms = self.policy.grace_period_ms, "Process ignored SIGTERM, sending SIGKILL");
        self.signal(pid, Signal::SIGKILL)?;
        if self.wait_for_exit(pid, self.policy.kill_period()) {
            return Ok(());
        }

        tracing::error!(pid, "Process survived SIGKILL");
        Err(Error::Unkillable { pid })
    }
}

/// Pid 0 and values beyond `i32` would address process groups, never a
/// single process.
fn nix_pid(pid: u32) -> Option<NixPid> {
    i32::try_from(pid)
        .ok()
        .filter(|raw| *raw > 0)
        .map(NixPid::from_raw)
}

fn is_zombie(pid: u32) -> bool {
    let mut system = System::new();
    let pid = Pid::from_u32(pid);
    system.refresh_process(pid)
        && system
            .process(pid)
            .is_some_and(|process| process.status() == ProcessStatus::Zombie)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fast_policy() -> TerminationPolicy {
        TerminationPolicy {
            grace_period_ms: 500,
            kill_period_ms: 2_000,
            poll_interval_ms: 20,
        }
    }

    fn shell_request(temp: &TempDir, script: &str) -> SpawnRequest {
        SpawnRequest {
            syncname: "test".into(),
            program: PathBuf::from("/bin/sh"),
            args: vec!["-c".into(), script.into()],
            env: vec![("UNISONLOCALHOSTNAME".into(), "nas01".into())],
            working_dir: temp.path().to_path_buf(),
            log_path: temp.path().join("test.log"),
        }
    }

    fn wait_until(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if done() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        done()
    }

    #[test]
    fn spawn_appends_output_to_log_with_environment() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("test.log"), "earlier\n").unwrap();
        let supervisor = OsSupervisor::new(Path::new("/bin/sh"), fast_policy());

        let request = shell_request(&temp, "echo \"host=$UNISONLOCALHOSTNAME\"; echo oops >&2");
        let spawned = supervisor.spawn(&request).unwrap();
        assert!(spawned.pid > 0);

        let log = temp.path().join("test.log");
        assert!(wait_until(Duration::from_secs(5), || {
            std::fs::read_to_string(&log).is_ok_and(|c| c.contains("oops"))
        }));
        let content = std::fs::read_to_string(&log).unwrap();
        assert!(content.starts_with("earlier\n"));
        assert!(content.contains("host=nas01"));

        assert!(wait_until(Duration::from_secs(5), || !supervisor.is_alive(spawned.pid)));
    }

    #[test]
    fn spawn_of_missing_binary_fails() {
        let temp = TempDir::new().unwrap();
        let supervisor = OsSupervisor::new(Path::new("/nonexistent/unison"), fast_policy());
        let mut request = shell_request(&temp, "");
        request.program = PathBuf::from("/nonexistent/unison");

        let err = supervisor.spawn(&request).unwrap_err();
        assert!(matches!(err, Error::Spawn { ref syncname, .. } if syncname == "test"));
    }

    #[test]
    fn terminate_stops_running_child() {
        let temp = TempDir::new().unwrap();
        let supervisor = OsSupervisor::new(Path::new("/bin/sh"), fast_policy());
        let spawned = supervisor.spawn(&shell_request(&temp, "exec sleep 30")).unwrap();
        assert!(supervisor.is_alive(spawned.pid));

        let known = BTreeSet::from([spawned.pid]);
        let started = Instant::now();
        supervisor.terminate(spawned.pid, &known).unwrap();

        assert!(!supervisor.is_alive(spawned.pid));
        assert!(started.elapsed() < Duration::from_millis(2_500));
    }

    #[test]
    fn terminate_escalates_when_sigterm_is_ignored() {
        let temp = TempDir::new().unwrap();
        let supervisor = OsSupervisor::new(Path::new("/bin/sh"), fast_policy());
        let spawned = supervisor
            .spawn(&shell_request(&temp, "trap '' TERM; while :; do :; done"))
            .unwrap();

        let known = BTreeSet::from([spawned.pid]);
        supervisor.terminate(spawned.pid, &known).unwrap();
        assert!(!supervisor.is_alive(spawned.pid));
    }

    #[test]
    fn terminate_of_exited_process_is_ok() {
        let temp = TempDir::new().unwrap();
        let supervisor = OsSupervisor::new(Path::new("/bin/sh"), fast_policy());
        let spawned = supervisor.spawn(&shell_request(&temp, "exit 0")).unwrap();
        assert!(wait_until(Duration::from_secs(5), || !supervisor.is_alive(spawned.pid)));

        supervisor
            .terminate(spawned.pid, &BTreeSet::from([spawned.pid]))
            .unwrap();
    }

    #[test]
    fn unrecorded_pid_is_refused() {
        let supervisor = OsSupervisor::new(Path::new("/usr/bin/unison"), fast_policy());
        let err = supervisor
            .terminate(999, &BTreeSet::from([100, 200]))
            .unwrap_err();
        assert!(matches!(err, Error::Unauthorized { pid: 999 }));
    }

    #[test]
    fn group_addressing_pids_are_never_alive() {
        let supervisor = OsSupervisor::new(Path::new("/usr/bin/unison"), fast_policy());
        assert!(!supervisor.is_alive(0));
        assert!(!supervisor.is_alive(u32::MAX));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn list_actual_finds_spawned_binary() {
        let temp = TempDir::new().unwrap();
        let spawner = OsSupervisor::new(Path::new("sleep"), fast_policy());
        let mut request = shell_request(&temp, "");
        request.program = PathBuf::from("sleep");
        request.args = vec!["30".into()];
        let spawned = spawner.spawn(&request).unwrap();

        let exe = std::fs::read_link(format!("/proc/{}/exe", spawned.pid)).unwrap();
        let supervisor = OsSupervisor::new(&exe, fast_policy());
        let actual = supervisor.list_actual();
        assert!(actual.contains_key(&spawned.pid), "{actual:?}");

        supervisor
            .terminate(spawned.pid, &BTreeSet::from([spawned.pid]))
            .unwrap();
        assert!(!supervisor.list_actual().contains_key(&spawned.pid));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn list_actual_finds_wrapper_script() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let wrapper = temp.path().join("unison-wrapper");
        std::fs::write(&wrapper, "#!/bin/sh\ntrap 'kill $! 2>/dev/null; exit 0' TERM\nsleep 30 &\nwait\n").unwrap();
        std::fs::set_permissions(&wrapper, std::fs::Permissions::from_mode(0o755)).unwrap();

        let supervisor = OsSupervisor::new(&wrapper, fast_policy());
        let mut request = shell_request(&temp, "");
        request.program = wrapper.clone();
        request.args = vec!["/mnt/lan/share".into(), "-path".into(), "a".into()];
        let spawned = supervisor.spawn(&request).unwrap();

        assert!(
            wait_until(Duration::from_secs(5), || supervisor.list_actual().contains_key(&spawned.pid)),
            "wrapper pid {} not listed",
            spawned.pid
        );

        supervisor
            .terminate(spawned.pid, &BTreeSet::from([spawned.pid]))
            .unwrap();
        assert!(!supervisor.list_actual().contains_key(&spawned.pid));
    }

    #[test]
    fn list_actual_is_empty_for_unknown_binary() {
        let supervisor = OsSupervisor::new(Path::new("/nonexistent/unison-x"), fast_policy());
        assert!(supervisor.list_actual().is_empty());
    }
}
