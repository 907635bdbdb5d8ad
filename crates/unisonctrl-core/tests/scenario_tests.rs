//! End-to-end behaviour of the public API against a real directory tree

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use pretty_assertions::assert_eq;
use tempfile::TempDir;
use unisonctrl_core::{
    Action, Config, Error, InstanceController, InstanceRecord, InstanceStateStore, JsonFileStore,
    LockMode, OsSupervisor, ReconciliationLoop, RuleEngine, SortMethod, Supervisor, SyncRule,
    TerminationPolicy,
};

fn tree(dirs: &[&str]) -> TempDir {
    let temp = TempDir::new().unwrap();
    for dir in dirs {
        std::fs::create_dir_all(temp.path().join(dir)).unwrap();
    }
    temp
}

fn names(paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}

#[test]
fn batch_then_catchall() {
    let root = tree(&["10", "11", "12", "20"]);
    let rules = vec![
        SyncRule::new("batch1", "1*").with_count(2),
        SyncRule::new("catchall", "*"),
    ];

    let assignment = RuleEngine::new(&rules).partition(root.path()).unwrap();

    assert_eq!(names(&assignment["batch1"]), vec!["12", "11"]);
    assert_eq!(names(&assignment["catchall"]), vec!["20", "10"]);
}

#[test]
fn nested_selector_with_spaces() {
    let root = tree(&["Art Department/1100", "Art Department/1101", "Art Department/2200", "Misc"]);
    let rules = vec![
        SyncRule::new("art-11", "Art Department/11*").with_sort(SortMethod::NameLowFirst),
        SyncRule::new("rest", "*"),
    ];

    let assignment = RuleEngine::new(&rules).partition(root.path()).unwrap();

    assert_eq!(names(&assignment["art-11"]), vec!["1100", "1101"]);
    // The parent directory is a separate, unclaimed candidate for "*"
    assert_eq!(names(&assignment["rest"]), vec!["Misc", "Art Department"]);
}

#[test]
fn second_reconcile_yields_no_actions() {
    let root = tree(&["10", "11", "12", "20"]);
    let rules = vec![
        SyncRule::new("batch1", "1*").with_count(2),
        SyncRule::new("catchall", "*"),
    ];
    let options = vec!["-batch".to_string()];
    let controller = InstanceController::new(root.path(), &options);

    let desired = RuleEngine::new(&rules).partition(root.path()).unwrap();
    let first = controller.reconcile(&desired, &BTreeMap::new());
    assert_eq!(first.len(), 2);

    let current: BTreeMap<String, InstanceRecord> = first
        .into_iter()
        .enumerate()
        .map(|(i, action)| match action {
            Action::Create {
                syncname,
                dirs,
                fingerprint,
            } => (
                syncname.clone(),
                InstanceRecord {
                    syncname,
                    pid: 100 + i as u32,
                    config_fingerprint: fingerprint,
                    dirs_to_sync: dirs,
                    process_started_at: None,
                    spawned_at: chrono::Utc::now(),
                },
            ),
            other => panic!("unexpected {other:?}"),
        })
        .collect();

    let desired = RuleEngine::new(&rules).partition(root.path()).unwrap();
    assert!(controller.reconcile(&desired, &current).is_empty());
}

#[test]
fn terminate_refuses_unrecorded_pid() {
    let supervisor = OsSupervisor::new(Path::new("/usr/bin/unison"), TerminationPolicy::default());
    let err = supervisor
        .terminate(999, &BTreeSet::from([100, 200]))
        .unwrap_err();
    assert!(matches!(err, Error::Unauthorized { pid: 999 }));
}

#[test]
fn bogus_sort_method_discards_every_rule() {
    let root = tree(&["10", "11"]);
    let rules = vec![
        SyncRule::new("good", "1*"),
        SyncRule::new("bad", "*").with_sort(SortMethod::Unrecognized("bogus".into())),
    ];

    let err = RuleEngine::new(&rules).partition(root.path()).unwrap_err();
    assert!(matches!(
        err,
        Error::PartitioningAbort { ref syncname, ref sort_method }
            if syncname == "bad" && sort_method == "bogus"
    ));
}

#[test]
fn full_pass_with_real_processes() {
    let temp = tree(&["share/10", "share/11", "share/20"]);
    // Stand-in for unison: ignores its arguments, stays up until SIGTERM
    let fake = temp.path().join("fake-unison");
    std::fs::write(
        &fake,
        "#!/bin/sh\ntrap 'kill $! 2>/dev/null; exit 0' TERM\nsleep 30 &\nwait\n",
    )
    .unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&fake, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    let content = format!(
        r#"
unison_path = "{fake}"
unison_local_root = "{root}"
unison_remote_root = "/srv/remote"
unison_remote_ssh_conn = "sync-host"
unison_local_hostname = "nas01"
unison_home_dir = "{home}"
unison_user = "syncd"
data_dir = "{data}"
unison_log_dir = "{logs}"

[termination]
grace_period_ms = 1000
kill_period_ms = 2000
poll_interval_ms = 20

[[sync_hierarchy_rules]]
syncname = "ones"
dir_selector = "1*"

[[sync_hierarchy_rules]]
syncname = "rest"
dir_selector = "*"
"#,
        fake = fake.display(),
        root = temp.path().join("share").display(),
        home = temp.path().display(),
        data = temp.path().join("data").display(),
        logs = temp.path().join("logs").display(),
    );
    let config = Config::from_toml_str(&content, Path::new("scenario.toml")).unwrap();

    {
        let mut pass = ReconciliationLoop::open(&config, LockMode::NoWait).unwrap();
        let report = pass.run_pass().unwrap();
        assert_eq!(report.created, vec!["ones", "rest"]);
        assert_eq!(pass.store().list()["ones"].dirs_to_sync, vec!["11", "10"]);
    }

    let records = JsonFileStore::open(&config.running_data_dir(), false).unwrap();
    assert_eq!(records.list().len(), 2);
    assert!(config.unison_log_dir.join("ones.log").exists());

    {
        let mut pass = ReconciliationLoop::open(&config, LockMode::NoWait).unwrap();
        assert!(pass.status().iter().all(|status| status.running));

        let report = pass.run_pass().unwrap();
        assert_eq!(report.changes(), 0);
        assert!(report.healed.is_empty());
        assert_eq!(report.unchanged, vec!["ones", "rest"]);
    }

    {
        let mut pass = ReconciliationLoop::open(&config, LockMode::NoWait).unwrap();
        let report = pass.stop_all().unwrap();
        assert_eq!(report.killed, vec!["ones", "rest"]);
        assert!(report.is_clean());
    }

    let records = JsonFileStore::open(&config.running_data_dir(), false).unwrap();
    assert!(records.list().is_empty());
}
