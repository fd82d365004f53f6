#![cfg(test)]

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tempfile::tempdir;

use crate::kernel::error::{ErrorKind, Result};
use crate::plugin_system::manager::PluginManager;
use crate::plugin_system::record::UpdateAvailability;
use crate::storage::{FileInstallStore, InstallStore};
use crate::tests::integration::common::{manager_with, publish_fixture_repos, setup, ui_manifest, ScriptedVcs, REPO_B, REPO_C};

fn plugin_repo(i: usize) -> String {
    format!("https://git.example.com/acme/plugin-{}.git", i)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_distinct_installs_all_persist() -> Result<()> {
    let dir = tempdir().expect("Failed to create temp directory");
    let vcs = ScriptedVcs::new();
    let store: Arc<dyn InstallStore> = Arc::new(FileInstallStore::open(dir.path())?);
    let manager = manager_with(&vcs, store.clone());

    const N: usize = 12;
    for i in 0..N {
        vcs.publish(&plugin_repo(i), "main", &format!("{:040x}", i + 1), &ui_manifest(&format!("plugin-{}", i)));
    }

    let installs = (0..N).map(|i| {
        let manager = manager.clone();
        async move { manager.install(&plugin_repo(i), "main").await }
    });
    for outcome in join_all(installs).await {
        outcome?;
    }

    let records = store.list()?;
    assert_eq!(records.len(), N);
    for i in 0..N {
        let record = store.get(&format!("plugin-{}", i))?.expect("record persisted");
        assert_eq!(record.repository_url, plugin_repo(i));
    }

    // The document on disk agrees after a reopen
    let reopened = FileInstallStore::open(dir.path())?;
    assert_eq!(reopened.list()?.len(), N);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_updates_of_one_name_leave_a_coherent_record() -> Result<()> {
    let (vcs, store, manager) = setup();
    publish_fixture_repos(&vcs);
    vcs.publish(REPO_B, "v2.0", "def456", &ui_manifest("repo-b"));
    vcs.publish(REPO_B, "v3.0", "fed789", &ui_manifest("repo-b"));
    manager.install(REPO_B, "v1.0").await?;

    let (first, second) = tokio::join!(
        manager.update("repo-b", Some("v2.0")),
        manager.update("repo-b", Some("v3.0"))
    );
    let first = first?;
    let second = second?;

    // Serialized: whichever ran second started from the first's result
    assert!(
        second.previous_commit == first.record.resolved_commit
            || first.previous_commit == second.record.resolved_commit
    );

    let records = store.list()?;
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert!(matches!(
        (record.git_ref.as_str(), record.resolved_commit.as_str()),
        ("v2.0", "def456") | ("v3.0", "fed789")
    ));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_check_result_is_dropped_when_record_changes_mid_check() -> Result<()> {
    let (vcs, store, manager) = setup();
    publish_fixture_repos(&vcs);
    manager.install(REPO_B, "v1.0").await?;

    // The tag moves and resolution becomes slow
    vcs.publish(REPO_B, "v1.0", "abc999", &ui_manifest("repo-b"));
    vcs.set_delay(REPO_B, Duration::from_secs(2));

    let check = tokio::spawn({
        let manager = manager.clone();
        async move { manager.check_updates().await }
    });

    // A concurrent writer moves the record while the check is in flight
    tokio::time::sleep(Duration::from_secs(1)).await;
    let current = store.get("repo-b")?.expect("repo-b installed");
    let moved = current.updated_to("v1.0", "abc999", current.entry_points.clone());
    store.put(moved.clone())?;

    let report = check.await.expect("check task")?;
    assert!(report.get("repo-b").expect("repo-b checked").update_available);

    // The stale "update available" never lands on the newer record
    let persisted = store.get("repo-b")?.expect("repo-b installed");
    assert_eq!(persisted.resolved_commit, "abc999");
    assert_eq!(persisted.update_available, UpdateAvailability::Unknown);
    assert_eq!(persisted, moved);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_update_checks_run_concurrently() -> Result<()> {
    let (vcs, _store, manager) = setup();
    for i in 0..4 {
        vcs.publish(&plugin_repo(i), "main", &format!("c{}", i), &ui_manifest(&format!("plugin-{}", i)));
        manager.install(&plugin_repo(i), "main").await?;
        vcs.set_delay(&plugin_repo(i), Duration::from_secs(3));
    }

    let started = tokio::time::Instant::now();
    let report = manager.check_updates().await?;
    assert_eq!(report.error_count(), 0);
    // Four 3s checks under a concurrency limit of 4 finish together
    assert!(started.elapsed() < Duration::from_secs(5));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_spelling_variants_install_only_one() -> Result<()> {
    for _ in 0..20 {
        let (vcs, store, manager) = setup();
        vcs.publish(REPO_B, "main", "abc123", &ui_manifest("repo-b"));
        vcs.publish(REPO_C, "main", "ccc111", &ui_manifest("Repo_B"));

        let first = tokio::spawn({
            let manager = manager.clone();
            async move { manager.install(REPO_B, "main").await }
        });
        let second = tokio::spawn({
            let manager = manager.clone();
            async move { manager.install(REPO_C, "main").await }
        });
        let outcomes = [
            first.await.expect("install task panicked"),
            second.await.expect("install task panicked"),
        ];

        assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 1);
        let err = outcomes.into_iter().find_map(|o| o.err()).expect("one install rejected");
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);
        assert!(err.user_messages()[0].contains("conflicts with installed plugin"));
        assert_eq!(store.list()?.len(), 1);
    }
    Ok(())
}
