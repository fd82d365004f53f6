#![cfg(test)]

use std::time::Duration;

use crate::kernel::error::{Error, ErrorKind, Result};
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::manager::PluginManager;
use crate::plugin_system::record::{PluginState, UpdateAvailability};
use crate::plugin_system::validator::NO_RECOGNIZED_ENTRY_POINT;
use crate::storage::InstallStore;
use crate::tests::integration::common::{
    manifest, publish_fixture_repos, setup, ui_manifest, REPO_A, REPO_B, REPO_C,
};

#[tokio::test]
async fn test_repo_without_recognized_entry_point_is_rejected() -> Result<()> {
    let (vcs, store, manager) = setup();
    publish_fixture_repos(&vcs);

    let report = manager.validate(REPO_A, "main").await?;
    assert!(!report.ok);
    assert_eq!(report.errors, vec![NO_RECOGNIZED_ENTRY_POINT.to_string()]);
    assert_eq!(report.distribution_name.as_deref(), Some("repo-a"));

    let err = manager.install(REPO_A, "main").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    assert_eq!(err.user_messages(), vec![NO_RECOGNIZED_ENTRY_POINT.to_string()]);
    assert!(store.list()?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_validate_is_idempotent_and_side_effect_free() -> Result<()> {
    let (vcs, store, manager) = setup();
    publish_fixture_repos(&vcs);

    let first = manager.validate(REPO_B, "v1.0").await?;
    let second = manager.validate(REPO_B, "v1.0").await?;
    assert!(first.ok);
    assert_eq!(first, second);
    assert_eq!(first.resolved_commit.as_deref(), Some("abc123"));
    assert!(store.list()?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_install_then_immediate_check_reports_no_update() -> Result<()> {
    let (vcs, _store, manager) = setup();
    publish_fixture_repos(&vcs);

    let outcome = manager.install(REPO_B, "v1.0").await?;
    assert_eq!(outcome.record.distribution_name, "repo-b");
    assert_eq!(outcome.record.resolved_commit, "abc123");
    assert_eq!(outcome.record.update_available, UpdateAvailability::Unknown);
    assert!(outcome.restart_required);

    let report = manager.check_updates().await?;
    let info = report.get("repo-b").expect("repo-b checked");
    assert!(info.error.is_none());
    assert!(!info.update_available);
    assert_eq!(info.latest_commit.as_deref(), Some("abc123"));

    assert_eq!(
        manager.state_of("repo-b").await?,
        PluginState::Installed(UpdateAvailability::UpToDate)
    );
    Ok(())
}

#[tokio::test]
async fn test_install_over_existing_keeps_one_record_with_second_resolution() -> Result<()> {
    let (vcs, store, manager) = setup();
    publish_fixture_repos(&vcs);
    vcs.publish(REPO_B, "v2.0", "def456", &ui_manifest("repo-b"));

    manager.install(REPO_B, "v1.0").await?;
    let second = manager.install(REPO_B, "v2.0").await?;
    assert!(second.warnings.iter().any(|w| w.contains("already installed")));

    let records = store.list()?;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].git_ref, "v2.0");
    assert_eq!(records[0].resolved_commit, "def456");
    Ok(())
}

#[tokio::test]
async fn test_install_same_name_from_different_repository_overwrites_with_warning() -> Result<()> {
    let (vcs, store, manager) = setup();
    publish_fixture_repos(&vcs);
    vcs.publish(REPO_C, "main", "ccc111", &ui_manifest("repo-b"));

    manager.install(REPO_B, "v1.0").await?;
    let outcome = manager.install(REPO_C, "main").await?;
    assert!(outcome.warnings.iter().any(|w| w.contains("different repository")));

    let records = store.list()?;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].repository_url, REPO_C);
    Ok(())
}

#[tokio::test]
async fn test_spelling_variant_of_installed_name_is_rejected() -> Result<()> {
    let (vcs, store, manager) = setup();
    publish_fixture_repos(&vcs);
    vcs.publish(REPO_C, "main", "ccc111", &ui_manifest("Repo_B"));

    manager.install(REPO_B, "v1.0").await?;
    let report = manager.validate(REPO_C, "main").await?;
    assert!(!report.ok);
    assert!(report
        .errors
        .iter()
        .any(|e| e.contains("conflicts with installed plugin 'repo-b'")));
    assert_eq!(store.list()?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_uninstall_then_list_excludes_name() -> Result<()> {
    let (vcs, _store, manager) = setup();
    publish_fixture_repos(&vcs);

    manager.install(REPO_B, "v1.0").await?;
    let outcome = manager.uninstall("repo-b").await?;
    assert!(outcome.restart_required);

    let listing = manager.list().await?;
    assert!(listing.installed.iter().all(|r| r.distribution_name != "repo-b"));
    assert_eq!(manager.state_of("repo-b").await?, PluginState::Absent);

    let err = manager.uninstall("repo-b").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.user_messages(), vec!["not found".to_string()]);
    Ok(())
}

#[tokio::test]
async fn test_update_check_isolates_unreachable_repository() -> Result<()> {
    let (vcs, store, manager) = setup();
    publish_fixture_repos(&vcs);
    vcs.publish(REPO_C, "main", "ccc111", &ui_manifest("repo-c"));

    manager.install(REPO_C, "main").await?;
    manager.install(REPO_B, "v1.0").await?;
    vcs.set_unreachable(REPO_C, true);

    let report = manager.check_updates().await?;
    assert_eq!(report.plugins.len(), 2);
    // Store order is preserved
    assert_eq!(report.plugins[0].distribution_name, "repo-c");
    assert!(report.plugins[0].error.is_some());
    assert_eq!(report.plugins[0].availability(), UpdateAvailability::Unknown);
    assert!(report.plugins[1].error.is_none());
    assert!(!report.plugins[1].update_available);

    // A failed check leaves the persisted record alone
    let repo_c = store.get("repo-c")?.expect("repo-c installed");
    assert_eq!(repo_c.update_available, UpdateAvailability::Unknown);
    assert!(repo_c.latest_commit.is_none());
    let repo_b = store.get("repo-b")?.expect("repo-b installed");
    assert_eq!(repo_b.update_available, UpdateAvailability::UpToDate);
    Ok(())
}

#[tokio::test]
async fn test_resolution_failure_during_update_leaves_store_untouched() -> Result<()> {
    let (vcs, store, manager) = setup();
    publish_fixture_repos(&vcs);

    manager.install(REPO_B, "v1.0").await?;
    let before = store.list()?;

    vcs.set_unreachable(REPO_B, true);
    let err = manager.update("repo-b", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Resolution);
    assert!(err.kind().is_retryable());
    assert!(err.user_messages()[0].contains("unreachable"));
    assert_eq!(store.list()?, before);

    let err = manager.install(REPO_B, "v1.0").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Resolution);
    assert_eq!(store.list()?, before);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_timeout_is_reported_and_never_read_as_no_update() -> Result<()> {
    let (vcs, store, manager) = setup();
    publish_fixture_repos(&vcs);

    manager.install(REPO_B, "v1.0").await?;
    let before = store.list()?;
    vcs.set_delay(REPO_B, Duration::from_secs(30));

    let report = manager.check_updates().await?;
    let info = report.get("repo-b").expect("repo-b checked");
    assert!(info.error.as_deref().unwrap_or_default().contains("timed out"));
    assert_eq!(info.availability(), UpdateAvailability::Unknown);
    assert_eq!(store.list()?, before);

    let err = manager.update("repo-b", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert!(err.kind().is_resolution());
    assert!(err.user_messages()[0].contains("timed out"));
    assert_eq!(store.list()?, before);
    Ok(())
}

#[tokio::test]
async fn test_update_all_updates_only_plugins_with_updates() -> Result<()> {
    let (vcs, store, manager) = setup();
    publish_fixture_repos(&vcs);
    vcs.publish(REPO_C, "main", "ccc111", &ui_manifest("repo-c"));

    manager.install(REPO_B, "v1.0").await?;
    manager.install(REPO_C, "main").await?;
    vcs.publish(REPO_C, "main", "ccc222", &ui_manifest("repo-c"));

    let report = manager.check_updates().await?;
    assert!(!report.get("repo-b").expect("repo-b").update_available);
    assert!(report.get("repo-c").expect("repo-c").update_available);

    let summary = manager.update_all().await?;
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.failed, 0);
    assert!(summary.restart_required);
    assert_eq!(summary.updated_plugins, vec!["repo-c".to_string()]);

    let repo_c = store.get("repo-c")?.expect("repo-c installed");
    assert_eq!(repo_c.resolved_commit, "ccc222");
    assert_eq!(repo_c.update_available, UpdateAvailability::Unknown);
    let repo_b = store.get("repo-b")?.expect("repo-b installed");
    assert_eq!(repo_b.resolved_commit, "abc123");
    Ok(())
}

#[tokio::test]
async fn test_update_all_with_nothing_to_do() -> Result<()> {
    let (vcs, _store, manager) = setup();
    publish_fixture_repos(&vcs);
    manager.install(REPO_B, "v1.0").await?;

    // Never checked: updateAvailable is unknown, so nothing is a candidate
    let summary = manager.update_all().await?;
    assert_eq!(summary.updated, 0);
    assert_eq!(summary.failed, 0);
    assert!(!summary.restart_required);
    Ok(())
}

#[tokio::test]
async fn test_update_all_aggregates_failures_per_plugin() -> Result<()> {
    let (vcs, store, manager) = setup();
    publish_fixture_repos(&vcs);
    vcs.publish(REPO_C, "main", "ccc111", &ui_manifest("repo-c"));

    manager.install(REPO_B, "v1.0").await?;
    manager.install(REPO_C, "main").await?;
    vcs.publish(REPO_B, "v1.0", "abc999", &ui_manifest("repo-b"));
    // The new repo-c head no longer declares anything usable
    vcs.publish(REPO_C, "main", "ccc222", &manifest("repo-c", &[]));
    manager.check_updates().await?;

    let summary = manager.update_all().await?;
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.failed, 1);
    assert!(summary.restart_required);
    assert_eq!(summary.failures[0].distribution_name, "repo-c");
    assert_eq!(summary.failures[0].errors, vec![NO_RECOGNIZED_ENTRY_POINT.to_string()]);
    assert_eq!(store.get("repo-c")?.expect("repo-c").resolved_commit, "ccc111");
    assert_eq!(store.get("repo-b")?.expect("repo-b").resolved_commit, "abc999");
    Ok(())
}

#[tokio::test]
async fn test_update_to_new_ref() -> Result<()> {
    let (vcs, store, manager) = setup();
    publish_fixture_repos(&vcs);
    vcs.publish(REPO_B, "v2.0", "def456", &ui_manifest("repo-b"));

    manager.install(REPO_B, "v1.0").await?;
    let outcome = manager.update("repo-b", Some("v2.0")).await?;
    assert_eq!(outcome.previous_commit, "abc123");
    assert_eq!(outcome.record.git_ref, "v2.0");
    assert_eq!(outcome.record.resolved_commit, "def456");
    assert!(outcome.restart_required);
    assert_eq!(store.get("repo-b")?, Some(outcome.record));
    Ok(())
}

#[tokio::test]
async fn test_update_rejects_renamed_distribution() -> Result<()> {
    let (vcs, store, manager) = setup();
    publish_fixture_repos(&vcs);
    manager.install(REPO_B, "v1.0").await?;
    vcs.publish(REPO_B, "v1.0", "abc999", &ui_manifest("repo-b-renamed"));

    let err = manager.update("repo-b", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    assert!(matches!(
        err,
        Error::PluginSystem(PluginSystemError::IdentityMismatch { ref expected, ref found })
            if expected == "repo-b" && found == "repo-b-renamed"
    ));
    assert_eq!(
        err.user_messages(),
        vec!["repository now declares distribution name 'repo-b-renamed', expected 'repo-b'".to_string()]
    );
    assert_eq!(store.get("repo-b")?.expect("repo-b").resolved_commit, "abc123");
    Ok(())
}

#[tokio::test]
async fn test_blank_commit_never_reaches_the_store() -> Result<()> {
    let (vcs, store, manager) = setup();
    vcs.publish(REPO_B, "main", "", &ui_manifest("repo-b"));

    let err = manager.install(REPO_B, "main").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Resolution);
    assert!(store.list()?.is_empty());
    assert_eq!(vcs.fetch_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn test_update_of_unknown_plugin_is_not_found() {
    let (_vcs, _store, manager) = setup();
    let err = manager.update("missing", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_store_unavailable_is_a_hard_failure() -> Result<()> {
    let (vcs, store, manager) = setup();
    publish_fixture_repos(&vcs);
    manager.install(REPO_B, "v1.0").await?;
    store.set_available(false);

    let expect_unavailable = |result: Result<()>| {
        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
    };
    expect_unavailable(manager.list().await.map(|_| ()));
    expect_unavailable(manager.validate(REPO_B, "v1.0").await.map(|_| ()));
    expect_unavailable(manager.install(REPO_B, "v1.0").await.map(|_| ()));
    expect_unavailable(manager.uninstall("repo-b").await.map(|_| ()));
    expect_unavailable(manager.check_updates().await.map(|_| ()));
    expect_unavailable(manager.update("repo-b", None).await.map(|_| ()));
    expect_unavailable(manager.update_all().await.map(|_| ()));

    store.set_available(true);
    assert_eq!(store.list()?.len(), 1);
    Ok(())
}
