#![cfg(test)]

use std::path::Path;
use std::sync::Arc;

use tempfile::tempdir;

use crate::api::{RepositoryRequest, UninstallRequest};
use crate::kernel::bootstrap::Application;
use crate::kernel::error::Result;
use crate::plugin_system::manager::{ListingStatus, PluginManager};
use crate::plugin_system::manifest::CapabilityKind;
use crate::storage::ManagerConfig;
use crate::tests::integration::common::{manifest, publish_fixture_repos, ScriptedVcs, REPO_B, REPO_C};

fn config_in(dir: &Path) -> ManagerConfig {
    ManagerConfig {
        data_dir: dir.to_path_buf(),
        ..ManagerConfig::default()
    }
}

async fn boot(dir: &Path, vcs: &Arc<ScriptedVcs>) -> Result<Application> {
    let mut app = Application::with_vcs(config_in(dir), vcs.clone())?;
    app.initialize().await?;
    Ok(app)
}

#[tokio::test]
async fn test_install_takes_effect_after_restart() -> Result<()> {
    let dir = tempdir().expect("Failed to create temp directory");
    let vcs = ScriptedVcs::new();
    publish_fixture_repos(&vcs);

    let mut first = boot(dir.path(), &vcs).await?;
    let response = first.api().install(&RepositoryRequest::new(REPO_B, "v1.0")).await?;
    assert!(response.ok);
    assert_eq!(response.restart_required, Some(true));

    // Installed but not loaded in this process
    let listing = first.plugin_manager().list().await?;
    assert_eq!(listing.installed.len(), 1);
    assert!(listing.loaded.is_empty());
    assert_eq!(listing.status_of("repo-b"), Some(ListingStatus::PendingRestart));
    first.shutdown().await?;

    let second = boot(dir.path(), &vcs).await?;
    let listing = second.plugin_manager().list().await?;
    assert_eq!(listing.status_of("repo-b"), Some(ListingStatus::Active));
    let loaded = second.loaded_registry();
    assert_eq!(loaded.get("repo-b").map(|p| p.version.as_str()), Some("abc123"));
    assert_eq!(loaded.capabilities(CapabilityKind::UiRoute).count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_uninstall_keeps_plugin_loaded_until_restart() -> Result<()> {
    let dir = tempdir().expect("Failed to create temp directory");
    let vcs = ScriptedVcs::new();
    publish_fixture_repos(&vcs);

    let first = boot(dir.path(), &vcs).await?;
    first.plugin_manager().install(REPO_B, "v1.0").await?;
    drop(first);

    let second = boot(dir.path(), &vcs).await?;
    let response = second
        .api()
        .uninstall(&UninstallRequest {
            distribution_name: "repo-b".to_string(),
        })
        .await?;
    assert!(response.ok);

    let listing = second.plugin_manager().list().await?;
    assert!(listing.installed.is_empty());
    assert_eq!(listing.status_of("repo-b"), Some(ListingStatus::PendingRemoval));

    let third = boot(dir.path(), &vcs).await?;
    assert!(third.loaded_registry().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_records_survive_restart_with_check_results() -> Result<()> {
    let dir = tempdir().expect("Failed to create temp directory");
    let vcs = ScriptedVcs::new();
    publish_fixture_repos(&vcs);
    vcs.publish(
        REPO_C,
        "main",
        "ccc111",
        &manifest("repo-c", &[("api", "repo_c.api:router"), ("tools", "repo_c.mcp:tools")]),
    );

    let first = boot(dir.path(), &vcs).await?;
    let manager = first.plugin_manager();
    manager.install(REPO_B, "v1.0").await?;
    manager.install(REPO_C, "main").await?;
    vcs.set_ref(REPO_C, "main", "ccc222");
    manager.check_updates().await?;
    let before = manager.list().await?.installed;
    drop(first);

    let second = boot(dir.path(), &vcs).await?;
    let after = second.plugin_manager().list().await?.installed;
    assert_eq!(after, before);
    assert_eq!(after[1].latest_commit.as_deref(), Some("ccc222"));
    assert!(after[1].update_available.is_available());

    let loaded = second.loaded_registry();
    assert_eq!(loaded.capabilities(CapabilityKind::ApiRoute).count(), 1);
    assert_eq!(loaded.capabilities(CapabilityKind::Tool).count(), 1);
    Ok(())
}
