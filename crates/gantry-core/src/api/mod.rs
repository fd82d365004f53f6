//! # Gantry Plugin API
//!
//! A transport-agnostic request/response surface over a [`PluginManager`].
//!
//! Validation, resolution and not-found failures come back in-band as
//! `ok: false` with user-facing `errors`. Only an unavailable install store
//! is returned as `Err`, since no answer about installed state can be given.
pub mod messages;

use std::fmt;
use std::sync::Arc;

use log::warn;

use crate::kernel::error::{Error, Result};
use crate::plugin_system::manager::{PluginListing, PluginManager, UpdateAllSummary};
use crate::plugin_system::update::UpdateReport;
use crate::plugin_system::validator::ValidationReport;

pub use messages::{
    InstallResponse, RepositoryRequest, Request, Response, UninstallRequest, UninstallResponse,
    UpdateRequest, UpdateResponse,
};

#[derive(Clone)]
pub struct PluginApi {
    manager: Arc<dyn PluginManager>,
}

impl PluginApi {
    pub fn new(manager: Arc<dyn PluginManager>) -> Self {
        Self { manager }
    }

    pub async fn list(&self) -> Result<PluginListing> {
        self.manager.list().await
    }

    /// Never fails: every problem, the store included, is reported in the report.
    pub async fn validate(&self, request: &RepositoryRequest) -> ValidationReport {
        match self.manager.validate(&request.repository_url, &request.git_ref).await {
            Ok(report) => report,
            Err(e) => {
                warn!("Validation of {}@{} failed: {}", request.repository_url, request.git_ref, e);
                ValidationReport::failed(e.user_messages())
            }
        }
    }

    pub async fn install(&self, request: &RepositoryRequest) -> Result<InstallResponse> {
        match self.manager.install(&request.repository_url, &request.git_ref).await {
            Ok(outcome) => Ok(outcome.into()),
            Err(e) => in_band(e).map(InstallResponse::failed),
        }
    }

    pub async fn uninstall(&self, request: &UninstallRequest) -> Result<UninstallResponse> {
        match self.manager.uninstall(&request.distribution_name).await {
            Ok(outcome) => Ok(outcome.into()),
            Err(e) => in_band(e).map(UninstallResponse::failed),
        }
    }

    pub async fn check_updates(&self) -> Result<UpdateReport> {
        self.manager.check_updates().await
    }

    pub async fn update(&self, request: &UpdateRequest) -> Result<UpdateResponse> {
        match self
            .manager
            .update(&request.distribution_name, request.git_ref.as_deref())
            .await
        {
            Ok(outcome) => Ok(outcome.into()),
            Err(e) => in_band(e).map(UpdateResponse::failed),
        }
    }

    pub async fn update_all(&self) -> Result<UpdateAllSummary> {
        self.manager.update_all().await
    }

    /// Dispatch a tagged request.
    pub async fn handle(&self, request: Request) -> Result<Response> {
        Ok(match request {
            Request::List => Response::List(self.list().await?),
            Request::Validate(r) => Response::Validate(self.validate(&r).await),
            Request::Install(r) => Response::Install(self.install(&r).await?),
            Request::Uninstall(r) => Response::Uninstall(self.uninstall(&r).await?),
            Request::CheckUpdates => Response::CheckUpdates(self.check_updates().await?),
            Request::Update(r) => Response::Update(self.update(&r).await?),
            Request::UpdateAll => Response::UpdateAll(self.update_all().await?),
        })
    }
}

impl fmt::Debug for PluginApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginApi")
            .field("manager", &self.manager.name())
            .finish()
    }
}

/// Errors a caller gets as `errors`, or the error itself if the store is down.
fn in_band(error: Error) -> Result<Vec<String>> {
    if error.is_store_unavailable() {
        Err(error)
    } else {
        Ok(error.user_messages())
    }
}

#[cfg(test)]
mod tests;
