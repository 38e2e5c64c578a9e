//! Versioned generation lifecycle.
//!
//! A version moves through [`LifecyclePhase`]s:
//!
//! ```text
//! Uninstalled -> Installing -> InstalledWaiting -> Active
//! ```
//!
//! Installing pre-seeds the static generation of the new version with every
//! essential asset. It is all-or-nothing: if any asset cannot be retrieved
//! with a 2xx response, nothing is written and the active version keeps
//! serving. Activation promotes the waiting version and deletes every
//! generation that is not current for it.
//!
//! Transitions hold the write half of a [`RwLock`]; requests hold the read
//! half through a [`ServingGuard`] so no request sees a half-switched set of
//! generations.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use offbox_backend::{ArtifactStore, DeleteStatus, StoreError};
use offbox_core::{Category, Fetch, InterceptedRequest, RequestIdentity, ResponseSnapshot};
use serde::Serialize;
use smol_str::SmolStr;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

use crate::error::{AssetFailure, InstallError};
use crate::{Error, OfflineConfig, metrics};

/// Phase of the newest known version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LifecyclePhase {
    /// Nothing installed yet.
    #[default]
    Uninstalled,
    /// A version is pre-seeding its essential assets.
    Installing,
    /// A version is installed and waits for activation.
    InstalledWaiting,
    /// The newest version serves requests.
    Active,
}

/// Result of a successful install.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Installed {
    /// The version waits for activation.
    Waiting,
    /// Force-activation was requested while installing; the version is active.
    Activated,
}

/// Result of an activation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Activation {
    /// Version now active, if any.
    pub version: Option<SmolStr>,
    /// Generations deleted as stale.
    pub deleted: Vec<String>,
}

/// Result of a force-activation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForceActivation {
    /// A waiting version was activated.
    Activated(Activation),
    /// An install is running and will activate when it finishes.
    Scheduled,
    /// Nothing is waiting or installing.
    NothingToActivate,
}

/// Result of a periodic cleanup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cleanup {
    /// Entries deleted because they were too old.
    pub expired: usize,
    /// Entries deleted because the generation was over its entry limit.
    pub trimmed: usize,
}

/// Entry count of one generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationStatus {
    /// Generation name.
    pub name: String,
    /// Number of stored entries.
    pub entries: usize,
    /// Whether the generation is current for the active version.
    pub current: bool,
}

#[derive(Debug, Default)]
struct LifecycleState {
    phase: LifecyclePhase,
    active: Option<Arc<OfflineConfig>>,
    waiting: Option<Arc<OfflineConfig>>,
    installing: Option<SmolStr>,
    activate_when_installed: bool,
}

/// Read access to the active version for the duration of a request.
#[derive(Debug)]
pub struct ServingGuard<'a> {
    state: RwLockReadGuard<'a, LifecycleState>,
}

impl ServingGuard<'_> {
    /// Configuration of the active version.
    pub fn config(&self) -> Option<&Arc<OfflineConfig>> {
        self.state.active.as_ref()
    }
}

/// Installs, activates and clears versions.
///
/// Clones share the same state.
#[derive(Debug, Clone)]
pub struct LifecycleManager<S, F> {
    store: S,
    fetch: F,
    state: Arc<RwLock<LifecycleState>>,
}

impl<S, F> LifecycleManager<S, F>
where
    S: ArtifactStore,
    F: Fetch,
{
    /// Creates a manager with nothing installed.
    pub fn new(store: S, fetch: F) -> Self {
        Self {
            store,
            fetch,
            state: Arc::default(),
        }
    }

    /// Current phase.
    pub async fn phase(&self) -> LifecyclePhase {
        self.state.read().await.phase
    }

    /// Active configuration.
    pub async fn active(&self) -> Option<Arc<OfflineConfig>> {
        self.state.read().await.active.clone()
    }

    /// Waiting configuration.
    pub async fn waiting(&self) -> Option<Arc<OfflineConfig>> {
        self.state.read().await.waiting.clone()
    }

    /// Holds off transitions while a request is served.
    pub async fn serving(&self) -> ServingGuard<'_> {
        ServingGuard {
            state: self.state.read().await,
        }
    }

    /// Installs a version.
    ///
    /// Every essential asset is fetched first; only when all of them came
    /// back 2xx is the static generation of the version opened and filled.
    /// On error nothing is written or deleted and the phase returns to what
    /// it was.
    pub async fn install(&self, config: OfflineConfig) -> Result<Installed, Error> {
        let config = Arc::new(config);
        let version = config.version.clone();
        let previous_phase = {
            let mut state = self.state.write().await;
            let previous = state.phase;
            state.phase = LifecyclePhase::Installing;
            state.installing = Some(version.clone());
            previous
        };
        info!(%version, "Installing version");

        match self.seed(&config).await {
            Ok(()) => {
                let mut state = self.state.write().await;
                state.installing = None;
                state.waiting = Some(Arc::clone(&config));
                state.phase = LifecyclePhase::InstalledWaiting;
                info!(%version, "Version installed");
                if std::mem::take(&mut state.activate_when_installed) {
                    self.activate_locked(&mut state).await?;
                    Ok(Installed::Activated)
                } else {
                    Ok(Installed::Waiting)
                }
            }
            Err(error) => {
                let mut state = self.state.write().await;
                state.installing = None;
                state.activate_when_installed = false;
                state.phase = previous_phase;
                warn!(%version, %error, "Install failed, keeping previous version");
                Err(error.into())
            }
        }
    }

    async fn seed(&self, config: &OfflineConfig) -> Result<(), InstallError> {
        let version = config.version.clone();
        let mut requests = Vec::with_capacity(config.essential_assets.len());
        for path in &config.essential_assets {
            let uri = config
                .asset_uri(path)
                .map_err(|source| InstallError::Config {
                    version: version.clone(),
                    source,
                })?;
            requests.push((path.clone(), InterceptedRequest::get(uri)));
        }

        let responses = join_all(
            requests
                .iter()
                .map(|(_, request)| self.fetch.fetch(request)),
        )
        .await;

        let mut failures = Vec::new();
        let mut seeded: Vec<(RequestIdentity, ResponseSnapshot)> = Vec::new();
        for ((path, request), response) in requests.iter().zip(responses) {
            match response {
                Ok(snapshot) if snapshot.is_storable() => {
                    seeded.push((request.identity(&config.vary_headers), snapshot));
                }
                Ok(snapshot) => failures.push(AssetFailure::Status {
                    path: path.clone(),
                    status: snapshot.status(),
                }),
                Err(source) => failures.push(AssetFailure::Fetch {
                    path: path.clone(),
                    source,
                }),
            }
        }
        if !failures.is_empty() {
            return Err(InstallError::AssetsUnavailable { version, failures });
        }

        let name = config.generation_name(Category::Static);
        let existed = self
            .store
            .list_generations()
            .await
            .map_err(|source| InstallError::Store {
                version: version.clone(),
                source,
            })?
            .iter()
            .any(|existing| existing.as_str() == name.as_str());
        if let Err(source) = self.write_all(&name, seeded).await {
            if !existed && let Err(error) = self.store.delete_generation(&name).await {
                warn!(generation = %name, %error, "Could not remove partially seeded generation");
            }
            return Err(InstallError::Store { version, source });
        }
        debug!(generation = %name, assets = config.essential_assets.len(), "Essential assets seeded");
        Ok(())
    }

    async fn write_all(
        &self,
        name: &str,
        entries: Vec<(RequestIdentity, ResponseSnapshot)>,
    ) -> Result<(), StoreError> {
        let generation = self.store.open(name).await?;
        for (identity, snapshot) in entries {
            self.store.put(&generation, identity, snapshot).await?;
        }
        Ok(())
    }

    /// Promotes the waiting version and deletes stale generations.
    ///
    /// Without a waiting version this only deletes generations that are not
    /// current for the active version.
    pub async fn activate(&self) -> Result<Activation, Error> {
        let mut state = self.state.write().await;
        self.activate_locked(&mut state).await
    }

    async fn activate_locked(
        &self,
        state: &mut RwLockWriteGuard<'_, LifecycleState>,
    ) -> Result<Activation, Error> {
        if let Some(waiting) = state.waiting.take() {
            state.active = Some(waiting);
            state.phase = LifecyclePhase::Active;
        }
        let Some(active) = state.active.clone() else {
            debug!("Nothing to activate");
            return Ok(Activation::default());
        };

        let current: Vec<SmolStr> = active
            .generation_names()
            .into_iter()
            .map(|(_, name)| name)
            .collect();
        let mut deleted = Vec::new();
        for name in self.store.list_generations().await? {
            if current.iter().any(|keep| keep.as_str() == name) {
                continue;
            }
            if let DeleteStatus::Deleted(_) = self.store.delete_generation(&name).await? {
                deleted.push(name);
            }
        }
        metrics::record_generations_deleted(deleted.len());
        info!(version = %active.version, deleted = ?deleted, "Version activated");
        Ok(Activation {
            version: Some(active.version.clone()),
            deleted,
        })
    }

    /// Activates a waiting version now, or as soon as a running install
    /// finishes.
    pub async fn force_activate(&self) -> Result<ForceActivation, Error> {
        let mut state = self.state.write().await;
        if state.waiting.is_some() {
            return Ok(ForceActivation::Activated(
                self.activate_locked(&mut state).await?,
            ));
        }
        if state.installing.is_some() {
            state.activate_when_installed = true;
            debug!(version = ?state.installing, "Activation scheduled after install");
            return Ok(ForceActivation::Scheduled);
        }
        Ok(ForceActivation::NothingToActivate)
    }

    /// Deletes the named generations, or every current generation of the
    /// active version when `names` is empty. The phase is unchanged.
    pub async fn clear(&self, names: &[String]) -> Result<Vec<String>, Error> {
        let state = self.state.write().await;
        let targets: Vec<String> = if names.is_empty() {
            state
                .active
                .iter()
                .flat_map(|config| config.generation_names())
                .map(|(_, name)| name.to_string())
                .collect()
        } else {
            names.to_vec()
        };
        let mut deleted = Vec::new();
        for name in targets {
            if let DeleteStatus::Deleted(_) = self.store.delete_generation(&name).await? {
                deleted.push(name);
            }
        }
        metrics::record_generations_deleted(deleted.len());
        info!(deleted = ?deleted, "Generations cleared");
        Ok(deleted)
    }

    /// Deletes old and excess entries from the non-static current
    /// generations of the active version.
    pub async fn cleanup(&self) -> Result<Cleanup, Error> {
        let serving = self.serving().await;
        let Some(config) = serving.config() else {
            return Ok(Cleanup::default());
        };
        let policy = config.cleanup;
        let now = Utc::now();
        let mut report = Cleanup::default();
        let names: Vec<String> = self.store.list_generations().await?;

        for category in [Category::Pages, Category::Api, Category::Media] {
            let name = config.generation_name(category);
            if !names.iter().any(|existing| existing.as_str() == name.as_str()) {
                continue;
            }
            let generation = self.store.open(&name).await?;
            let mut entries = Vec::new();
            for identity in self.store.list_keys(&generation).await? {
                if let Some(snapshot) = self.store.get(&generation, &identity).await? {
                    entries.push((snapshot.fetched_at(), identity));
                }
            }

            if let Some(max_age) = policy.max_age {
                let max_age = chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX);
                let (expired, fresh): (Vec<_>, Vec<_>) = entries
                    .into_iter()
                    .partition(|(fetched_at, _)| now - *fetched_at > max_age);
                for (_, identity) in expired {
                    self.store.delete_entry(&generation, &identity).await?;
                    report.expired += 1;
                }
                entries = fresh;
            }

            if let Some(max_entries) = policy.max_entries
                && entries.len() > max_entries
            {
                entries.sort_by_key(|(fetched_at, _)| *fetched_at);
                let excess = entries.len() - max_entries;
                for (_, identity) in entries.into_iter().take(excess) {
                    self.store.delete_entry(&generation, &identity).await?;
                    report.trimmed += 1;
                }
            }
        }
        info!(expired = report.expired, trimmed = report.trimmed, "Cleanup finished");
        Ok(report)
    }

    /// Entry counts of every existing generation.
    pub async fn generations(&self) -> Result<Vec<GenerationStatus>, Error> {
        let current: Vec<SmolStr> = self
            .active()
            .await
            .map(|config| {
                config
                    .generation_names()
                    .into_iter()
                    .map(|(_, name)| name)
                    .collect()
            })
            .unwrap_or_default();
        let mut statuses = Vec::new();
        for name in self.store.list_generations().await? {
            let generation = self.store.open(&name).await?;
            let entries = self.store.list_keys(&generation).await?.len();
            statuses.push(GenerationStatus {
                current: current.iter().any(|keep| keep.as_str() == name),
                name,
                entries,
            });
        }
        Ok(statuses)
    }
}
