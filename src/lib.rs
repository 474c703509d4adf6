pub mod auth;
pub mod cli;
pub mod collections;
pub mod config;
pub mod http;
pub mod router;
pub mod storage;
pub mod workspace;

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::auth::{HttpIdentityService, IdentityService, MockIdentityService, SessionManager};
use crate::collections::{
    CollectionRegistry, DataSource, HttpDataSource, ListingController, ListingError,
    RegistryDataSource,
};
use crate::config::Config;
use crate::http::ApiClient;
use crate::router::{NavigationGuard, Router};
use crate::storage::{FileSessionStore, SessionStore};
use crate::workspace::{Workspace, WorkspaceRegistry};

/// Every service the admin client needs, wired once from [`Config`].
pub struct AppContext {
    pub config: Config,
    pub store: Arc<dyn SessionStore>,
    pub session: Arc<SessionManager>,
    pub guard: NavigationGuard,
    pub collections: Arc<CollectionRegistry>,
    pub listing: ListingController,
    pub workspaces: WorkspaceRegistry,
}

impl AppContext {
    /// File-backed session store in `storage.data_dir`. Mock mode uses the
    /// built-in identity service and generated entries, otherwise both go
    /// to `api.base_url`.
    pub fn new(config: Config) -> Result<Self> {
        config.validate().context("Invalid configuration")?;
        let store: Arc<dyn SessionStore> =
            Arc::new(FileSessionStore::new(config.storage.data_dir.clone()));
        let collections = Arc::new(CollectionRegistry::with_defaults());

        let (identity, source): (Arc<dyn IdentityService>, Arc<dyn DataSource>) =
            if config.auth.mock_mode {
                info!("Mock mode: using built-in identity service and generated entries");
                (
                    Arc::new(MockIdentityService::new()),
                    Arc::new(RegistryDataSource::new(collections.clone())),
                )
            } else {
                let api = ApiClient::from_config(&config, store.clone())
                    .context("Failed to create API client")?;
                info!(base_url = %api.base_url(), "Using remote admin backend");
                (
                    Arc::new(HttpIdentityService::new(api.clone())),
                    Arc::new(HttpDataSource::new(api)),
                )
            };

        Ok(Self::with_services(config, store, identity, source, collections))
    }

    pub fn with_services(
        config: Config,
        store: Arc<dyn SessionStore>,
        identity: Arc<dyn IdentityService>,
        source: Arc<dyn DataSource>,
        collections: Arc<CollectionRegistry>,
    ) -> Self {
        let session = Arc::new(SessionManager::new(
            identity,
            store.clone(),
            config.auth.session_key.clone(),
            chrono::Duration::hours(config.auth.session_ttl_hours),
        ));
        let guard = NavigationGuard::new(Router::default(), session.clone());
        let listing = ListingController::new(
            collections.clone(),
            source,
            &config.listing.initial_collection,
            config.listing.page_size,
        )
        .with_strict_collections(config.listing.strict_collections);

        Self {
            config,
            store,
            session,
            guard,
            collections,
            listing,
            workspaces: WorkspaceRegistry::with_defaults(),
        }
    }

    /// Make `workspace_id` current and reopen the listing on the first
    /// registered collection. Unknown ids change nothing and return `None`.
    pub async fn switch_workspace(
        &self,
        workspace_id: &str,
    ) -> Result<Option<Workspace>, ListingError> {
        let Some(workspace) = self.workspaces.set_current(workspace_id) else {
            return Ok(None);
        };
        info!(workspace = %workspace.slug, "Switched workspace");

        if let Some(first) = self.collections.first() {
            self.listing.select_collection(&first.slug).await?;
        }
        Ok(Some(workspace))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::identity::{MOCK_ADMIN_EMAIL, MOCK_ADMIN_PASSWORD};
    use crate::router::GuardOutcome;
    use crate::storage::MemorySessionStore;

    fn context() -> AppContext {
        let collections = Arc::new(CollectionRegistry::with_defaults());
        AppContext::with_services(
            Config::default(),
            Arc::new(MemorySessionStore::new()),
            Arc::new(MockIdentityService::new()),
            Arc::new(RegistryDataSource::new(collections.clone())),
            collections,
        )
    }

    #[tokio::test]
    async fn test_switch_workspace_resets_listing() {
        let ctx = context();
        ctx.listing.select_collection("products").await.unwrap();
        ctx.listing.set_page(4).await.unwrap();

        let workspace = ctx.switch_workspace("3").await.unwrap().unwrap();
        assert_eq!(workspace.slug, "startup-inc");

        let state = ctx.listing.state();
        assert_eq!(state.active_collection, "blog-posts");
        assert_eq!(state.page_index, 1);
        assert_eq!(state.total_records, 45);
    }

    #[tokio::test]
    async fn test_switch_to_unknown_workspace_is_noop() {
        let ctx = context();
        ctx.listing.select_collection("products").await.unwrap();

        assert!(ctx.switch_workspace("missing").await.unwrap().is_none());
        assert_eq!(ctx.listing.active_collection(), "products");
        assert_eq!(ctx.workspaces.current().unwrap().id, "1");
    }

    #[tokio::test]
    async fn test_login_then_navigate() {
        let ctx = context();
        let target = "/collections/products";

        let outcome = ctx.guard.before_each(target).await;
        assert_eq!(
            outcome.location(target),
            "/login?redirect=%2Fcollections%2Fproducts"
        );

        ctx.session
            .login(MOCK_ADMIN_EMAIL, MOCK_ADMIN_PASSWORD)
            .await
            .unwrap();
        assert_eq!(ctx.guard.before_each(target).await, GuardOutcome::Allow);
        assert!(ctx.store.get("kilat-session").unwrap().is_some());
    }
}
