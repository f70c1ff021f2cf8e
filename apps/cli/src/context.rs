use std::sync::Arc;

use anyhow::{Context, Result};

use clientsync_core::settings::SyncSettings;
use clientsync_core::sync::SyncService;
use clientsync_remote::RemoteSyncClient;
use clientsync_storage_sqlite::LocalStore;

use crate::cli::Cli;

/// Everything a command needs, wired once per invocation.
pub struct AppContext {
    pub settings: SyncSettings,
    pub store: LocalStore,
    pub sync_service: Arc<SyncService>,
}

/// Environment first, then command-line overrides.
pub fn resolve_settings(cli: &Cli) -> Result<SyncSettings> {
    let mut settings = SyncSettings::from_env().context("Invalid CLIENTSYNC_* environment")?;
    if let Some(dir) = &cli.data_dir {
        settings.data_dir = dir.clone();
    }
    if let Some(url) = cli.api_url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
        settings.api_base_url = url.trim_end_matches('/').to_string();
    }
    Ok(settings)
}

impl AppContext {
    pub fn build(settings: SyncSettings) -> Result<Self> {
        let store = LocalStore::open(&settings.data_dir).with_context(|| {
            format!("Cannot open local store in {}", settings.data_dir.display())
        })?;
        let remote =
            RemoteSyncClient::with_timeout(&settings.api_base_url, settings.request_timeout)
                .context("Cannot create sync server client")?;

        let sync_service = Arc::new(SyncService::new(
            store.clients(),
            store.sync_metadata(),
            Arc::new(remote),
            settings.return_window,
            store.sync_gate(),
        ));

        tracing::debug!(
            api = %settings.api_base_url,
            db = %store.db_path(),
            "context ready"
        );
        Ok(Self {
            settings,
            store,
            sync_service,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn flags_override_environment() {
        let cli = Cli::try_parse_from([
            "clientsync",
            "status",
            "--api-url",
            "http://10.0.0.5:3000/api/",
            "--data-dir",
            "/srv/clientsync",
        ])
        .unwrap();

        let settings = resolve_settings(&cli).unwrap();
        assert_eq!(settings.api_base_url, "http://10.0.0.5:3000/api");
        assert_eq!(settings.database_path().to_string_lossy(), "/srv/clientsync/clientsync.db");
    }

    #[test]
    fn builds_against_a_fresh_directory() {
        let dir = tempfile::tempdir().unwrap();
        let settings = SyncSettings {
            data_dir: dir.path().to_path_buf(),
            ..SyncSettings::default()
        };

        let ctx = AppContext::build(settings).unwrap();
        assert!(ctx.store.db_path().ends_with("clientsync.db"));
        assert_eq!(ctx.sync_service.status_window(), ctx.settings.return_window);
    }

    #[test]
    fn contexts_on_one_directory_share_the_running_flag() {
        let dir = tempfile::tempdir().unwrap();
        let settings = SyncSettings {
            data_dir: dir.path().to_path_buf(),
            ..SyncSettings::default()
        };

        let first = AppContext::build(settings.clone()).unwrap();
        let second = AppContext::build(settings).unwrap();
        assert!(first.store.sync_gate().shares_with(&second.store.sync_gate()));
    }
}
