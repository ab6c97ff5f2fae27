//! Development config reload.
//!
//! In the development profile the config file's directory is watched. When
//! the file changes it is loaded again (environment and CLI overrides
//! included), validated and swapped into [`AppState`]. A file that fails to
//! load or validate is logged and the running configuration is kept.
//!
//! Only the `app` metadata is read per request. Everything built once at
//! startup (`server`, `redis`, `storage`, `logging` and `app.api_prefix`)
//! keeps its running value, and a change to it is reported as needing a
//! restart.

use crate::cli::Cli;
use crate::config::AppConfig;
use crate::state::AppState;
use anyhow::Result;
use notify::{Config as NotifyConfig, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Start watching `cli.config`. The returned watcher must be kept alive for
/// as long as reloads are wanted; dropping it stops the watch.
pub fn spawn_config_reloader(cli: Cli, state: AppState) -> Result<Option<RecommendedWatcher>> {
    let config_path = cli.config.clone();
    let Some(watch_dir) = watch_directory(&config_path) else {
        warn!(path = %config_path.display(), "Config directory does not exist, reload disabled");
        return Ok(None);
    };

    let (file_tx, mut file_rx) = mpsc::channel::<notify::Result<Event>>(16);
    let mut watcher = RecommendedWatcher::new(
        move |res| {
            let _ = file_tx.blocking_send(res);
        },
        NotifyConfig::default(),
    )?;
    watcher.watch(&watch_dir, RecursiveMode::NonRecursive)?;
    info!(path = %config_path.display(), "Watching config file for changes");

    tokio::spawn(async move {
        while let Some(res) = file_rx.recv().await {
            match res {
                Ok(event) if touches(&event, &config_path) => {
                    info!("Config file changed, reloading...");
                    apply_reload(&state, load(&cli));
                }
                Ok(event) => debug!(?event, "Ignoring unrelated filesystem event"),
                Err(e) => error!("Watch error: {}", e),
            }
        }
    });

    Ok(Some(watcher))
}

fn load(cli: &Cli) -> Result<AppConfig> {
    let mut config = AppConfig::load(&cli.config)?;
    cli.apply_overrides(&mut config);
    Ok(config)
}

/// Swap a freshly loaded configuration into `state`, or keep the old one.
/// Returns whether the swap happened.
pub fn apply_reload(state: &AppState, loaded: Result<AppConfig>) -> bool {
    let new_config = match loaded {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to reload config: {:#}", e);
            return false;
        }
    };
    if let Err(e) = new_config.validate() {
        error!("Reloaded config is invalid, keeping the current one: {}", e);
        return false;
    }

    let current = state.get_config();
    let pinned = restart_only_changes(&current, &new_config);
    if !pinned.is_empty() {
        warn!(sections = ?pinned, "Changes to these settings apply after a restart");
    }

    let mut merged = current.clone();
    merged.app = new_config.app;
    merged.app.api_prefix = current.app.api_prefix.clone();
    if merged == current {
        debug!("No live settings changed");
        return false;
    }

    match state.replace_config(merged) {
        Ok(()) => {
            info!("Configuration reloaded");
            true
        }
        Err(e) => {
            error!("Reloaded config is invalid, keeping the current one: {}", e);
            false
        }
    }
}

/// Settings that differ between `current` and `loaded` but are only read
/// when the server starts.
fn restart_only_changes(current: &AppConfig, loaded: &AppConfig) -> Vec<&'static str> {
    let mut changed = Vec::new();
    if current.server != loaded.server {
        changed.push("server");
    }
    if current.app.api_prefix != loaded.app.api_prefix {
        changed.push("app.api_prefix");
    }
    if current.redis != loaded.redis {
        changed.push("redis");
    }
    if current.storage != loaded.storage {
        changed.push("storage");
    }
    if current.logging != loaded.logging {
        changed.push("logging");
    }
    changed
}

fn watch_directory(path: &Path) -> Option<PathBuf> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    dir.is_dir().then_some(dir)
}

/// A modify, rename or create event naming the config file.
fn touches(event: &Event, config_path: &Path) -> bool {
    let relevant_kind = event.kind.is_modify() || event.kind.is_create();
    relevant_kind
        && event
            .paths
            .iter()
            .any(|p| p.file_name().is_some() && p.file_name() == config_path.file_name())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_state;
    use notify::event::{CreateKind, EventKind, ModifyKind, RemoveKind};

    #[tokio::test]
    async fn test_apply_reload_swaps_valid_config() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path()).await;

        let mut changed = state.get_config();
        changed.app.description = "Reloaded description".to_string();
        assert!(apply_reload(&state, Ok(changed)));
        assert_eq!(state.get_config().app.description, "Reloaded description");
    }

    #[tokio::test]
    async fn test_apply_reload_keeps_config_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path()).await;
        let before = state.get_config();

        assert!(!apply_reload(&state, Err(anyhow::anyhow!("broken toml"))));

        let mut invalid = before.clone();
        invalid.app.name = String::new();
        assert!(!apply_reload(&state, Ok(invalid)));

        assert!(!apply_reload(&state, Ok(before.clone())));
        assert_eq!(state.get_config(), before);
    }

    #[tokio::test]
    async fn test_apply_reload_keeps_startup_only_settings() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path()).await;
        let before = state.get_config();

        let mut changed = before.clone();
        changed.redis.url = "redis://cache.internal:6379/1".to_string();
        changed.storage.max_upload_size = 1024 * 1024;
        changed.app.api_prefix = "/api/v2".to_string();
        assert_eq!(
            restart_only_changes(&before, &changed),
            vec!["app.api_prefix", "redis", "storage"]
        );
        assert!(!apply_reload(&state, Ok(changed.clone())));
        assert_eq!(state.get_config(), before);

        changed.app.name = "SoundPatch Studio".to_string();
        assert!(apply_reload(&state, Ok(changed)));
        let after = state.get_config();
        assert_eq!(after.app.name, "SoundPatch Studio");
        assert_eq!(after.app.api_prefix, before.app.api_prefix);
        assert_eq!(after.redis, before.redis);
        assert_eq!(after.storage, before.storage);
    }

    #[test]
    fn test_touches_matches_file_name() {
        let config_path = PathBuf::from("/srv/app/config.toml");

        let modify = Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(PathBuf::from("/srv/app/config.toml"));
        assert!(touches(&modify, &config_path));

        let create = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/srv/app/config.toml"));
        assert!(touches(&create, &config_path));

        let other = Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(PathBuf::from("/srv/app/other.toml"));
        assert!(!touches(&other, &config_path));

        let removed = Event::new(EventKind::Remove(RemoveKind::File))
            .add_path(PathBuf::from("/srv/app/config.toml"));
        assert!(!touches(&removed, &config_path));
    }

    #[test]
    fn test_watch_directory_for_bare_file_name() {
        assert_eq!(watch_directory(Path::new("config.toml")), Some(PathBuf::from(".")));
        assert_eq!(watch_directory(Path::new("/no/such/dir/config.toml")), None);
    }
}
