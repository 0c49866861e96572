use std::fmt;
use std::sync::Arc;

use anyhow::Context;

use gdrive_core::{DriveClient, OAuthClient};

use crate::config::{BACKUP_ROOT_NAME, ItemKind, MODS_DIR_NAME, Settings, TrackedItem};
use crate::oauth_flow::OAuthFlow;
use crate::report::{Level, Reporter, StderrReporter};
use crate::storage::{OAuthState, StorageError, TokenStore};
use crate::sync::engine::{EngineError, FileAction, FolderReport, SyncEngine};
use crate::sync::resolver::resolve_folder;
use crate::token_provider::TokenProvider;

/// Outcome of one tracked item within a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Folder(FolderReport),
    File(FileAction),
    Unsupported,
    Failed(String),
}

impl ItemOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, ItemOutcome::Failed(_))
    }
}

impl fmt::Display for ItemOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemOutcome::Folder(report) => {
                write!(
                    f,
                    "{} new, {} updated, {} skipped",
                    report.created, report.updated, report.skipped
                )?;
                if report.failed > 0 {
                    write!(f, ", {} failed", report.failed)?;
                }
                Ok(())
            }
            ItemOutcome::File(FileAction::Created) => write!(f, "created"),
            ItemOutcome::File(FileAction::Updated) => write!(f, "overwritten"),
            ItemOutcome::Unsupported => write!(f, "not yet supported"),
            ItemOutcome::Failed(reason) => write!(f, "failed ({reason})"),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub items: Vec<(String, ItemOutcome)>,
}

impl RunSummary {
    pub fn has_failures(&self) -> bool {
        self.items.iter().any(|(_, outcome)| outcome.is_failure())
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.items.is_empty() {
            return write!(f, "nothing to back up");
        }
        for (index, (name, outcome)) in self.items.iter().enumerate() {
            if index > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{name}: {outcome}")?;
        }
        Ok(())
    }
}

pub struct BackupRuntime {
    settings: Settings,
    engine: SyncEngine,
    reporter: Arc<dyn Reporter>,
}

impl BackupRuntime {
    pub fn new(settings: Settings, engine: SyncEngine, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            settings,
            engine,
            reporter,
        }
    }

    /// Acquires the auth handle (stored token, refreshed or obtained through
    /// the interactive flow) and builds the Drive client. Done exactly once,
    /// before any item is processed.
    pub async fn bootstrap(settings: Settings) -> anyhow::Result<Self> {
        let store = TokenStore::new().context("failed to open token store")?;
        let oauth_client = oauth_client_from_env()?;
        let state = match store.load() {
            Ok(state) => state,
            Err(StorageError::TokenNotFound) => {
                let client = oauth_client.clone().context(
                    "no saved token: set SAVEBACKUP_CLIENT_ID and SAVEBACKUP_CLIENT_SECRET to log in",
                )?;
                let token = OAuthFlow::new(client)
                    .authenticate()
                    .await
                    .context("interactive Drive login failed")?;
                OAuthState::from_token(&token)
            }
            Err(err) => return Err(err).context("failed to read stored token"),
        };
        let mut provider = TokenProvider::new(state, oauth_client);
        let access_token = provider
            .valid_access_token()
            .await
            .context("failed to obtain a valid access token")?;
        store
            .save(provider.state())
            .context("failed to persist token state")?;

        let client = DriveClient::new(access_token)?;
        let reporter: Arc<dyn Reporter> = Arc::new(StderrReporter);
        let engine = SyncEngine::new(client, Arc::clone(&reporter));
        Ok(Self::new(settings, engine, reporter))
    }

    /// One full backup pass. Every enabled tracked item is attempted;
    /// per-item failures are recorded in the summary and do not stop the
    /// items after them. Only an unusable connection ends the run early.
    pub async fn run_backup(&self) -> Result<RunSummary, EngineError> {
        let root_id = resolve_folder(self.engine.client(), None, BACKUP_ROOT_NAME).await?;
        self.reporter
            .report(Level::Info, &format!("backup folder ready: {BACKUP_ROOT_NAME}"));

        let mut summary = RunSummary::default();
        for item in self.settings.tracked_items() {
            if !item.enabled {
                continue;
            }
            let outcome = match self.sync_item(&item, &root_id).await {
                Ok(outcome) => outcome,
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    self.reporter
                        .report(Level::Error, &format!("{} failed: {err}", item.name));
                    ItemOutcome::Failed(err.to_string())
                }
            };
            summary.items.push((item.name.to_string(), outcome));
        }
        Ok(summary)
    }

    async fn sync_item(
        &self,
        item: &TrackedItem,
        root_id: &str,
    ) -> Result<ItemOutcome, EngineError> {
        if item.name == MODS_DIR_NAME {
            self.reporter
                .report(Level::Warn, "Mods backup is not yet supported");
            return Ok(ItemOutcome::Unsupported);
        }
        match item.kind {
            ItemKind::Folder => {
                self.reporter
                    .report(Level::Info, &format!("uploading {} files", item.name));
                let folder_id =
                    resolve_folder(self.engine.client(), Some(root_id), item.name).await?;
                let report = self
                    .engine
                    .sync_folder(&self.settings.game_dir.join(item.name), &folder_id)
                    .await?;
                Ok(ItemOutcome::Folder(report))
            }
            ItemKind::SingleFile => {
                self.reporter
                    .report(Level::Info, &format!("uploading {}", item.name));
                let action = self
                    .engine
                    .sync_single_file(&self.settings.game_dir.join(item.name), root_id)
                    .await?;
                Ok(ItemOutcome::File(action))
            }
        }
    }
}

fn oauth_client_from_env() -> anyhow::Result<Option<OAuthClient>> {
    let id = std::env::var("SAVEBACKUP_CLIENT_ID").ok();
    let secret = std::env::var("SAVEBACKUP_CLIENT_SECRET").ok();
    match (id, secret) {
        (Some(id), Some(secret)) => Ok(Some(OAuthClient::new(id, secret)?)),
        _ => Ok(None),
    }
}
