//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Resolves its inputs from arguments, environment and config
//! 2. Calls the core operations
//! 3. Formats and displays output
//!
//! # Async Commands
//!
//! Commands that talk to the API are async. [`Session::run`] creates a
//! tokio runtime, cancels the session's token on Ctrl-C, and blocks on the
//! command future.

mod auth;
mod completion;
mod config_cmd;
mod export;
mod files;
mod import;
mod tasks;

use std::future::Future;
use std::io::Write;

use anyhow::{anyhow, Context as _, Result};
use tokio_util::sync::CancellationToken;

use crate::api::{Platform, RestPlatform, ShardedTask};
use crate::cli::args::{Command, ConfigAction, FilesAction, GlobalArgs, TasksAction};
use crate::core::config::Config;
use crate::core::context::ShopContext;
use crate::core::types::ShopId;
use crate::secrets::{token_key, FileSecretStore, SecretStore};
use crate::ui::output::{self, Verbosity};

const NO_SHOP_ID: &str =
    "No shop id. Pass --shop-id, set SHOP_ID, or run 'shop config set shop_id <ID>'.";

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, global: &GlobalArgs) -> Result<()> {
    let verbosity = Verbosity::from_flags(global.quiet, global.debug);

    match command {
        Command::Export {
            entity,
            format,
            out,
        } => Session::run(global, |s| async move {
            export::export(&s, entity, format, out.as_deref()).await
        }),
        Command::Import {
            entity,
            file,
            length_unit,
            weight_unit,
        } => Session::run(global, |s| async move {
            import::import(&s, entity, &file, length_unit, weight_unit).await
        }),
        Command::Tasks { action } => match action {
            TasksAction::Wait { task_id } => {
                Session::run(global, |s| async move { tasks::wait(&s, &task_id).await })
            }
        },
        Command::Files { action } => match action {
            FilesAction::Download { file_id, dest } => Session::run(global, |s| async move {
                files::download(&s, &file_id, &dest).await
            }),
            FilesAction::Upload { path } => {
                Session::run(global, |s| async move { files::upload(&s, &path).await })
            }
        },
        Command::Config { action } => {
            let config = Config::load().context("Failed to load config")?;
            match action {
                ConfigAction::Get { key } => config_cmd::get(&config, &key),
                ConfigAction::Set { key, value } => {
                    config_cmd::set(config, &key, &value, verbosity)
                }
                ConfigAction::List => config_cmd::list(&config),
            }
        }
        Command::Auth { status, logout } => {
            let config = Config::load().context("Failed to load config")?;
            let api_base = global
                .api_base
                .clone()
                .unwrap_or_else(|| config.api_base().to_string());
            let store = FileSecretStore::new().context("Failed to open secret store")?;
            auth::auth(
                &store,
                &api_base,
                global.token.as_deref(),
                status,
                logout,
                verbosity,
            )
        }
        Command::Completion { shell } => completion::completion(shell),
    }
}

/// Everything a network command needs, resolved once per invocation.
pub struct Session {
    pub platform: Box<dyn Platform>,
    pub ctx: ShopContext,
    pub config: Config,
    pub verbosity: Verbosity,
    /// Cancelled on Ctrl-C
    pub cancel: CancellationToken,
}

impl Session {
    /// Resolve the session from flags, environment, config and secret store.
    ///
    /// Precedence for each value: flag or environment variable, then the
    /// config file, then the built-in default.
    pub fn resolve(global: &GlobalArgs) -> Result<Self> {
        let config = Config::load().context("Failed to load config")?;
        let verbosity = Verbosity::from_flags(global.quiet, global.debug);

        let shop_id = global
            .shop_id
            .as_deref()
            .or(config.shop_id())
            .ok_or_else(|| anyhow!(NO_SHOP_ID))?;
        let shop_id = ShopId::new(shop_id).context("Invalid shop id")?;

        let api_base = global
            .api_base
            .clone()
            .unwrap_or_else(|| config.api_base().to_string());

        let token = match &global.token {
            Some(token) => token.clone(),
            None => stored_token(&api_base, verbosity)?.ok_or_else(|| {
                anyhow!("No API token. Pass --token, set SHOP_API_TOKEN, or run 'shop auth'.")
            })?,
        };

        let platform = RestPlatform::new(&api_base, Some(token)).context("Invalid API base")?;
        tracing::debug!(shop = %shop_id, api_base = %platform.api_base(), "session resolved");

        let show_progress = config.progress() && !global.no_progress && !global.quiet;
        let ctx = ShopContext::from_config(shop_id, &config).with_progress(show_progress);

        Ok(Self {
            platform: Box::new(platform),
            ctx,
            config,
            verbosity,
            cancel: CancellationToken::new(),
        })
    }

    /// Resolve a session and run an async command on a fresh runtime.
    pub fn run<F, Fut>(global: &GlobalArgs, command: F) -> Result<()>
    where
        F: FnOnce(Session) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let session = Self::resolve(global)?;
        let rt = tokio::runtime::Runtime::new()?;

        let cancel = session.cancel.clone();
        rt.spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::debug!("interrupt received");
                cancel.cancel();
            }
        });

        rt.block_on(command(session))
    }

    pub fn platform(&self) -> &dyn Platform {
        self.platform.as_ref()
    }
}

/// Look up the stored token for an API base.
fn stored_token(api_base: &str, verbosity: Verbosity) -> Result<Option<String>> {
    let key = token_key(api_base)?;
    let store = FileSecretStore::new()?;
    if !store.permissions_ok()? {
        output::warn(
            format!(
                "{} is readable by other users; run 'chmod 600' on it",
                store.path().display()
            ),
            verbosity,
        );
    }
    Ok(store.get(&key)?.map(|stored| stored.token))
}

/// Print the row-level messages of a finished task.
///
/// A task with messages still counts as successful; this only reports them.
pub(crate) fn report_task_errors(task: &ShardedTask, out: &mut impl Write) -> Result<()> {
    output::write_task_errors(out, task.errors.iter().map(|e| &e.message))
        .context("Failed to write task errors")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::TaskId;

    #[test]
    fn report_task_errors_lists_messages() {
        let task = ShardedTask::done(TaskId::new("t1").unwrap(), None)
            .with_errors(["row 3 invalid"]);
        let mut out = Vec::new();

        report_task_errors(&task, &mut out).unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "Errors:\n  row 3 invalid\n");
    }

    #[test]
    fn report_task_errors_silent_without_messages() {
        let task = ShardedTask::done(TaskId::new("t1").unwrap(), None);
        let mut out = Vec::new();
        report_task_errors(&task, &mut out).unwrap();
        assert!(out.is_empty());
    }
}
