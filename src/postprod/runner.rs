//! Entry point for running postprod and fixture exports.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::blocking::Client;

use super::assets::{AssetSource, HttpAssets};
use super::auth::{AuthError, Credentials, ServiceAccountKey, ServiceAccountTokens};
use super::fetch::{DocumentService, GoogleDrive};
use super::metadata::PuzzleMetadata;
use super::pipeline::{Pipeline, PipelineContext, PostprodRun};
use super::request::PostprodRequest;
use super::result::{PublishResult, Rejection};
use super::template::{BindError, Binder};
use crate::config::Config;
use crate::git::HuntRepo;
use crate::lock::{LockError, RunLock};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(thiserror::Error, Debug)]
pub enum SetupError {
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to set up document service credentials: {0}")]
    Credentials(#[from] AuthError),

    #[error("failed to load page templates: {0}")]
    Templates(#[from] BindError),
}

/// Runs postprod requests against one hunt repository.
///
/// Blocking: call from a blocking thread when inside an async runtime.
pub struct Postprod {
    config: Config,
    repository: HuntRepo,
    binder: Binder,
    documents: Box<dyn DocumentService>,
    assets: Box<dyn AssetSource>,
}

impl Postprod {
    /// Build the production services from `config`.
    pub fn from_config(config: Config) -> Result<Self, SetupError> {
        let client = Client::builder()
            .user_agent(concat!("autopostprod/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        let credentials = match (&config.google.service_account_key, &config.google.access_token) {
            (Some(path), _) => Credentials::ServiceAccount(ServiceAccountTokens::new(
                client.clone(),
                ServiceAccountKey::from_file(path)?,
            )?),
            (None, Some(token)) => Credentials::Bearer(token.clone()),
            (None, None) => Credentials::Anonymous,
        };
        let documents =
            GoogleDrive::new(client.clone(), config.google.api_base.clone(), credentials);
        let assets = HttpAssets::new(client);
        Self::with_services(config, Box::new(documents), Box::new(assets))
    }

    pub fn with_services(
        config: Config,
        documents: Box<dyn DocumentService>,
        assets: Box<dyn AssetSource>,
    ) -> Result<Self, SetupError> {
        let binder = Binder::new(&config.templates)?;
        Ok(Self {
            repository: HuntRepo::from_config(&config.repository),
            config,
            binder,
            documents,
            assets,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Publish the pages and fixture for one puzzle.
    pub fn run(&self, request: PostprodRequest) -> PublishResult {
        match PostprodRun::for_request(request, &self.config) {
            Ok(mut run) => self.execute(&Pipeline::default_pipeline(), &mut run),
            Err(e) => PublishResult::rejected(Rejection::Invalid, e.to_string()),
        }
    }

    /// Publish fixtures for `records` to a new export branch.
    pub fn export(&self, records: Vec<PuzzleMetadata>) -> PublishResult {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        match PostprodRun::for_export(records, format!("export-{stamp}")) {
            Ok(mut run) => self.execute(&Pipeline::export_pipeline(), &mut run),
            Err(e) => PublishResult::rejected(Rejection::Invalid, e.to_string()),
        }
    }

    /// Run `pipeline` on `run` while holding the lock for its branch.
    pub fn execute(&self, pipeline: &Pipeline, run: &mut PostprodRun) -> PublishResult {
        let target = format!("{}#{}", self.repository.url(), run.branch);
        let _lock = match RunLock::acquire(&self.config.state_dir.join("locks"), &target) {
            Ok(lock) => lock,
            Err(e @ LockError::Busy { .. }) => {
                tracing::warn!("{e}");
                return PublishResult::rejected(Rejection::Busy, e.to_string());
            }
            Err(e) => return PublishResult::rejected(Rejection::Invalid, e.to_string()),
        };

        let ctx = PipelineContext {
            documents: self.documents.as_ref(),
            assets: self.assets.as_ref(),
            binder: &self.binder,
            repository: &self.repository,
            layout: &self.config.layout,
            formatter: &self.config.formatter,
        };

        match pipeline.run(run, &ctx) {
            Ok(()) => {
                tracing::info!(branch = %run.branch, commit = ?run.commit, "postprod published");
                PublishResult::published(run, &self.config.repository)
            }
            Err(error) => {
                let working_copy = if self.config.keep_failed_workdir {
                    run.workspace.as_mut().map(|workspace| workspace.persist())
                } else {
                    None
                };
                if let Some(path) = &working_copy {
                    tracing::info!(path = %path.display(), "kept working copy of failed run");
                }
                PublishResult::failed(run, &error, working_copy)
            }
        }
    }
}
