//! Shared setup for a housekeeper run
//!
//! Gathers everything a run needs before any keep touches the working tree,
//! so configuration problems fail fast.

use housekeeper::auth::get_gitlab_auth;
use housekeeper::config::{DEFAULT_CONFIG_FILE, compile_filters, load_config, project_ids_from_env};
use housekeeper::error::{Error, Result};
use housekeeper::git::Git;
use housekeeper::hosting::GitLabClient;
use housekeeper::keep::{CommandKeep, Keep};
use housekeeper::runner::RunnerConfig;
use std::path::{Path, PathBuf};
use url::Url;

/// Command-line parameters of a run
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Maximum number of merge requests to produce
    pub max_mrs: usize,
    /// Keeps to run (empty = all configured keeps)
    pub keeps: Vec<String>,
    /// Identifier filter patterns
    pub filter_identifiers: Vec<String>,
    /// Commit and diff only
    pub dry_run: bool,
    /// Base branch
    pub base_branch: String,
    /// Merge request target branch
    pub target_branch: String,
    /// Remote to push to
    pub remote: String,
    /// Keep definitions file (default: `.housekeeper.toml` in the repo)
    pub config: Option<PathBuf>,
    /// GitLab instance
    pub gitlab_url: Url,
}

/// Everything needed to start the runner
pub struct RunContext {
    /// Git adapter for the repository
    pub git: Git,
    /// GitLab client
    pub hosting: GitLabClient,
    /// Runner parameters
    pub config: RunnerConfig,
    /// Keeps to run, in order
    pub keeps: Vec<Box<dyn Keep>>,
}

impl RunContext {
    /// Validate configuration and environment, then build the run
    pub fn new(path: &Path, options: &RunOptions) -> Result<Self> {
        let (source_project_id, target_project_id) = project_ids_from_env()?;

        let config_path = options
            .config
            .clone()
            .unwrap_or_else(|| path.join(DEFAULT_CONFIG_FILE));
        let file_config = load_config(&config_path)?;
        let keeps: Vec<Box<dyn Keep>> = file_config
            .select_keeps(&options.keeps)?
            .into_iter()
            .map(|definition| Box::new(CommandKeep::new(definition, path)) as Box<dyn Keep>)
            .collect();

        let config = RunnerConfig {
            max_mrs: options.max_mrs,
            filter_identifiers: compile_filters(&options.filter_identifiers)?,
            source_project_id,
            target_project_id,
            base_branch: options.base_branch.clone(),
            target_branch: options.target_branch.clone(),
            dry_run: options.dry_run,
        };
        config.validate()?;

        let git = Git::with_remote(path, &options.remote);
        git.ensure_clean()
            .map_err(|e| Error::Config(format!("refusing to run: {e}")))?;
        if !options.dry_run && !git.has_remote(&options.remote)? {
            return Err(Error::Config(format!(
                "git remote '{}' is not configured",
                options.remote
            )));
        }

        // Dry runs never reach the API, so they work without credentials.
        let token = if options.dry_run {
            String::new()
        } else {
            let host = options.gitlab_url.host_str().unwrap_or("gitlab.com");
            get_gitlab_auth(host)?.token
        };
        let hosting = GitLabClient::new(token, options.gitlab_url.clone())?;

        Ok(Self {
            git,
            hosting,
            config,
            keeps,
        })
    }
}
