//! Configuration type definitions.
//!
//! This module contains the data structures used in `autopostprod.yaml`.
//! These types are pure data - no I/O or complex logic.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub repository: RepositoryConfig,
    #[serde(default)]
    pub google: GoogleConfig,
    #[serde(default)]
    pub assets: AssetsConfig,
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub templates: TemplatesConfig,
    #[serde(default)]
    pub formatter: FormatterConfig,
    /// Where run locks live. Relative paths resolve against the config file.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    /// Keep the working copy of a failed run on disk for inspection.
    #[serde(default)]
    pub keep_failed_workdir: bool,
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".autopostprod")
}

// =============================================================================
// Hunt repository
// =============================================================================

/// The hunt site's git repository.
///
/// ```yaml
/// repository:
///   url: git@github.com:example/hunt.git
///   base_branch: main
///   branch: "postprod/{slug}"
///   ssh_key: ~/.ssh/id_postprod
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    pub url: String,
    /// Branch new postprod branches start from.
    #[serde(default = "default_base_branch")]
    pub base_branch: String,
    /// Name of the branch to publish to. `{slug}` is replaced by the puzzle slug.
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_key: Option<PathBuf>,
    /// Set to false to commit without pushing.
    #[serde(default = "default_true")]
    pub push: bool,
    #[serde(default)]
    pub author: AuthorConfig,
    /// Base URL of branch previews. `{slug}` and `{branch}` are replaced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            base_branch: default_base_branch(),
            branch: default_branch(),
            ssh_key: None,
            push: true,
            author: AuthorConfig::default(),
            preview_url: None,
        }
    }
}

fn default_base_branch() -> String {
    "main".to_string()
}

fn default_branch() -> String {
    "{slug}".to_string()
}

fn default_true() -> bool {
    true
}

/// Commit author for postprod commits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorConfig {
    #[serde(default = "default_author_name")]
    pub name: String,
    #[serde(default = "default_author_email")]
    pub email: String,
}

impl Default for AuthorConfig {
    fn default() -> Self {
        Self {
            name: default_author_name(),
            email: default_author_email(),
        }
    }
}

fn default_author_name() -> String {
    "autopostprod".to_string()
}

fn default_author_email() -> String {
    "autopostprod@localhost".to_string()
}

// =============================================================================
// Document service
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// OAuth bearer token. Usually supplied via `AUTOPOSTPROD__GOOGLE__ACCESS_TOKEN`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Service-account JSON key. Access tokens are minted from it and cached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_key: Option<PathBuf>,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            access_token: None,
            service_account_key: None,
        }
    }
}

fn default_api_base() -> String {
    "https://www.googleapis.com/drive/v3".to_string()
}

// =============================================================================
// Assets
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetsConfig {
    /// Default maximum image width in pixels when a request does not set one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_width: Option<u32>,
    /// Page container width that percentage widths are measured against.
    #[serde(default = "default_container_width")]
    pub container_width: u32,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            max_width: None,
            container_width: default_container_width(),
        }
    }
}

fn default_container_width() -> u32 {
    900
}

// =============================================================================
// Repository layout
// =============================================================================

/// Where generated files go inside the hunt repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Root that asset import paths are relative to.
    #[serde(default = "default_client_dir")]
    pub client_dir: PathBuf,
    #[serde(default = "default_puzzle_pages")]
    pub puzzle_pages: PathBuf,
    #[serde(default = "default_solution_pages")]
    pub solution_pages: PathBuf,
    #[serde(default = "default_puzzle_assets")]
    pub puzzle_assets: PathBuf,
    #[serde(default = "default_solution_assets")]
    pub solution_assets: PathBuf,
    #[serde(default = "default_fixtures")]
    pub fixtures: PathBuf,
    #[serde(default = "default_page_file")]
    pub page_file: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            client_dir: default_client_dir(),
            puzzle_pages: default_puzzle_pages(),
            solution_pages: default_solution_pages(),
            puzzle_assets: default_puzzle_assets(),
            solution_assets: default_solution_assets(),
            fixtures: default_fixtures(),
            page_file: default_page_file(),
        }
    }
}

fn default_client_dir() -> PathBuf {
    PathBuf::from("client")
}

fn default_puzzle_pages() -> PathBuf {
    PathBuf::from("client/pages/puzzles")
}

fn default_solution_pages() -> PathBuf {
    PathBuf::from("client/pages/solutions")
}

fn default_puzzle_assets() -> PathBuf {
    PathBuf::from("client/assets/puzzles")
}

fn default_solution_assets() -> PathBuf {
    PathBuf::from("client/assets/solutions")
}

fn default_fixtures() -> PathBuf {
    PathBuf::from("server/tph/fixtures/puzzles")
}

fn default_page_file() -> String {
    "index.tsx".to_string()
}

// =============================================================================
// Templates and formatter
// =============================================================================

/// Page templates. The built-in templates are used when unset.
///
/// ```yaml
/// templates:
///   puzzle: templates/puzzle.tsx
///   rounds:
///     "3":
///       puzzle: templates/metapuzzle.tsx
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplatesConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub puzzle: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solution: Option<PathBuf>,
    /// Per-round overrides, keyed by the round id in puzzle metadata.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub rounds: BTreeMap<String, RoundTemplates>,
}

/// Templates for the puzzles of one round. Unset kinds use the defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoundTemplates {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub puzzle: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solution: Option<PathBuf>,
}

/// External formatter run over written pages before committing.
///
/// ```yaml
/// formatter:
///   command: npx
///   args: [prettier, --write]
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormatterConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
}
