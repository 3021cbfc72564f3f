//! Configuration loading from files and the environment.

use std::path::{Path, PathBuf};

use super::{Config, ConfigError};

pub const DEFAULT_CONFIG_FILE: &str = "autopostprod.yaml";

/// Prefix for environment overrides, e.g. `AUTOPOSTPROD__GOOGLE__ACCESS_TOKEN`.
const ENV_PREFIX: &str = "AUTOPOSTPROD";

impl Config {
    /// Load the config from the command line argument, defaulting to `autopostprod.yaml`
    pub fn load_from_arg(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let config_file = config_file.unwrap_or(Path::new(DEFAULT_CONFIG_FILE));
        let config_file = if config_file.is_relative() {
            std::env::current_dir()
                .map_err(ConfigError::CwdFailure)?
                .join(config_file)
        } else {
            config_file.to_path_buf()
        };

        Self::load_from_file(&config_file)
    }

    /// Load the config from a file path, with environment overrides on top
    pub(crate) fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.is_file() {
            return Err(ConfigError::Validation(format!(
                "config file not found: {} (run `autopostprod init` to create one)",
                path.display()
            )));
        }

        let mut config = config::Config::builder()
            .add_source(config::File::from(path).format(config::FileFormat::Yaml))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize::<Config>()?;

        config.resolve_paths(&base_path_from_config(path));
        config.validate()?;
        Ok(config)
    }

    /// Make every configured path absolute, relative to `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        resolve(&mut self.state_dir);
        if let Some(key) = self.repository.ssh_key.as_mut() {
            resolve(key);
        }
        if let Some(key) = self.google.service_account_key.as_mut() {
            resolve(key);
        }
        if let Some(template) = self.templates.puzzle.as_mut() {
            resolve(template);
        }
        if let Some(template) = self.templates.solution.as_mut() {
            resolve(template);
        }
        for round in self.templates.rounds.values_mut() {
            if let Some(template) = round.puzzle.as_mut() {
                resolve(template);
            }
            if let Some(template) = round.solution.as_mut() {
                resolve(template);
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.repository.url.trim().is_empty() {
            return Err(ConfigError::Validation(
                "repository.url is required".to_string(),
            ));
        }
        if self.repository.branch.trim().is_empty() {
            return Err(ConfigError::Validation(
                "repository.branch must not be empty".to_string(),
            ));
        }
        if self.google.access_token.is_some() && self.google.service_account_key.is_some() {
            return Err(ConfigError::Validation(
                "set only one of google.access_token and google.service_account_key".to_string(),
            ));
        }
        if self.assets.container_width == 0 {
            return Err(ConfigError::Validation(
                "assets.container_width must be greater than zero".to_string(),
            ));
        }
        if self.layout.page_file.trim().is_empty() {
            return Err(ConfigError::Validation(
                "layout.page_file must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// A config for `url` with every other setting at its default.
    pub fn for_repository(url: impl Into<String>) -> Self {
        Self {
            repository: super::RepositoryConfig {
                url: url.into(),
                ..Default::default()
            },
            google: Default::default(),
            assets: Default::default(),
            layout: Default::default(),
            templates: Default::default(),
            formatter: Default::default(),
            state_dir: PathBuf::from(".autopostprod"),
            keep_failed_workdir: false,
        }
    }
}

/// Directory that relative config paths are resolved against.
pub fn base_path_from_config(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_minimal_config() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "repository:\n  url: /srv/hunt.git\n");

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.repository.url, "/srv/hunt.git");
        assert_eq!(config.repository.base_branch, "main");
        assert_eq!(config.repository.branch, "{slug}");
        assert!(config.repository.push);
        assert_eq!(config.assets.container_width, 900);
        assert_eq!(config.layout.page_file, "index.tsx");
        assert_eq!(config.state_dir, dir.path().join(".autopostprod"));
    }

    #[test]
    fn test_load_resolves_relative_paths() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            "repository:\n  url: /srv/hunt.git\n  ssh_key: keys/id_ed25519\ntemplates:\n  puzzle: templates/puzzle.tsx\n  rounds:\n    \"3\":\n      solution: templates/meta-solution.tsx\nstate_dir: /var/lib/autopostprod\n",
        );

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(
            config.repository.ssh_key,
            Some(dir.path().join("keys/id_ed25519"))
        );
        assert_eq!(
            config.templates.puzzle,
            Some(dir.path().join("templates/puzzle.tsx"))
        );
        assert!(config.templates.solution.is_none());
        assert_eq!(
            config.templates.rounds["3"].solution,
            Some(dir.path().join("templates/meta-solution.tsx"))
        );
        assert!(config.templates.rounds["3"].puzzle.is_none());
        assert_eq!(config.state_dir, PathBuf::from("/var/lib/autopostprod"));
    }

    #[test]
    fn test_environment_overrides_file() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            "repository:\n  url: /srv/hunt.git\ngoogle:\n  access_token: from-file\n",
        );

        // These keys are only read back by this test
        unsafe {
            std::env::set_var("AUTOPOSTPROD__GOOGLE__ACCESS_TOKEN", "from-env");
            std::env::set_var("AUTOPOSTPROD__ASSETS__MAX_WIDTH", "640");
        }
        let config = Config::load_from_file(&path);
        unsafe {
            std::env::remove_var("AUTOPOSTPROD__GOOGLE__ACCESS_TOKEN");
            std::env::remove_var("AUTOPOSTPROD__ASSETS__MAX_WIDTH");
        }

        let config = config.unwrap();
        assert_eq!(config.google.access_token.as_deref(), Some("from-env"));
        assert_eq!(config.assets.max_width, Some(640));
        assert_eq!(config.repository.url, "/srv/hunt.git");
    }

    #[test]
    fn test_validate_rejects_two_credentials() {
        let mut config = Config::for_repository("/srv/hunt.git");
        config.google.access_token = Some("token".to_string());
        config.google.service_account_key = Some(PathBuf::from("/etc/autopostprod/key.json"));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("google.service_account_key"));

        config.google.access_token = None;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = Config::load_from_file(&dir.path().join("nope.yaml")).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn test_load_requires_repository_url() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "repository:\n  url: \"\"\n");
        let err = Config::load_from_file(&path).unwrap_err();
        assert!(err.to_string().contains("repository.url"));
    }

    #[test]
    fn test_base_path_from_config() {
        assert_eq!(
            base_path_from_config(Path::new("/project/autopostprod.yaml")),
            PathBuf::from("/project")
        );
        assert_eq!(
            base_path_from_config(Path::new("autopostprod.yaml")),
            PathBuf::from("")
        );
    }
}
