//! Locating and loading the project file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use steep_deploy::{PROJECT_FILENAME, ProjectConfig};

/// Environment variables read by the CLI itself rather than the project.
const CLI_ENV_KEYS: &[&str] = &["verbosity", "config", "format", "network", "from", "redeploy"];

/// A loaded project and where it lives.
#[derive(Debug, Clone)]
pub struct Project {
    pub file: PathBuf,
    pub config: ProjectConfig,
}

impl Project {
    /// Load `path` (a project file or a directory holding `Steep.toml`),
    /// overlaid with `STEEP_`-prefixed environment variables.
    pub fn load(path: &Path) -> Result<Self> {
        let file = if path.is_dir() {
            path.join(PROJECT_FILENAME)
        } else {
            path.to_path_buf()
        };

        if !file.exists() {
            anyhow::bail!("Project file not found: {}", file.display());
        }

        let config: ProjectConfig = Figment::new()
            .merge(Toml::file(&file))
            .merge(Env::prefixed("STEEP_").ignore(CLI_ENV_KEYS).split("__"))
            .extract()
            .with_context(|| format!("Failed to load project from {}", file.display()))?;

        Ok(Self { file, config })
    }

    fn root(&self) -> &Path {
        self.file.parent().unwrap_or_else(|| Path::new("."))
    }

    pub fn artifacts_dir(&self) -> PathBuf {
        self.root().join(&self.config.artifacts)
    }

    pub fn records_dir(&self) -> PathBuf {
        self.root().join(&self.config.records)
    }
}

#[cfg(test)]
mod tests {
    use steep_deploy::{ConstructorArg, Network};
    use tempdir::TempDir;

    use super::*;

    #[test]
    fn test_load_from_directory() {
        let dir = TempDir::new("steep-project").unwrap();
        std::fs::write(
            dir.path().join(PROJECT_FILENAME),
            r#"
            artifacts = "out"

            [networks.development]
            rpc_url = "http://127.0.0.1:8545"

            [[step]]
            name = "token"
            contract = "ProductToken"
            "#,
        )
        .unwrap();

        let project = Project::load(dir.path()).unwrap();

        assert_eq!(project.file, dir.path().join(PROJECT_FILENAME));
        assert_eq!(project.artifacts_dir(), dir.path().join("out"));
        assert_eq!(project.records_dir(), dir.path().join("deployments"));
        assert_eq!(project.config.steps.len(), 1);
    }

    fn demo(name: &str) -> Project {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos").join(name);
        Project::load(&dir).unwrap()
    }

    #[test]
    fn test_token_dex_demo() {
        let project = demo("token-dex");
        let plan = project.config.plan().unwrap();

        let token = &plan.steps()[0];
        assert_eq!(token.contract.as_str(), "ProductToken");
        assert_eq!(
            token.args,
            vec![
                ConstructorArg::uint(330000),
                ConstructorArg::uint(500),
                ConstructorArg::uint(3),
                ConstructorArg::uint(9_000_000_000_000_000_000),
            ]
        );
        assert_eq!(plan.steps()[1].args, vec![ConstructorArg::Ref(0)]);

        let mainnet = plan.resolve(&Network::from("mainnet")).unwrap();
        assert_eq!(mainnet.deployments(), 1);
        let development = plan.resolve(&Network::from("development")).unwrap();
        assert_eq!(development.deployments(), 2);
    }

    #[test]
    fn test_token_factory_demo() {
        let project = demo("token-factory");
        let plan = project.config.plan().unwrap();

        assert_eq!(plan.len(), 1);
        let calls = &plan.steps()[0].calls;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].args[0], ConstructorArg::string("Kalon Tea"));
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn test_missing_project() {
        let dir = TempDir::new("steep-project").unwrap();
        assert!(Project::load(&dir.path().join("Nope.toml")).is_err());
    }
}
