//! Repository factory for dependency injection.
//!
//! Creates repository instances from runtime configuration: environment
//! variables, a `repository.toml` file, or explicit arguments.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use super::repo_config::RepositoryConfig;
use super::repositories::LocalRepository;
#[cfg(feature = "postgres-repo")]
use super::repositories::PostgresRepository;
use super::repository::{FullRepository, RepositoryError, RepositoryResult};
use super::PostgresConfig;

/// Repository backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryType {
    /// Postgres + Diesel implementation
    Postgres,
    /// In-memory local repository
    Local,
}

impl FromStr for RepositoryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "pg" => Ok(Self::Postgres),
            "local" => Ok(Self::Local),
            _ => Err(format!("Unknown repository type: {}", s)),
        }
    }
}

impl RepositoryType {
    /// Read `REPOSITORY_TYPE` from the environment. Defaults to Postgres
    /// when a database URL is present, otherwise Local.
    pub fn from_env() -> Self {
        if let Ok(val) = std::env::var("REPOSITORY_TYPE") {
            return val.parse().unwrap_or(Self::Local);
        }

        if std::env::var("DATABASE_URL").is_ok() || std::env::var("PG_DATABASE_URL").is_ok() {
            Self::Postgres
        } else {
            Self::Local
        }
    }
}

/// Factory for creating repository instances.
pub struct RepositoryFactory;

impl RepositoryFactory {
    /// Create a repository of the given type.
    ///
    /// `postgres_config` is required for [`RepositoryType::Postgres`].
    pub fn create(
        repo_type: RepositoryType,
        postgres_config: Option<&PostgresConfig>,
    ) -> RepositoryResult<Arc<dyn FullRepository>> {
        match repo_type {
            RepositoryType::Postgres => {
                #[cfg(feature = "postgres-repo")]
                {
                    let config = postgres_config.ok_or_else(|| {
                        RepositoryError::configuration(
                            "Postgres repository requires PostgresConfig",
                        )
                    })?;
                    Ok(Self::create_postgres(config)? as Arc<dyn FullRepository>)
                }
                #[cfg(not(feature = "postgres-repo"))]
                {
                    let _ = postgres_config;
                    Err(RepositoryError::configuration(
                        "Postgres repository feature not enabled",
                    ))
                }
            }
            RepositoryType::Local => Ok(Self::create_local()),
        }
    }

    /// Create a Postgres repository (pool + migrations).
    #[cfg(feature = "postgres-repo")]
    pub fn create_postgres(config: &PostgresConfig) -> RepositoryResult<Arc<PostgresRepository>> {
        Ok(Arc::new(PostgresRepository::new(config.clone())?))
    }

    /// Create an in-memory local repository.
    pub fn create_local() -> Arc<dyn FullRepository> {
        Arc::new(LocalRepository::new())
    }

    /// Create a repository from environment configuration.
    pub fn from_env() -> RepositoryResult<Arc<dyn FullRepository>> {
        match RepositoryType::from_env() {
            RepositoryType::Postgres => {
                #[cfg(feature = "postgres-repo")]
                {
                    let config =
                        PostgresConfig::from_env().map_err(RepositoryError::configuration)?;
                    Ok(Self::create_postgres(&config)? as Arc<dyn FullRepository>)
                }
                #[cfg(not(feature = "postgres-repo"))]
                {
                    Err(RepositoryError::configuration(
                        "Postgres repository feature not enabled",
                    ))
                }
            }
            RepositoryType::Local => Ok(Self::create_local()),
        }
    }

    /// Create a repository from a `repository.toml` configuration file.
    pub fn from_config_file<P: AsRef<Path>>(
        config_path: P,
    ) -> RepositoryResult<Arc<dyn FullRepository>> {
        let config = RepositoryConfig::from_file(config_path)?;
        Self::from_repository_config(&config)
    }

    fn from_repository_config(
        config: &RepositoryConfig,
    ) -> RepositoryResult<Arc<dyn FullRepository>> {
        let repo_type = config.repository_type().map_err(|e| {
            RepositoryError::configuration(format!("Invalid repository type: {}", e))
        })?;

        match repo_type {
            RepositoryType::Postgres => {
                #[cfg(feature = "postgres-repo")]
                {
                    let pg_config = config.to_postgres_config()?.ok_or_else(|| {
                        RepositoryError::configuration(
                            "Postgres repository requires database configuration",
                        )
                    })?;
                    Ok(Self::create_postgres(&pg_config)? as Arc<dyn FullRepository>)
                }
                #[cfg(not(feature = "postgres-repo"))]
                {
                    Err(RepositoryError::configuration(
                        "Postgres repository feature not enabled",
                    ))
                }
            }
            RepositoryType::Local => Ok(Self::create_local()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_type_from_str() {
        assert_eq!(
            RepositoryType::from_str("local").unwrap(),
            RepositoryType::Local
        );
        assert_eq!(
            RepositoryType::from_str("postgres").unwrap(),
            RepositoryType::Postgres
        );
        assert_eq!(
            RepositoryType::from_str("Pg").unwrap(),
            RepositoryType::Postgres
        );
        assert!(RepositoryType::from_str("invalid").is_err());
    }

    #[tokio::test]
    async fn test_create_local_repository() {
        let repo = RepositoryFactory::create_local();
        assert!(repo.health_check().await.unwrap());
    }
}
