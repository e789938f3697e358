//! Parsing and modification of kubectl config files.
//!
//! Reads go through `kube::config::Kubeconfig`; writes delegate to
//! `kubectl config set-credentials` / `set-context` so the file keeps the
//! exact shape kubectl users expect.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use kube::config::{Cluster, Context, Kubeconfig};
#[cfg(test)]
use mockall::automock;

use crate::error::{Error, Result};
use crate::exec::Executor;

/// A kubectl config file parsed by a `ConfigClient` implementation.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    /// Path the config was loaded from.
    pub path: PathBuf,

    /// The parsed document.
    pub config: Kubeconfig,
}

impl ConfigFile {
    /// Returns the context selected in the config.
    pub fn current_context(&self) -> Result<(&str, &Context)> {
        if self.config.contexts.is_empty() {
            return Err(Error::NotFound("no context configs found".to_string()));
        }

        let name = self.config.current_context.as_deref().unwrap_or_default();
        self.context(name)
            .map(|context| (name, context))
            .ok_or_else(|| {
                Error::NotFound(format!("details of current-context [{name}] not found"))
            })
    }

    /// Returns the cluster selected by the current context.
    pub fn current_cluster(&self) -> Result<(&str, &Cluster)> {
        if self.config.clusters.is_empty() {
            return Err(Error::NotFound("no cluster configs found".to_string()));
        }

        let (context_name, context) = self.current_context()?;

        self.config
            .clusters
            .iter()
            .find(|named| named.name == context.cluster)
            .and_then(|named| named.cluster.as_ref())
            .map(|cluster| (context.cluster.as_str(), cluster))
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "details of current-context [{context_name}] cluster [{}] not found",
                    context.cluster
                ))
            })
    }

    /// Looks up a context by name.
    pub fn context(&self, name: &str) -> Option<&Context> {
        self.config
            .contexts
            .iter()
            .find(|named| named.name == name)
            .and_then(|named| named.context.as_ref())
    }
}

/// Interface to kubectl config files.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ConfigClient: Send + Sync {
    /// Returns a ConfigFile based on the contents of the named file, or of
    /// the default discovery locations when the path is empty.
    fn parse(&self, path: &str) -> Result<ConfigFile>;

    /// Adds/updates a user's bearer token.
    async fn upsert_user_token(&self, file: &ConfigFile, user: &str, token: &[u8]) -> Result<()>;

    /// Adds or updates a context.
    async fn upsert_context(
        &self,
        file: &ConfigFile,
        name: &str,
        cluster: &str,
        namespace: &str,
        user: &str,
    ) -> Result<()>;
}

/// ConfigClient operating on real config files.
pub struct DefaultConfigClient {
    executor: Arc<dyn Executor>,
}

impl DefaultConfigClient {
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        DefaultConfigClient { executor }
    }
}

/// Resolves the config path the way kubectl does when no explicit path is
/// given: the first `KUBECONFIG` entry, then `$HOME/.kube/config`.
fn default_config_path() -> PathBuf {
    if let Ok(env_path) = std::env::var("KUBECONFIG") {
        if let Some(first) = std::env::split_paths(&env_path).next() {
            return first;
        }
    }

    let home = std::env::var_os("HOME").unwrap_or_default();
    Path::new(&home).join(".kube").join("config")
}

#[async_trait]
impl ConfigClient for DefaultConfigClient {
    fn parse(&self, path: &str) -> Result<ConfigFile> {
        let path = if path.is_empty() {
            default_config_path()
        } else {
            PathBuf::from(path)
        };

        let config = Kubeconfig::read_from(&path).map_err(|source| Error::Kubeconfig {
            path: path.display().to_string(),
            source,
        })?;

        if config.current_context.as_deref().unwrap_or_default().is_empty() {
            return Err(Error::NotFound(format!(
                "current-context not found in file [{}]",
                path.display()
            )));
        }

        Ok(ConfigFile { path, config })
    }

    async fn upsert_user_token(&self, file: &ConfigFile, user: &str, token: &[u8]) -> Result<()> {
        let args = vec![
            "config".to_string(),
            "set-credentials".to_string(),
            user.to_string(),
            "--kubeconfig".to_string(),
            file.path.display().to_string(),
            "--token".to_string(),
            String::from_utf8_lossy(token).into_owned(),
        ];

        let res = self.executor.buffered("kubectl", &args).await?;
        if !res.success() {
            return Err(Error::KubectlConfig {
                operation: "set-credentials",
                stderr: res.stderr_trimmed(),
            });
        }

        Ok(())
    }

    async fn upsert_context(
        &self,
        file: &ConfigFile,
        name: &str,
        cluster: &str,
        namespace: &str,
        user: &str,
    ) -> Result<()> {
        let args = vec![
            "config".to_string(),
            "set-context".to_string(),
            name.to_string(),
            "--kubeconfig".to_string(),
            file.path.display().to_string(),
            "--cluster".to_string(),
            cluster.to_string(),
            "--namespace".to_string(),
            namespace.to_string(),
            "--user".to_string(),
            user.to_string(),
        ];

        let res = self.executor.buffered("kubectl", &args).await?;
        if !res.success() {
            return Err(Error::KubectlConfig {
                operation: "set-context",
                stderr: res.stderr_trimmed(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::{ExecResult, MockExecutor};
    use crate::testkit;

    #[test]
    fn current_context_resolves_from_document() {
        let file = testkit::config_file(
            testkit::CURRENT_CONTEXT_NAME,
            testkit::CURRENT_CLUSTER_NAME,
            testkit::CURRENT_NAMESPACE,
        );

        let (name, context) = file.current_context().unwrap();
        assert_eq!(name, testkit::CURRENT_CONTEXT_NAME);
        assert_eq!(context.cluster, testkit::CURRENT_CLUSTER_NAME);
        assert_eq!(context.namespace.as_deref(), Some(testkit::CURRENT_NAMESPACE));

        let (cluster_name, _) = file.current_cluster().unwrap();
        assert_eq!(cluster_name, testkit::CURRENT_CLUSTER_NAME);
    }

    #[test]
    fn parsed_yaml_document_feeds_the_accessors() {
        let yaml = r#"
apiVersion: v1
kind: Config
current-context: kubeauth-testkit-current-context
clusters:
- name: kubeauth-testkit-current-cluster
  cluster:
    server: https://127.0.0.1:6443
contexts:
- name: kubeauth-testkit-current-context
  context:
    cluster: kubeauth-testkit-current-cluster
    user: kubeauth-testkit-username
    namespace: kubeauth-testkit-current-namespace
users:
- name: kubeauth-testkit-username
  user:
    token: kubeauth-testkit-token
"#;

        let config: Kubeconfig = serde_yaml::from_str(yaml).unwrap();
        let file = ConfigFile {
            path: testkit::CONFIG_FILENAME.into(),
            config,
        };

        let (name, context) = file.current_context().unwrap();
        assert_eq!(name, testkit::CURRENT_CONTEXT_NAME);
        assert_eq!(context.user, testkit::USERNAME);
        assert_eq!(file.current_cluster().unwrap().0, testkit::CURRENT_CLUSTER_NAME);
    }

    #[test]
    fn current_context_missing_details_is_an_error() {
        let mut file = testkit::config_file(
            testkit::CURRENT_CONTEXT_NAME,
            testkit::CURRENT_CLUSTER_NAME,
            testkit::CURRENT_NAMESPACE,
        );
        file.config.current_context = Some("does-not-exist".to_string());

        let err = file.current_context().unwrap_err();
        assert!(err.to_string().contains("does-not-exist"));
    }

    #[tokio::test]
    async fn upsert_user_token_shells_out_to_kubectl() {
        let mut executor = MockExecutor::new();
        executor
            .expect_buffered()
            .withf(|program, args| {
                program == "kubectl"
                    && args[..2] == ["config".to_string(), "set-credentials".to_string()]
                    && args[2] == testkit::USERNAME
                    && args.contains(&"--token".to_string())
            })
            .return_once(|_, _| Ok(ExecResult::default()));

        let client = DefaultConfigClient::new(Arc::new(executor));
        let file = testkit::config_file(
            testkit::CURRENT_CONTEXT_NAME,
            testkit::CURRENT_CLUSTER_NAME,
            testkit::CURRENT_NAMESPACE,
        );

        client
            .upsert_user_token(&file, testkit::USERNAME, b"token-bytes")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn upsert_context_reports_kubectl_stderr() {
        let mut executor = MockExecutor::new();
        executor.expect_buffered().return_once(|_, _| {
            Ok(ExecResult {
                code: 1,
                stdout: Vec::new(),
                stderr: b"no such cluster\n".to_vec(),
            })
        });

        let client = DefaultConfigClient::new(Arc::new(executor));
        let file = testkit::config_file(
            testkit::CURRENT_CONTEXT_NAME,
            testkit::CURRENT_CLUSTER_NAME,
            testkit::CURRENT_NAMESPACE,
        );

        let err = client
            .upsert_context(
                &file,
                testkit::USERNAME,
                testkit::CURRENT_CLUSTER_NAME,
                testkit::CURRENT_NAMESPACE,
                testkit::USERNAME,
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no such cluster"));
    }
}
