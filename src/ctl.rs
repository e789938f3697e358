//! The ctl workflow: validate impersonation targets against known
//! identities, then pass the invocation through to kubectl.

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cluster::Clientset;
use crate::error::{Error, Result};
use crate::exec::Executor;
use crate::identity::{Query, Registry};
use crate::kinds::Kind;
use crate::kubeconfig::ConfigFile;

/// Inputs of the ctl workflow.
pub struct Ctl {
    /// User to impersonate.
    pub as_user: String,

    /// Group(s) to impersonate.
    pub as_groups: Vec<String>,

    /// Pass to kubectl if the effective context's cluster matches, else
    /// error (default from current-context).
    pub cluster: String,

    /// Consider users in this context (defaults to current-context).
    pub context: String,

    /// Include identities from only one namespace (default from the
    /// effective context).
    pub namespace: String,

    /// Include identities from any/no namespace.
    pub all_namespaces: bool,

    /// kubectl verbosity level.
    pub verbosity: u8,

    /// kubectl sub-command and arguments given before `--`.
    pub args_before_dash: Vec<String>,

    /// Arguments after `--`, forwarded verbatim.
    pub args_after_dash: Vec<String>,
}

impl Ctl {
    pub async fn run(
        &self,
        cancel: &CancellationToken,
        clientset: &Clientset,
        registry: &Registry,
        config_file: &ConfigFile,
        executor: &dyn Executor,
    ) -> Result<()> {
        // Validate inputs.

        if self.as_user.is_empty() && self.as_groups.is_empty() {
            return Err(Error::Input(
                "missing --as or --as-group selection".to_string(),
            ));
        }
        if !self.namespace.is_empty() && self.all_namespaces {
            return Err(Error::Input(
                "--namespace and --all-namespaces cannot be combined".to_string(),
            ));
        }

        let (current_context_name, current_context) = config_file.current_context()?;

        // Resolve the effective context after considering --context and
        // current-context.

        let effective_context_name = if self.context.is_empty() {
            info!(
                "defaulting to current-context [{current_context_name}] from file [{}]",
                config_file.path.display()
            );
            current_context_name
        } else {
            info!(
                "using --context [{}] from file [{}]",
                self.context,
                config_file.path.display()
            );
            self.context.as_str()
        };

        let effective_context = config_file.context(effective_context_name).ok_or_else(|| {
            Error::NotFound(format!(
                "context [{effective_context_name}] not found in config [{}]",
                config_file.path.display()
            ))
        })?;

        // Just as impersonation targets are validated, catch cluster
        // mismatches before passing --cluster on to kubectl.
        if !self.cluster.is_empty() && self.cluster != effective_context.cluster {
            return Err(Error::Conflict(format!(
                "selected --cluster [{}] differs from effective context's cluster [{}]",
                self.cluster, effective_context.cluster
            )));
        }

        // Resolve and validate the effective namespace, mirroring kubectl's
        // handling of --namespace and the current context.

        let mut namespace = String::new();
        if !self.all_namespaces {
            namespace = if self.namespace.is_empty() {
                let defaulted = effective_context.namespace.clone().unwrap_or_default();
                info!(
                    "defaulting to namespace [{defaulted}] from context [{effective_context_name}]"
                );
                defaulted
            } else {
                info!("using --namespace [{}]", self.namespace);
                self.namespace.clone()
            };

            if !namespace.is_empty() && clientset.namespaces.get(&namespace).await?.is_none() {
                return Err(Error::NotFound(format!(
                    "selected --namespace [{namespace}] not found"
                )));
            }
        }

        // Validate the impersonation targets. --as searches User identities
        // and --as-group searches Group identities; each query option
        // narrows the querier set and the candidate results.

        if !self.as_user.is_empty() {
            info!("validating --as [{}]", self.as_user);

            let list = registry
                .query(
                    cancel,
                    Query::new()
                        .kind(Kind::User)
                        .name(self.as_user.clone())
                        .namespace(namespace.clone())
                        .config(&config_file.config),
                )
                .await?;

            if list.is_empty() {
                return Err(Error::NotFound(format!(
                    "--as identity [{}] not found",
                    self.as_user
                )));
            }

            for item in &list.items {
                info!("--as identity found in [{item}]");
            }
        }

        for group in &self.as_groups {
            info!("validating --as-group [{group}]");

            let list = registry
                .query(
                    cancel,
                    Query::new()
                        .kind(Kind::Group)
                        .name(group.clone())
                        .namespace(namespace.clone()),
                )
                .await?;

            if list.is_empty() {
                return Err(Error::NotFound(format!(
                    "--as-group identity [{group}] not found"
                )));
            }

            for item in &list.items {
                info!("--as-group [{group}] identity found in [{item}]");
            }
        }

        // Pass the validated inputs through to kubectl.

        let use_current_context = effective_context_name == current_context_name;
        let current_namespace = current_context.namespace.clone().unwrap_or_default();

        let mut args = self.args_before_dash.clone();
        args.push("--kubeconfig".to_string());
        args.push(config_file.path.display().to_string());
        if !self.as_user.is_empty() {
            args.push("--as".to_string());
            args.push(self.as_user.clone());
        }
        for group in &self.as_groups {
            args.push("--as-group".to_string());
            args.push(group.clone());
        }
        if !use_current_context {
            args.push("--context".to_string());
            args.push(effective_context_name.to_string());
        }
        if !self.cluster.is_empty()
            && (!use_current_context || self.cluster != current_context.cluster)
        {
            args.push("--cluster".to_string());
            args.push(self.cluster.clone());
        }
        if self.all_namespaces {
            args.push("--all-namespaces".to_string());
        } else if !namespace.is_empty() && namespace != current_namespace {
            args.push("--namespace".to_string());
            args.push(namespace.clone());
        }
        args.push("--v".to_string());
        args.push(self.verbosity.to_string());
        args.extend(self.args_after_dash.iter().cloned());

        info!("running: kubectl {}", args.join(" "));

        let code = executor.standard("kubectl", &args).await?;
        if code != 0 {
            return Err(Error::Passthrough(code));
        }

        if cancel.is_cancelled() {
            return Err(Error::Cancelled("command"));
        }

        Ok(())
    }
}
