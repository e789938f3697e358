//! The add-user workflow: create a service account, bind it to roles, wait
//! for its bearer token to materialize, and persist a kubeconfig user and
//! context which authenticate with that token.

use std::io::Write;
use std::time::Duration;

use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::api::rbac::v1 as rbacv1;
use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cluster::Clientset;
use crate::error::{Error, Result};
use crate::kinds::Kind;
use crate::kubeconfig::{ConfigClient, ConfigFile};
use crate::names::BindingSelector;

/// Backoff schedule for the token-materialization wait. The sleep at each
/// attempt is the duration plus an amount chosen uniformly at random from
/// `[0, duration]`.
const TOKEN_WAIT_INITIAL: Duration = Duration::from_millis(100);
const TOKEN_WAIT_FACTOR: u32 = 2;
const TOKEN_WAIT_STEPS: u32 = 5;

/// Inputs of the add-user workflow.
pub struct AddUser {
    /// Name of the service account to create.
    pub account: String,

    /// Username/context to receive the service account's bearer token.
    pub username: String,

    /// Cluster of the new context (default from current-context).
    pub cluster: String,

    /// Namespace to receive the service account (default from
    /// current-context).
    pub namespace: String,

    /// Role bindings to create, in `<role name>:<binding name>` form.
    pub roles: Vec<String>,

    /// Cluster role bindings to create, in `<role name>:<binding name>` form.
    pub cluster_roles: Vec<String>,
}

impl AddUser {
    pub async fn run(
        &self,
        cancel: &CancellationToken,
        clientset: &Clientset,
        config_client: &dyn ConfigClient,
        config_file: &ConfigFile,
    ) -> Result<()> {
        check_cancelled(cancel)?;

        // Apply current-context defaults, mirroring kubectl's handling of
        // --namespace.

        let cluster = if self.cluster.is_empty() {
            config_file.current_cluster()?.0.to_string()
        } else {
            self.cluster.clone()
        };

        let namespace = if self.namespace.is_empty() {
            let (_, context) = config_file.current_context()?;
            context.namespace.clone().unwrap_or_default()
        } else {
            self.namespace.clone()
        };

        // Validate every selector before touching the cluster so the
        // operator sees all problems in one run.

        let role_bindings = parse_selectors(&self.roles, "--role")?;
        let cluster_role_bindings = parse_selectors(&self.cluster_roles, "--cluster-role")?;

        let mut missing = Vec::new();
        for selector in &role_bindings {
            if clientset
                .roles
                .get(&namespace, &selector.role_name)
                .await?
                .is_none()
            {
                missing.push(selector.role_name.clone());
            }
        }
        if !missing.is_empty() {
            return Err(Error::NotFound(format!("role(s) not found: {missing:?}")));
        }

        let mut missing = Vec::new();
        for selector in &cluster_role_bindings {
            if clientset
                .cluster_roles
                .get(&selector.role_name)
                .await?
                .is_none()
            {
                missing.push(selector.role_name.clone());
            }
        }
        if !missing.is_empty() {
            return Err(Error::NotFound(format!(
                "cluster role(s) not found: {missing:?}"
            )));
        }

        // Create the service account if needed.

        let mut account = match clientset
            .service_accounts
            .get(&namespace, &self.account)
            .await?
        {
            Some(existing) => {
                info!("service account already exists");
                existing
            }
            None => {
                clientset
                    .service_accounts
                    .create_basic(&namespace, &self.account)
                    .await?
            }
        };

        // Wait for the token secret reference. The create call may return
        // before the token controller has attached the token, so poll the
        // account until a secret with the "<account>-token-" naming
        // convention appears.

        let mut token_secret = token_secret_name(&account, &self.account);

        if token_secret.is_none() {
            let mut duration = TOKEN_WAIT_INITIAL;
            for attempt in 1..=TOKEN_WAIT_STEPS {
                let jitter = rand::thread_rng().gen_range(Duration::ZERO..=duration);
                sleep_or_cancel(cancel, duration + jitter).await?;

                debug!("polling for service account token (attempt {attempt})");
                account = clientset
                    .service_accounts
                    .get(&namespace, &self.account)
                    .await?
                    .ok_or_else(|| {
                        Error::NotFound(format!(
                            "service account [{}] not found in namespace [{namespace}]",
                            self.account
                        ))
                    })?;

                token_secret = token_secret_name(&account, &self.account);
                if token_secret.is_some() {
                    break;
                }

                duration *= TOKEN_WAIT_FACTOR;
            }
        }

        let Some(secret_name) = token_secret else {
            return Err(Error::TokenWaitTimeout);
        };

        // Bind the service account to the selected roles, if any. A binding
        // which already exists is left alone so the command can be re-run.

        for selector in &role_bindings {
            let subject = rbacv1::Subject {
                api_group: None,
                kind: Kind::ServiceAccount.as_str().to_string(),
                name: self.account.clone(),
                namespace: None,
            };
            match clientset
                .role_bindings
                .create(
                    &namespace,
                    &selector.binding_name,
                    &selector.role_name,
                    subject,
                )
                .await
            {
                Ok(_) => {}
                Err(err) if err.is_already_exists() => {
                    info!("role binding [{}] already exists", selector.binding_name);
                }
                Err(err) => return Err(err),
            }
        }

        for selector in &cluster_role_bindings {
            let subject = rbacv1::Subject {
                api_group: None,
                kind: Kind::ServiceAccount.as_str().to_string(),
                name: self.account.clone(),
                namespace: Some(namespace.clone()),
            };
            match clientset
                .cluster_role_bindings
                .create(&selector.binding_name, &selector.role_name, subject)
                .await
            {
                Ok(_) => {}
                Err(err) if err.is_already_exists() => {
                    info!(
                        "cluster role binding [{}] already exists",
                        selector.binding_name
                    );
                }
                Err(err) => return Err(err),
            }
        }

        // Retrieve the token secret and keep its CA certificate in a
        // temporary file for the remainder of the workflow.

        let secret = clientset
            .secrets
            .get(&namespace, &secret_name)
            .await?
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "service account's secret [{secret_name}] not found"
                ))
            })?;

        let data = secret.data.unwrap_or_default();
        let ca_crt = data.get("ca.crt").ok_or_else(|| {
            Error::NotFound(format!(
                "service account's secret [{secret_name}] does not contain 'ca.crt' data"
            ))
        })?;
        let token = data.get("token").ok_or_else(|| {
            Error::NotFound(format!(
                "service account's secret [{secret_name}] does not contain 'token' data"
            ))
        })?;

        // The handle removes the file on every exit path out of this scope.
        let mut ca_crt_file = tempfile::Builder::new()
            .prefix("kubeauth.")
            .suffix(".ca.crt")
            .tempfile()
            .map_err(Error::CaCrtFile)?;
        ca_crt_file.write_all(&ca_crt.0).map_err(Error::CaCrtFile)?;
        ca_crt_file.flush().map_err(Error::CaCrtFile)?;

        // Add/update the user and its context in the config file.

        config_client
            .upsert_user_token(config_file, &self.username, &token.0)
            .await?;

        config_client
            .upsert_context(
                config_file,
                &self.username,
                &cluster,
                &namespace,
                &self.username,
            )
            .await?;

        info!(
            "user [{}] now authenticates as service account [{}]",
            self.username, self.account
        );

        Ok(())
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled("add-user"));
    }
    Ok(())
}

async fn sleep_or_cancel(cancel: &CancellationToken, duration: Duration) -> Result<()> {
    tokio::select! {
        _ = cancel.cancelled() => Err(Error::Cancelled("token wait")),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

/// Parses all selectors, batching grammar failures into one error.
fn parse_selectors(selectors: &[String], flag: &str) -> Result<Vec<BindingSelector>> {
    let mut parsed = Vec::new();
    let mut invalid = Vec::new();

    for selector in selectors {
        match BindingSelector::parse(selector) {
            Ok(binding) => parsed.push(binding),
            Err(err) => invalid.push(err.to_string()),
        }
    }

    if !invalid.is_empty() {
        return Err(Error::Input(format!(
            "invalid {flag} selectors: {invalid:?}"
        )));
    }

    Ok(parsed)
}

/// Returns the name of the first secret following the auto-generated token
/// naming convention "<account name>-token-<random>", if any. Other secrets
/// may precede it in the reference list, so the position is not assumed.
fn token_secret_name(account: &corev1::ServiceAccount, name: &str) -> Option<String> {
    let prefix = format!("{name}-token-");
    account
        .secrets
        .iter()
        .flatten()
        .filter_map(|reference| reference.name.as_ref())
        .find(|secret| secret.starts_with(&prefix))
        .cloned()
}
