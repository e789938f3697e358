//! Reusable fixtures for the workflow and querier tests.
//!
//! Most values carry the `kubeauth-testkit` prefix to clarify their origin
//! when they surface in assertion failures and error messages.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::api::rbac::v1 as rbacv1;
use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;
use k8s_openapi::ByteString;
use kube::config::{Cluster, Context, Kubeconfig, NamedCluster, NamedContext};

use crate::cluster::cluster_role::MockClusterRoleClient;
use crate::cluster::cluster_role_binding::MockClusterRoleBindingClient;
use crate::cluster::namespace::MockNamespaceClient;
use crate::cluster::role::MockRoleClient;
use crate::cluster::role_binding::MockRoleBindingClient;
use crate::cluster::secret::MockSecretClient;
use crate::cluster::service_account::MockServiceAccountClient;
use crate::cluster::Clientset;
use crate::kubeconfig::ConfigFile;

pub const PREFIX: &str = "kubeauth-testkit";

// Explicit CLI flag selections.
pub const CLUSTER_NAME: &str = "kubeauth-testkit-explicit-cluster";
pub const CLUSTER_ROLE_BIND_NAME: &str = "kubeauth-testkit-cluster-role-bind";
pub const CLUSTER_ROLE_NAME: &str = "kubeauth-testkit-cluster-role";
pub const CONFIG_FILENAME: &str = "kubeauth-testkit-kubeconfig";
pub const CONTEXT_NAME: &str = "kubeauth-testkit-explicit-context";
pub const GROUP_NAME: &str = "kubeauth-testkit-group";
pub const NAMESPACE: &str = "kubeauth-testkit-explicit-namespace";
pub const SERVICE_ACCOUNT_NAME: &str = "kubeauth-testkit-test-sa";

// Missing CLI flag selections which default to the "current" configs.
pub const CURRENT_CLUSTER_NAME: &str = "kubeauth-testkit-current-cluster";
pub const CURRENT_CONTEXT_NAME: &str = "kubeauth-testkit-current-context";
pub const CURRENT_NAMESPACE: &str = "kubeauth-testkit-current-namespace";
pub const USERNAME: &str = "kubeauth-testkit-username";

// Unsorted fixtures.
pub const ROLE_BIND_NAME: &str = "kubeauth-testkit-role-bind";
pub const ROLE_NAME: &str = "kubeauth-testkit-role";
pub const SECRET_NAME_SUFFIX: &str = "-token-1abcd";
pub const SERVER: &str = "kubeauth-testkit-server";
pub const CA_CRT: &[u8] = b"kubeauth-testkit-ca-crt";
pub const TOKEN: &[u8] = b"kubeauth-testkit-token";

/// Returns a Clientset whose sub-clients are all fresh mocks with no
/// expectations. Tests replace the fields they interact with.
pub fn clientset() -> Clientset {
    Clientset {
        cluster_roles: Box::new(MockClusterRoleClient::new()),
        cluster_role_bindings: Box::new(MockClusterRoleBindingClient::new()),
        namespaces: Box::new(MockNamespaceClient::new()),
        roles: Box::new(MockRoleClient::new()),
        role_bindings: Box::new(MockRoleBindingClient::new()),
        secrets: Box::new(MockSecretClient::new()),
        service_accounts: Box::new(MockServiceAccountClient::new()),
    }
}

/// Builds a kubeconfig document with the "current" entries plus, when the
/// inputs differ from the current names, an additional context/cluster pair.
pub fn kubeconfig(context: &str, cluster: &str, namespace: &str) -> Kubeconfig {
    let mut config = Kubeconfig {
        current_context: Some(CURRENT_CONTEXT_NAME.to_string()),
        clusters: vec![NamedCluster {
            name: CURRENT_CLUSTER_NAME.to_string(),
            cluster: Some(Cluster {
                server: Some(SERVER.to_string()),
                ..Default::default()
            }),
        }],
        contexts: vec![NamedContext {
            name: CURRENT_CONTEXT_NAME.to_string(),
            context: Some(Context {
                cluster: CURRENT_CLUSTER_NAME.to_string(),
                user: USERNAME.to_string(),
                namespace: Some(CURRENT_NAMESPACE.to_string()),
                ..Default::default()
            }),
        }],
        ..Default::default()
    };

    if context != CURRENT_CONTEXT_NAME {
        config.contexts.push(NamedContext {
            name: context.to_string(),
            context: Some(Context {
                cluster: cluster.to_string(),
                user: USERNAME.to_string(),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            }),
        });
    }

    if cluster != CURRENT_CLUSTER_NAME {
        config.clusters.push(NamedCluster {
            name: cluster.to_string(),
            cluster: Some(Cluster {
                server: Some(SERVER.to_string()),
                ..Default::default()
            }),
        });
    }

    config
}

/// Like `kubeconfig`, wrapped as a parsed file.
pub fn config_file(context: &str, cluster: &str, namespace: &str) -> ConfigFile {
    ConfigFile {
        path: CONFIG_FILENAME.into(),
        config: kubeconfig(context, cluster, namespace),
    }
}

pub fn namespace_obj(name: &str) -> corev1::Namespace {
    corev1::Namespace {
        metadata: metav1::ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn subject(kind: &str, name: &str, namespace: Option<&str>) -> rbacv1::Subject {
    rbacv1::Subject {
        api_group: None,
        kind: kind.to_string(),
        name: name.to_string(),
        namespace: namespace.map(String::from),
    }
}

pub fn role_binding(
    namespace: &str,
    name: &str,
    subjects: Vec<rbacv1::Subject>,
) -> rbacv1::RoleBinding {
    rbacv1::RoleBinding {
        metadata: metav1::ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        role_ref: rbacv1::RoleRef {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "Role".to_string(),
            name: ROLE_NAME.to_string(),
        },
        subjects: Some(subjects),
    }
}

pub fn cluster_role_binding(name: &str, subjects: Vec<rbacv1::Subject>) -> rbacv1::ClusterRoleBinding {
    rbacv1::ClusterRoleBinding {
        metadata: metav1::ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        role_ref: rbacv1::RoleRef {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "ClusterRole".to_string(),
            name: CLUSTER_ROLE_NAME.to_string(),
        },
        subjects: Some(subjects),
    }
}

pub fn service_account(
    namespace: &str,
    name: &str,
    secret_names: &[&str],
) -> corev1::ServiceAccount {
    let secrets: Vec<corev1::ObjectReference> = secret_names
        .iter()
        .map(|secret| corev1::ObjectReference {
            name: Some(secret.to_string()),
            ..Default::default()
        })
        .collect();

    corev1::ServiceAccount {
        metadata: metav1::ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        secrets: if secrets.is_empty() { None } else { Some(secrets) },
        ..Default::default()
    }
}

/// Builds the token secret for a service account. Either data key can be
/// withheld to exercise the fatal paths.
pub fn token_secret(namespace: &str, name: &str, with_ca: bool, with_token: bool) -> corev1::Secret {
    let mut data = BTreeMap::new();
    if with_ca {
        data.insert("ca.crt".to_string(), ByteString(CA_CRT.to_vec()));
    }
    if with_token {
        data.insert("token".to_string(), ByteString(TOKEN.to_vec()));
    }

    corev1::Secret {
        metadata: metav1::ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        data: Some(data),
        ..Default::default()
    }
}

/// Name of the token secret the token controller would attach.
pub fn token_secret_name(account: &str) -> String {
    format!("{account}{SECRET_NAME_SUFFIX}")
}
