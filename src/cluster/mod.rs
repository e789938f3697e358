//! Typed clients for the identity-bearing API objects.
//!
//! Each sub-client narrows the API surface to the calls the workflows need
//! and normalizes not-found results: Get returns `Ok(None)` and List returns
//! an empty list instead of an error.

pub mod cluster_role;
pub mod cluster_role_binding;
pub mod namespace;
pub mod role;
pub mod role_binding;
pub mod secret;
pub mod service_account;

use kube::Client;

pub use cluster_role::ClusterRoleClient;
pub use cluster_role_binding::ClusterRoleBindingClient;
pub use namespace::NamespaceClient;
pub use role::RoleClient;
pub use role_binding::RoleBindingClient;
pub use secret::SecretClient;
pub use service_account::ServiceAccountClient;

/// Customized clients to kubernetes API objects.
///
/// Its naming is modeled after client-go's Clientset. One value is built per
/// invocation and shared by reference across queriers; all sub-clients are
/// safe for concurrent read-only use.
pub struct Clientset {
    pub cluster_roles: Box<dyn ClusterRoleClient>,
    pub cluster_role_bindings: Box<dyn ClusterRoleBindingClient>,
    pub namespaces: Box<dyn NamespaceClient>,
    pub roles: Box<dyn RoleClient>,
    pub role_bindings: Box<dyn RoleBindingClient>,
    pub secrets: Box<dyn SecretClient>,
    pub service_accounts: Box<dyn ServiceAccountClient>,
}

impl Clientset {
    pub fn new(client: Client) -> Self {
        Clientset {
            cluster_roles: Box::new(cluster_role::DefaultClient::new(client.clone())),
            cluster_role_bindings: Box::new(cluster_role_binding::DefaultClient::new(
                client.clone(),
            )),
            namespaces: Box::new(namespace::DefaultClient::new(client.clone())),
            roles: Box::new(role::DefaultClient::new(client.clone())),
            role_bindings: Box::new(role_binding::DefaultClient::new(client.clone())),
            secrets: Box::new(secret::DefaultClient::new(client.clone())),
            service_accounts: Box::new(service_account::DefaultClient::new(client)),
        }
    }
}
