use async_trait::async_trait;
use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;
use kube::api::{Api, ListParams, PostParams};
use kube::Client;
#[cfg(test)]
use mockall::automock;

use crate::error::{is_not_found, Error, Result};

/// Access to service accounts.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ServiceAccountClient: Send + Sync {
    /// Returns the object if found or `None` if it does not exist.
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<corev1::ServiceAccount>>;

    /// Adds a service account based on only its namespace and account name.
    async fn create_basic(&self, namespace: &str, name: &str) -> Result<corev1::ServiceAccount>;

    /// Lists service accounts, optionally restricted by a field selector
    /// (empty = none). An empty namespace lists across all namespaces.
    /// Not-found yields an empty list.
    async fn list(
        &self,
        namespace: &str,
        field_selector: &str,
    ) -> Result<Vec<corev1::ServiceAccount>>;
}

pub struct DefaultClient {
    client: Client,
}

impl DefaultClient {
    pub fn new(client: Client) -> Self {
        DefaultClient { client }
    }

    fn api(&self, namespace: &str) -> Api<corev1::ServiceAccount> {
        if namespace.is_empty() {
            Api::all(self.client.clone())
        } else {
            Api::namespaced(self.client.clone(), namespace)
        }
    }
}

#[async_trait]
impl ServiceAccountClient for DefaultClient {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<corev1::ServiceAccount>> {
        Api::<corev1::ServiceAccount>::namespaced(self.client.clone(), namespace)
            .get_opt(name)
            .await
            .map_err(|source| {
                Error::api(
                    format!("failed to get service account [{name}] in namespace [{namespace}]"),
                    source,
                )
            })
    }

    async fn create_basic(&self, namespace: &str, name: &str) -> Result<corev1::ServiceAccount> {
        let account = corev1::ServiceAccount {
            metadata: metav1::ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        Api::<corev1::ServiceAccount>::namespaced(self.client.clone(), namespace)
            .create(&PostParams::default(), &account)
            .await
            .map_err(|source| {
                Error::api(
                    format!(
                        "failed to create service account [{name}] in namespace [{namespace}]"
                    ),
                    source,
                )
            })
    }

    async fn list(
        &self,
        namespace: &str,
        field_selector: &str,
    ) -> Result<Vec<corev1::ServiceAccount>> {
        let mut params = ListParams::default();
        if !field_selector.is_empty() {
            params = params.fields(field_selector);
        }

        match self.api(namespace).list(&params).await {
            Ok(list) => Ok(list.items),
            Err(err) if is_not_found(&err) => Ok(Vec::new()),
            Err(source) => Err(Error::api("failed to list service accounts", source)),
        }
    }
}
