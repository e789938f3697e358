use async_trait::async_trait;
use k8s_openapi::api::core::v1 as corev1;
use kube::api::Api;
use kube::Client;
#[cfg(test)]
use mockall::automock;

use crate::error::{Error, Result};

/// Read access to secrets.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SecretClient: Send + Sync {
    /// Returns the object if found or `None` if it does not exist.
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<corev1::Secret>>;
}

pub struct DefaultClient {
    client: Client,
}

impl DefaultClient {
    pub fn new(client: Client) -> Self {
        DefaultClient { client }
    }
}

#[async_trait]
impl SecretClient for DefaultClient {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<corev1::Secret>> {
        Api::<corev1::Secret>::namespaced(self.client.clone(), namespace)
            .get_opt(name)
            .await
            .map_err(|source| {
                Error::api(
                    format!("failed to get secret [{name}] in namespace [{namespace}]"),
                    source,
                )
            })
    }
}
