use std::sync::Arc;

use futures::future;
use tokio_util::sync::CancellationToken;

use crate::cluster::Clientset;
use crate::error::{Error, Result};
use crate::identity::querier::{
    ClusterRoleSubjectQuerier, ConfigUserQuerier, CoreGroupQuerier, CoreUserQuerier, Querier,
    RoleSubjectQuerier, ServiceAccountGroupQuerier, ServiceAccountUserQuerier,
};
use crate::identity::query::Query;
use crate::identity::{Identity, IdentityList};

/// The resolution engine: dispatches a query to every compatible querier in
/// parallel and aggregates their results.
pub struct Registry {
    pub core_group: Box<dyn Querier>,
    pub core_user: Box<dyn Querier>,
    pub role_subject: Box<dyn Querier>,
    pub cluster_role_subject: Box<dyn Querier>,
    pub service_account_user: Box<dyn Querier>,
    pub service_account_group: Box<dyn Querier>,
    pub config_user: Box<dyn Querier>,

    pub clientset: Arc<Clientset>,
}

impl Registry {
    /// Builds a registry over the standard querier set.
    pub fn new(clientset: Arc<Clientset>) -> Self {
        Registry {
            core_group: Box::new(CoreGroupQuerier),
            core_user: Box::new(CoreUserQuerier),
            role_subject: Box::new(RoleSubjectQuerier),
            cluster_role_subject: Box::new(ClusterRoleSubjectQuerier),
            service_account_user: Box::new(ServiceAccountUserQuerier),
            service_account_group: Box::new(ServiceAccountGroupQuerier),
            config_user: Box::new(ConfigUserQuerier),
            clientset,
        }
    }

    /// Runs the query against all compatible queriers concurrently.
    ///
    /// The first querier error cancels the remaining in-flight queriers and
    /// is returned wrapped with the querier's label. On success the merged
    /// list carries every item from every querier, each stamped with its
    /// producer's label; ordering across queriers is unspecified.
    pub async fn query(&self, cancel: &CancellationToken, query: Query) -> Result<IdentityList> {
        let mut candidates: Vec<&dyn Querier> = vec![
            self.core_group.as_ref(),
            self.core_user.as_ref(),
            self.role_subject.as_ref(),
            self.cluster_role_subject.as_ref(),
            self.service_account_user.as_ref(),
            self.service_account_group.as_ref(),
        ];

        if query.config.is_some() {
            candidates.push(self.config_user.as_ref());
        }

        let query = &query;
        let tasks = candidates
            .into_iter()
            .filter(|querier| querier.compatible(query))
            .map(|querier| async move {
                let label = querier.label();
                let list = querier
                    .query(cancel, &self.clientset, query)
                    .await
                    .map_err(|source| Error::Querier {
                        label,
                        source: Box::new(source),
                    })?;

                let items: Vec<Identity> = list
                    .items
                    .into_iter()
                    .map(|mut item| {
                        item.querier = label;
                        item
                    })
                    .collect();
                Ok::<_, Error>(items)
            });

        let mut full = IdentityList::default();
        for items in future::try_join_all(tasks).await? {
            full.items.extend(items);
        }

        Ok(full)
    }
}
