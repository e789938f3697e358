use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Input(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{context}: {source}")]
    Api {
        context: String,
        #[source]
        source: kube::Error,
    },

    #[error("failed to load kubeconfig [{path}]: {source}")]
    Kubeconfig {
        path: String,
        #[source]
        source: kube::config::KubeconfigError,
    },

    #[error("failed to create API client: {0}")]
    ClientBuild(#[source] kube::Error),

    #[error("failed to run [{program}]: {source}")]
    Exec {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("kubectl config {operation} failed: {stderr}")]
    KubectlConfig {
        operation: &'static str,
        stderr: String,
    },

    #[error("kubectl exited with code {0}")]
    Passthrough(i32),

    #[error("secret with service account's token not found")]
    TokenWaitTimeout,

    #[error("identity querier [{label}] did not finish: {source}")]
    Querier {
        label: &'static str,
        #[source]
        source: Box<Error>,
    },

    #[error("{0} cancelled")]
    Cancelled(&'static str),

    #[error("failed to write temporary ca.crt file: {0}")]
    CaCrtFile(#[source] std::io::Error),
}

impl Error {
    /// Wraps a cluster API error with the operation that produced it.
    pub fn api(context: impl Into<String>, source: kube::Error) -> Self {
        Error::Api {
            context: context.into(),
            source,
        }
    }

    /// Reports whether this error carries an already-exists rejection from
    /// the cluster API, which binding creation recovers from.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Error::Api { source, .. } if is_already_exists(source))
    }
}

/// Reports whether the API rejected a create because the object already exists.
pub fn is_already_exists(err: &kube::Error) -> bool {
    matches!(
        err,
        kube::Error::Api(kube::core::ErrorResponse { reason, .. }) if reason == "AlreadyExists"
    )
}

/// Reports whether the API answered not-found, which Get/List callers treat as
/// an empty result rather than a failure.
pub fn is_not_found(err: &kube::Error) -> bool {
    matches!(
        err,
        kube::Error::Api(kube::core::ErrorResponse { code, .. }) if *code == 404
    )
}
