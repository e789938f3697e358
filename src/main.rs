use std::process::exit;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use kube::config::KubeConfigOptions;
use kube::{Client, Config};
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing_subscriber::EnvFilter;

use kubeauth::add_user::AddUser;
use kubeauth::cluster::Clientset;
use kubeauth::ctl::Ctl;
use kubeauth::error::Error;
use kubeauth::exec::CommonExecutor;
use kubeauth::identity::Registry;
use kubeauth::kubeconfig::{ConfigClient, ConfigFile, DefaultConfigClient};

#[derive(Parser)]
#[command(
    name = "kubeauth",
    version,
    about = "Add users backed by service accounts and validate kubectl impersonation targets"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Add a service account and user/context to use its credentials
    AddUser(AddUserArgs),

    /// Run kubectl with additional input validation
    ///
    /// kubeauth ctl [kubectl sub-command] [kubeauth flags] -- [kubectl sub-command flags]
    Ctl(CtlArgs),
}

#[derive(Args)]
struct AddUserArgs {
    /// Name of service account to create
    #[arg(long, env = "KUBEAUTH_ACCOUNT")]
    account: String,

    /// Username/context to receive the service account's bearer token
    #[arg(long, env = "KUBEAUTH_USER")]
    user: String,

    /// Role binding to create (<role name>:<binding name>)
    #[arg(long = "role")]
    roles: Vec<String>,

    /// Cluster role binding to create (<role name>:<binding name>)
    #[arg(long = "cluster-role")]
    cluster_roles: Vec<String>,

    /// Cluster of the new context to create (default from current-context)
    #[arg(long, default_value = "")]
    cluster: String,

    /// Namespace to receive service account (default from current-context)
    #[arg(long, short = 'n', default_value = "")]
    namespace: String,

    /// kubectl config file to modify
    #[arg(long, env = "KUBEAUTH_KUBECONFIG", default_value = "")]
    kubeconfig: String,

    /// kubectl verbosity level
    #[arg(long = "v", default_value_t = 0)]
    verbosity: u8,
}

#[derive(Args)]
struct CtlArgs {
    /// User/ServiceAccount to impersonate
    #[arg(long = "as", default_value = "")]
    as_user: String,

    /// Group(s) to impersonate
    #[arg(long = "as-group")]
    as_groups: Vec<String>,

    /// Consider users in this --kubeconfig context (defaults to current-context)
    #[arg(long, default_value = "")]
    context: String,

    /// Pass to kubectl if the effective context's cluster matches, else error
    #[arg(long, default_value = "")]
    cluster: String,

    /// Include identities from only one namespace (default from --context)
    #[arg(long, short = 'n', default_value = "")]
    namespace: String,

    /// Include identities from any/no namespace
    #[arg(long)]
    all_namespaces: bool,

    /// kubectl config file to read
    #[arg(long, env = "KUBEAUTH_KUBECONFIG", default_value = "")]
    kubeconfig: String,

    /// kubectl verbosity level (and verbose kubeauth output for any level > 0)
    #[arg(long = "v", default_value_t = 0)]
    verbosity: u8,

    /// kubectl sub-command and arguments
    args: Vec<String>,

    /// Arguments forwarded to kubectl verbatim
    #[arg(last = true)]
    passthrough: Vec<String>,
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Builds an API client from the parsed config, honoring its cluster entries.
async fn api_client(config_file: &ConfigFile) -> Result<Client, Error> {
    let config =
        Config::from_custom_kubeconfig(config_file.config.clone(), &KubeConfigOptions::default())
            .await
            .map_err(|source| Error::Kubeconfig {
                path: config_file.path.display().to_string(),
                source,
            })?;

    Client::try_from(config).map_err(Error::ClientBuild)
}

async fn run(cli: Cli, cancel: &CancellationToken) -> Result<(), Error> {
    let executor = Arc::new(CommonExecutor);
    let config_client = DefaultConfigClient::new(executor.clone());

    match cli.command {
        Command::AddUser(args) => {
            let config_file = config_client.parse(&args.kubeconfig)?;
            let clientset = Clientset::new(api_client(&config_file).await?);

            let handler = AddUser {
                account: args.account,
                username: args.user,
                cluster: args.cluster,
                namespace: args.namespace,
                roles: args.roles,
                cluster_roles: args.cluster_roles,
            };
            handler
                .run(cancel, &clientset, &config_client, &config_file)
                .await
        }
        Command::Ctl(args) => {
            let config_file = config_client.parse(&args.kubeconfig)?;
            let clientset = Arc::new(Clientset::new(api_client(&config_file).await?));
            let registry = Registry::new(clientset.clone());

            let handler = Ctl {
                as_user: args.as_user,
                as_groups: args.as_groups,
                cluster: args.cluster,
                context: args.context,
                namespace: args.namespace,
                all_namespaces: args.all_namespaces,
                verbosity: args.verbosity,
                args_before_dash: args.args,
                args_after_dash: args.passthrough,
            };
            handler
                .run(cancel, &clientset, &registry, &config_file, executor.as_ref())
                .await
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let verbosity = match &cli.command {
        Command::AddUser(args) => args.verbosity,
        Command::Ctl(args) => args.verbosity,
    };
    init_tracing(verbosity);

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_cancel.cancel();
        }
    });

    match run(cli, &cancel).await {
        Ok(()) => {}
        Err(Error::Passthrough(code)) => exit(code),
        Err(err) => {
            error!("kubeauth: {:#}", anyhow::Error::new(err));
            exit(1);
        }
    }
}
