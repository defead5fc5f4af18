//! chartstep CLI - Helm 3 steps for bundle actions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use chartstep_core::Verb;
use chartstep_kube::settings::{
    DEFAULT_EXPORT_DIR, DEFAULT_HELM_BINARY, DEFAULT_KUBECTL_BINARY, DEFAULT_OUTPUTS_DIR,
};

mod commands;
mod error;
mod exit_codes;
mod util;

use commands::version::OutputFormat;
use error::Result;

#[derive(Parser)]
#[command(name = "chartstep")]
#[command(author = "chartstep Contributors")]
#[command(version)]
#[command(about = "Run Helm 3 steps for bundle install, upgrade, uninstall and custom actions", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,

    /// Chart tool binary
    #[arg(long, global = true, env = "CHARTSTEP_HELM_BINARY", default_value = DEFAULT_HELM_BINARY)]
    helm_binary: String,

    /// kubectl binary, used for resource outputs
    #[arg(long, global = true, env = "CHARTSTEP_KUBECTL_BINARY", default_value = DEFAULT_KUBECTL_BINARY)]
    kubectl_binary: String,

    /// Directory step outputs are written to
    #[arg(long, global = true, env = "CHARTSTEP_OUTPUTS_DIR", default_value = DEFAULT_OUTPUTS_DIR)]
    outputs_dir: PathBuf,

    /// Directory OCI charts are exported to before install
    #[arg(long, global = true, env = "CHARTSTEP_EXPORT_DIR", default_value = DEFAULT_EXPORT_DIR)]
    export_dir: String,

    /// Kubeconfig used for secret outputs
    #[arg(long, global = true, env = "KUBECONFIG")]
    kubeconfig: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the Dockerfile lines installing the chart tool
    Build,

    /// Install a chart, reading the step from stdin
    Install,

    /// Upgrade a release, reading the step from stdin
    Upgrade,

    /// Uninstall releases, reading the step from stdin
    Uninstall,

    /// Run a custom action, reading the step from stdin
    Invoke {
        /// Name of the custom action being run
        #[arg(long)]
        action: Option<String>,
    },

    /// Print the JSON Schema of step payloads
    Schema,

    /// Print version information
    Version {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Plaintext)]
        output: OutputFormat,
    },
}

#[tokio::main]
async fn main() {
    // Setup miette for nice error display
    miette::set_panic_hook();
    // Command lines in errors stay on one line. Installing only fails when a
    // hook is already set, which leaves the default handler in place.
    miette::set_hook(Box::new(|_| {
        Box::new(miette::MietteHandlerOpts::new().wrap_lines(false).build())
    }))
    .ok();

    let cli = Cli::parse();
    init_logging(cli.debug);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let settings = util::settings(&cli);

    match cli.command {
        Commands::Build => commands::build::run(settings),
        Commands::Install => commands::action::run(Verb::Install, settings).await,
        Commands::Upgrade => commands::action::run(Verb::Upgrade, settings).await,
        Commands::Uninstall => commands::action::run(Verb::Uninstall, settings).await,
        Commands::Invoke { action } => {
            if let Some(action) = &action {
                tracing::debug!(action = %action, "invoking custom action");
            }
            commands::action::run(Verb::Invoke, settings).await
        }
        Commands::Schema => commands::schema::run(),
        Commands::Version { output } => commands::version::run(output),
    }
}

/// Log directives enabled by `--debug`, limited to this workspace's crates
const DEBUG_FILTERS: &str = "chartstep=debug,chartstep_core=debug,chartstep_kube=debug";

/// `RUST_LOG` selects the level, `--debug` forces debug
fn init_logging(debug: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if debug {
        builder.parse_filters(DEBUG_FILTERS);
    }
    builder.target(env_logger::Target::Stderr).init();
}
