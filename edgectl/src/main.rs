use clap::{ArgAction, Args, CommandFactory, Parser, Subcommand};
use edgectl::{build, configs, docker, runtime, Settings};
use iothub::{HubClient, HubConfig};
use std::path::Path;

/// Build, registry, and deployment automation for the edge runtime
#[derive(Parser)]
#[command(name = "edgectl")]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the edge runtime on the device
    Runtime(RuntimeArgs),
    /// Build and deploy edge modules
    Modules(ModulesArgs),
    /// Container and registry maintenance
    Docker(DockerArgs),
}

#[derive(Args)]
struct RuntimeArgs {
    /// Install and configure the runtime from the runtime config file
    #[arg(long)]
    setup: bool,

    /// Start the runtime
    #[arg(long)]
    start: bool,

    /// Stop the runtime
    #[arg(long)]
    stop: bool,

    /// Stop, re-configure, and start the runtime
    #[arg(long)]
    restart: bool,

    /// Print the runtime status
    #[arg(long)]
    status: bool,

    /// Open a log stream per deployed module
    #[arg(long)]
    logs: bool,

    /// Mirror the runtime images into the configured registry
    #[arg(long)]
    set_container_registry: bool,

    /// Expand config files into the build directory first
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    set_config: bool,
}

#[derive(Args)]
struct ModulesArgs {
    /// Restore, build, containerize, and push the active modules
    #[arg(long)]
    build: bool,

    /// Apply the module deployment config to the device
    #[arg(long)]
    deploy: bool,

    /// Expand config files into the build directory first
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    set_config: bool,
}

#[derive(Args)]
struct DockerArgs {
    /// Ensure a local registry container is running
    #[arg(long)]
    setup_local_registry: bool,

    /// Remove all containers and all images
    #[arg(long)]
    clean: bool,

    /// Force-remove every container
    #[arg(long)]
    remove_containers: bool,

    /// Force-remove every image
    #[arg(long)]
    remove_images: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(error) = run().await {
        eprintln!("Error: {}", error);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let settings = Settings::from_env()?;

    match command {
        Commands::Runtime(args) => runtime_cmd(&settings, &args),
        Commands::Modules(args) => modules_cmd(&settings, &args).await,
        Commands::Docker(args) => docker_cmd(&settings, &args),
    }
}

fn runtime_cmd(settings: &Settings, args: &RuntimeArgs) -> Result<(), Box<dyn std::error::Error>> {
    if args.set_config {
        expand_configs()?;
    }

    if args.set_container_registry {
        runtime::set_container_registry(settings)?;
    }
    if args.setup {
        runtime::setup(settings)?;
    }
    if args.start {
        runtime::start(settings)?;
    }
    if args.stop {
        runtime::stop(settings)?;
    }
    if args.restart {
        runtime::restart(settings)?;
    }
    if args.status {
        runtime::status(settings)?;
    }
    if args.logs {
        runtime::logs(settings)?;
    }

    Ok(())
}

async fn modules_cmd(
    settings: &Settings,
    args: &ModulesArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    if args.set_config {
        expand_configs()?;
    }

    if args.build {
        docker::setup_registry(settings)?;
        build::build_modules(settings)?;
    }
    if args.deploy {
        deploy(settings).await?;
    }

    Ok(())
}

fn docker_cmd(settings: &Settings, args: &DockerArgs) -> Result<(), Box<dyn std::error::Error>> {
    if args.setup_local_registry {
        docker::setup_local_registry(settings)?;
    }

    let remove_containers = args.remove_containers || args.clean;
    let remove_images = args.remove_images || args.clean;
    if remove_containers {
        docker::remove_all_containers()?;
    }
    if remove_images {
        docker::remove_all_images()?;
    }

    Ok(())
}

fn expand_configs() -> Result<(), configs::ConfigError> {
    configs::expand_configs(
        Path::new(configs::CONFIG_DIR),
        Path::new(configs::BUILD_CONFIG_DIR),
    )
}

/// Push the module deployment config to the device through the hub API.
async fn deploy(settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    println!("Deploying edge module config");

    let client = HubClient::new(HubConfig {
        hub_name: settings.iothub_name.clone(),
        key: settings.iothub_key.clone(),
        policy_name: Some(settings.iothub_policy_name.clone()),
        api_version: settings.iot_rest_api_version.clone(),
    })?;

    let outcome = client
        .apply_configuration(
            &settings.edge_device_id,
            Path::new(&settings.modules_config_file),
        )
        .await?;

    println!("{}", outcome.url);
    println!("{}", outcome.status);
    println!("{}", outcome.body);

    if outcome.succeeded() {
        println!(
            "Configuration successfully applied. Run `docker logs edgeAgent -f` to see the change applied."
        );
    } else {
        println!(
            "There was an error applying the configuration. The response above should indicate the issue."
        );
    }

    Ok(())
}
