use anyhow::Result;
use clap::Parser;
use kstat::cli::commands::{Cli, Commands};
use kstat::cli::handlers::{
    handle_acl_command, handle_config_command, handle_group_command, handle_health_command, handle_info_command,
    handle_kgroup_command, handle_kmm2_command, handle_ktopic_command, handle_namespace_command,
    handle_partitions_command, handle_topic_command,
};
use kstat::cli::utils::{init_logging, load_config, print_about};

#[tokio::main]
async fn main() -> Result<()> {
    // .env may carry KSTAT_* defaults for the flags below
    dotenv::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose, &cli.log_format);

    if let Commands::About = cli.command {
        print_about();
        return Ok(());
    }

    let global = &cli.global;
    let config = load_config(global)?;

    // Execute command
    match cli.command {
        Commands::Topic { topic, sum, checks } => handle_topic_command(global, config, topic, sum, checks).await,

        Commands::Health { checks } => handle_health_command(global, config, checks).await,

        Commands::Group { group } => handle_group_command(global, config, group).await,

        Commands::Acl { topic } => handle_acl_command(global, config, topic).await,

        Commands::Config { number, null } => handle_config_command(global, config, number, null).await,

        Commands::Partitions { broker_list } => handle_partitions_command(global, config, broker_list).await,

        Commands::Info => handle_info_command(global, config).await,

        Commands::Ktopic { namespace, topics } => handle_ktopic_command(global, config, namespace, topics).await,

        Commands::Kgroup { namespace, group } => handle_kgroup_command(global, config, namespace, group).await,

        Commands::Namespace { namespace } => handle_namespace_command(global, config, namespace).await,

        Commands::Kmm2 { namespace } => handle_kmm2_command(global, config, namespace).await,

        Commands::About => {
            print_about();
            Ok(())
        }
    }
}
