use arbor::cli::{
    handle_delete, handle_init, handle_instantiate, handle_move, handle_settings, handle_tree,
    handle_variables, Cli, Commands,
};
use arbor::config::{find_project_root, Config};
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn init_logging() {
    // A broken config file is reported by the command itself
    let config = Config::load(&find_project_root().join(".arbor")).unwrap_or_default();
    let filter = EnvFilter::try_new(config.log_filter()).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    init_logging();

    let result = match cli.command {
        Commands::Init => handle_init(),
        Commands::Instantiate {
            template,
            parent,
            name,
            vars,
            no_reference_warnings,
            json,
        } => handle_instantiate(&template, parent, name, vars, no_reference_warnings, json).await,
        Commands::Move {
            id,
            parent,
            root,
            index,
            json,
        } => handle_move(id, parent, root, index, json).await,
        Commands::Tree { id, json } => handle_tree(id, json),
        Commands::Variables { template, json } => handle_variables(&template, json),
        Commands::Settings { file } => handle_settings(&file),
        Commands::Delete { id } => handle_delete(id),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
