use std::sync::Arc;

use clap::{Parser, Subcommand};
use log::LevelFilter;

use kubeasy::config::DebugInfo;
use kubeasy::menu::filter_by_permissions;
use kubeasy::utils::logging::init_logger;
use kubeasy::{ConfigResolver, FileStore, KeyValueStore, KubeEasy, Settings, StorageError};

/// Inspect and switch the KubeEasy data backend.
#[derive(Parser)]
#[command(name = "kubeasy", version)]
struct Args {
    /// Page URL whose `mock` query parameter takes precedence.
    #[arg(long)]
    url: Option<String>,
    #[arg(long)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the active backend and where the choice came from.
    Status,
    /// Force the synthetic backend.
    Enable,
    /// Force the live backend.
    Disable,
    /// Forget the persisted choice.
    Reset,
    /// Print the menu visible with the given permissions.
    Menus { permissions: Vec<String> },
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    if let Err(e) = run(args).await {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), String> {
    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    match init_logger(level) {
        Ok(path) => log::debug!("logging to {}", path.display()),
        Err(e) => eprintln!("[startup] file logging disabled: {}", e),
    }

    let settings = Settings::load().await;
    let kv: Arc<dyn KeyValueStore> = Arc::new(
        FileStore::open(FileStore::default_path())
            .map_err(|e| format!("Failed to open storage: {}", e))?,
    );

    let resolver = |url: Option<String>| ConfigResolver::new(&settings, Arc::clone(&kv), url);
    match args.command {
        Command::Status => print_status(&resolver(args.url).debug_info()),
        Command::Enable => switch(resolver(args.url), |c| c.set_enabled(true)),
        Command::Disable => switch(resolver(args.url), |c| c.set_enabled(false)),
        Command::Reset => switch(resolver(args.url), ConfigResolver::reset),
        Command::Menus { permissions } => {
            let app = KubeEasy::start(settings, kv, args.url)
                .await
                .map_err(|e| e.to_string())?;
            let menus = app.menus().menus();
            let visible = if permissions.is_empty() {
                menus.as_ref().clone()
            } else {
                filter_by_permissions(&menus, &permissions)
            };
            for group in &visible {
                println!("{} {}", group.icon, group.title);
                for item in &group.children {
                    println!(
                        "    {} {:<16} {}",
                        item.icon,
                        item.title,
                        item.path.as_deref().unwrap_or("-")
                    );
                }
            }
            app.shutdown().await;
            Ok(())
        }
    }
}

fn switch<F>(config: ConfigResolver, apply: F) -> Result<(), String>
where
    F: FnOnce(&ConfigResolver) -> Result<(), StorageError>,
{
    apply(&config).map_err(|e| format!("Failed to persist setting: {}", e))?;
    print_status(&config.debug_info())
}

fn print_status(info: &DebugInfo) -> Result<(), String> {
    let json = serde_json::to_string_pretty(info)
        .map_err(|e| format!("Failed to render status: {}", e))?;
    println!("{}", json);
    Ok(())
}
