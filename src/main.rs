use scripthub::commands::{self, Cli, Commands, ListFilter};
use scripthub::error::LaunchError;
use scripthub::settings::SettingsStore;
use scripthub::utils::{init_logger, ConfigPaths};
use std::process::ExitCode;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let (log_level, command) = Cli::parse_args();

    let paths = match ConfigPaths::new() {
        Ok(paths) => paths,
        Err(err) => {
            eprintln!("{}", err);
            return ExitCode::from(1);
        }
    };
    if let Err(err) = init_logger(log_level.as_deref(), Some(paths.log_file.clone())) {
        eprintln!("Logging disabled: {}", err);
    }

    let store = SettingsStore::new(paths.config_file);
    match main_impl(&store, command).await {
        Ok(code) => code,
        Err(err) => {
            match err.downcast_ref::<LaunchError>() {
                Some(launch) => eprintln!("{}", launch.user_message()),
                None => eprintln!("{:#}", err),
            }
            ExitCode::from(1)
        }
    }
}

async fn main_impl(store: &SettingsStore, command: Commands) -> anyhow::Result<ExitCode> {
    match command {
        Commands::List {
            project,
            folder,
            search,
            favorites,
        } => {
            let filter = ListFilter {
                folder,
                search,
                favorites_only: favorites,
            };
            commands::list(store, project, &filter)?;
        }
        Commands::Run {
            script,
            category,
            project,
        } => return commands::run::run(store, &script, category, project).await,
        Commands::Config(action) => commands::config(store, &action)?,
        Commands::Favorite { script } => commands::favorite(store, &script)?,
        Commands::Category { script, category } => {
            commands::set_category(store, &script, category)?
        }
    }
    Ok(ExitCode::SUCCESS)
}
