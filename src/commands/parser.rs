//! CLI 命令行参数解析
//!
//! 使用 clap 定义命令行接口并进行参数解析

use crate::core::models::Category;
use clap::{Parser, Subcommand};
use std::ffi::OsString;
use std::path::PathBuf;

/// 配置管理动作
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigAction {
    /// Print the stored settings and where they live
    Show,

    /// Select the project directory scanned for scripts
    #[command(name = "set-project")]
    SetProject {
        #[arg(value_name = "DIR")]
        path: PathBuf,
    },

    /// Terminal executable used to host scripts on Windows
    #[command(name = "set-terminal")]
    SetTerminal {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },

    /// Activation script used for backend scripts
    #[command(name = "set-venv")]
    SetVenv {
        #[arg(value_name = "ACTIVATE")]
        path: PathBuf,
    },

    /// Go back to probing `.venv`/`venv` next to the script
    #[command(name = "clear-venv")]
    ClearVenv,
}

#[derive(Parser, Debug)]
#[command(
    name = "scripthub",
    about = "Run project shell scripts and watch their resource usage",
    version,
    disable_help_subcommand = true
)]
pub struct Cli {
    /// Log filter, e.g. `debug` or `scripthub=trace` (defaults to RUST_LOG)
    #[arg(long, global = true, value_name = "FILTER")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// List scripts of the selected project (default)
    List {
        /// Project directory (defaults to the stored one)
        #[arg(long, value_name = "DIR")]
        project: Option<PathBuf>,
        /// Only scripts under this top-level folder (`root` for the project directory itself)
        #[arg(long)]
        folder: Option<String>,
        /// Case-insensitive filter on name, folder and project-relative path
        #[arg(long)]
        search: Option<String>,
        /// Only favorites
        #[arg(long)]
        favorites: bool,
    },

    /// Launch a script and print live metrics until it exits or Ctrl-C
    Run {
        #[arg(value_name = "SCRIPT")]
        script: PathBuf,
        /// Overrides the stored or folder-derived category
        #[arg(long)]
        category: Option<Category>,
        #[arg(long, value_name = "DIR")]
        project: Option<PathBuf>,
    },

    /// 配置管理
    #[command(subcommand)]
    Config(ConfigAction),

    /// Toggle a script's favorite flag
    Favorite {
        #[arg(value_name = "SCRIPT")]
        script: PathBuf,
    },

    /// Store a script's category
    Category {
        #[arg(value_name = "SCRIPT")]
        script: PathBuf,
        #[arg(value_name = "CATEGORY")]
        category: Category,
    },
}

impl Commands {
    fn default_list() -> Self {
        Commands::List {
            project: None,
            folder: None,
            search: None,
            favorites: false,
        }
    }
}

impl Cli {
    /// 尝试解析命令行参数（用于测试或自定义 argv）
    pub fn try_parse_args_from<I, T>(iter: I) -> Result<(Option<String>, Commands), clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let cli = Cli::try_parse_from(iter)?;
        Ok((
            cli.log_level,
            cli.command.unwrap_or_else(Commands::default_list),
        ))
    }

    /// 解析命令行参数（失败时由 clap 处理错误输出和退出）
    pub fn parse_args() -> (Option<String>, Commands) {
        match Self::try_parse_args_from(std::env::args_os()) {
            Ok(parsed) => parsed,
            Err(err) => err.exit(),
        }
    }
}
