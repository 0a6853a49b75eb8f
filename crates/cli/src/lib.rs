pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "permbot",
    about = "Permbot operator CLI",
    long_about = "Inspect permbot configuration, check Slack readiness, and preview permission-filtered menus without connecting to Slack.",
    after_help = "Examples:\n  permbot doctor --json\n  permbot config\n  permbot demo\n  permbot menu --user U123 --grant read_status --grant deployment"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, Slack token readiness, and rate-limit settings")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Render the command menu for the admin, developer, basic and no-permission personas")]
    Demo,
    #[command(about = "Print the Block Kit JSON of the menu a user with the given grants would see")]
    Menu {
        #[arg(long, default_value = "U000000", help = "Slack user id to render the menu for")]
        user: String,
        #[arg(
            long = "grant",
            value_name = "PERMISSION",
            help = "Permission to grant before rendering; repeat for several"
        )]
        grants: Vec<String>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => commands::config::run(),
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Demo => commands::demo::run(),
        Command::Menu { user, grants } => commands::menu::run(&user, &grants),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
