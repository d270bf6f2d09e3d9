//! This module defines the command line arguments Emporium accepts.

use std::path::PathBuf;
use termcolor::ColorChoice;

use crate::{cmd, db::cmd::DbCommand};


#[derive(Debug, clap::Parser)]
#[clap(about = "GraphQL API server of the Emporium e-commerce platform.")]
pub(crate) struct Args {
    #[clap(subcommand)]
    pub(crate) cmd: Command,

    /// Whether to use colors when printing to stdout and stderr. Possible
    /// values: 'always', 'auto', 'never'.
    #[clap(long, default_value = "auto", value_parser = parse_color_choice)]
    pub(crate) color: ColorChoice,
}

#[derive(Debug, clap::Subcommand)]
pub(crate) enum Command {
    /// Starts the HTTP server serving the GraphQL API.
    Serve {
        #[clap(flatten)]
        shared: Shared,
    },

    /// Database operations.
    Db {
        #[clap(subcommand)]
        cmd: DbCommand,

        #[clap(flatten)]
        shared: Shared,
    },

    /// Manages staff and customer accounts.
    User {
        #[clap(subcommand)]
        cmd: cmd::users::UserCommand,

        #[clap(flatten)]
        shared: Shared,
    },

    /// Manages service accounts that talk to the API with a token.
    ServiceAccount {
        #[clap(subcommand)]
        cmd: cmd::users::ServiceAccountCommand,

        #[clap(flatten)]
        shared: Shared,
    },

    /// Checks config, DB connection and the API schema to find problems in
    /// Emporium's environment.
    ///
    /// Useful for updates as you can catch many errors early, without needing
    /// to restart the running process. Exits with 0 if everything is Ok, and
    /// with 1 otherwise.
    Check {
        #[clap(flatten)]
        shared: Shared,
    },

    /// Outputs a template for the configuration file (which includes
    /// descriptions or all options).
    WriteConfig {
        /// Target file. If not specified, the template is written to stdout.
        target: Option<PathBuf>,
    },

    /// Exports the API as GraphQL schema.
    ExportApiSchema {
        #[clap(flatten)]
        args: cmd::export_api_schema::Args,
    },
}

#[derive(Debug, clap::Args)]
pub(crate) struct Shared {
    /// Path to the configuration file. If this is not specified, Emporium will
    /// try opening `config.toml` or `/etc/emporium/config.toml`.
    #[clap(short, long)]
    pub(crate) config: Option<PathBuf>,
}

impl Args {
    pub(crate) fn stdout_color(&self) -> ColorChoice {
        if self.color == ColorChoice::Auto && !std::io::IsTerminal::is_terminal(&std::io::stdout()) {
            ColorChoice::Never
        } else {
            self.color
        }
    }

    pub(crate) fn stderr_color(&self) -> ColorChoice {
        if self.color == ColorChoice::Auto && !std::io::IsTerminal::is_terminal(&std::io::stderr()) {
            ColorChoice::Never
        } else {
            self.color
        }
    }
}

impl Command {
    /// Short name used to substitute `${cmd}` in the log file path.
    pub(crate) fn log_name(&self) -> &'static str {
        match self {
            Command::Serve { .. } => "serve",
            _ => "other",
        }
    }
}

fn parse_color_choice(s: &str) -> Result<ColorChoice, &'static str> {
    match s {
        "always" => Ok(ColorChoice::Always),
        "auto" => Ok(ColorChoice::Auto),
        "never" => Ok(ColorChoice::Never),
        _ => Err("invalid color choice: possible values are 'always', 'auto' and 'never'"),
    }
}
