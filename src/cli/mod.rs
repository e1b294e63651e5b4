//! Command-line interface module
//!
//! This module handles argument parsing and output formatting.
//! It contains no business logic - that belongs in the [`crate::core`] module.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser};

use commands::{CommandContext, Commands};

/// Kojichain - dependency-aware chain builds on a Koji hub
///
/// Builds an SRPM after building whichever of its build requirements are
/// missing from the build tag, level by level.
#[derive(Parser, Debug)]
#[command(name = "kojichain")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output in JSON format for scripting
    #[arg(long, global = true)]
    pub json: bool,

    /// Use this config file instead of the one in the config directory
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub koji: KojiArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Build hub connection flags
#[derive(Args, Debug, Clone, Default)]
pub struct KojiArgs {
    /// Koji hub URL (default: from koji client config or Fedora Koji)
    #[arg(long, env = "KOJI_SERVER", global = true, value_name = "URL")]
    pub server: Option<String>,

    /// Koji web URL used for task links
    #[arg(long, global = true, value_name = "URL")]
    pub web_url: Option<String>,

    /// Client certificate for authentication
    #[arg(long, global = true, value_name = "FILE")]
    pub cert: Option<PathBuf>,

    /// CA certificate for server verification
    #[arg(long, global = true, value_name = "FILE")]
    pub serverca: Option<PathBuf>,

    /// Disable SSL certificate verification (insecure)
    #[arg(long, global = true)]
    pub no_ssl_verify: bool,
}

impl Cli {
    /// Execute the CLI command
    pub async fn run(self) -> Result<()> {
        if let Some(cmd) = self.command {
            let context = CommandContext::load(self.config.as_deref(), &self.koji)?;
            cmd.run(&context).await
        } else {
            // No subcommand provided, show help
            use clap::CommandFactory;
            let mut cmd = Self::command();
            cmd.print_help()?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_build_with_global_flags() {
        let cli = Cli::try_parse_from([
            "kojichain",
            "-vv",
            "build",
            "f40-candidate",
            "foo.src.rpm",
            "--server",
            "https://koji.example.org/kojihub",
            "--dry-run",
            "--jobs",
            "2",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(
            cli.koji.server.as_deref(),
            Some("https://koji.example.org/kojihub")
        );
        let Some(Commands::Build(args)) = cli.command else {
            panic!("expected build command");
        };
        assert_eq!(args.target, "f40-candidate");
        assert_eq!(args.srpm, "foo.src.rpm");
        assert!(args.dry_run);
        assert_eq!(args.jobs, Some(2));
    }

    #[test]
    fn test_parse_chain_requires_packages() {
        assert!(Cli::try_parse_from(["kojichain", "chain", "f40"]).is_err());
        let cli = Cli::try_parse_from(["kojichain", "chain", "f40", "a.src.rpm", "b.src.rpm"])
            .unwrap();
        let Some(Commands::Chain { srpms, .. }) = cli.command else {
            panic!("expected chain command");
        };
        assert_eq!(srpms.len(), 2);
    }

    #[test]
    fn test_parse_task_commands() {
        let cli = Cli::try_parse_from(["kojichain", "status", "12345", "--watch"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Status {
                task_id: 12345,
                watch: true
            })
        ));
        assert!(Cli::try_parse_from(["kojichain", "cancel", "not-a-number"]).is_err());
    }
}
