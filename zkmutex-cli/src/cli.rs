use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands;

#[derive(Parser, Debug)]
#[command(name = "zkmutex")]
#[command(version)]
#[command(about = "Run a job on at most one host of a sync group at a time")]
#[command(long_about = "
zkmutex gates a job behind a ZooKeeper lock. Every participant that shares
a sync group creates a ballot under /<sync-group>/lock; the owner of the
smallest ballot runs the job while everybody else waits.

Configuration is read from zkmutex.{toml,yaml,yml,json} in /etc/zkmutex,
~/.zkmutex and the working directory, then from --config, then from
ZKMUTEX_ environment variables (ZKMUTEX_JOB__EXIT_POLICY=terminate).

Example usage:
  zkmutex check                                   # Validate and print the configuration
  zkmutex run                                     # Run the configured job
  zkmutex -c backup.toml run -p run-command       # Run once, then exit
  zkmutex run -j reindex -- /usr/bin/reindex -v   # Override the job on the command line
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file loaded after the discovered ones
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Join the election and run the job whenever the lock is held
    #[command(long_about = commands::run::DESCRIPTION)]
    Run {
        /// Job name, overrides job.name
        #[arg(short, long)]
        job: Option<String>,

        /// Exit policy, overrides job.exit_policy
        #[arg(short = 'p', long = "policy", value_name = "POLICY")]
        exit_policy: Option<String>,

        /// Command and arguments, override job.command and job.args
        #[arg(last = true, value_name = "CMD")]
        command: Vec<String>,
    },
    /// Validate the configuration and print it without connecting
    #[command(long_about = commands::check::DESCRIPTION)]
    Check,
}

impl Commands {
    /// Command line values merged over every configuration source
    pub fn overrides(&self) -> serde_json::Value {
        match self {
            Commands::Run {
                job,
                exit_policy,
                command,
            } => {
                let mut overrides = serde_json::json!({
                    "job": {
                        "name": job,
                        "exit_policy": exit_policy,
                    }
                });
                if !command.is_empty() {
                    overrides["job"]["command"] = serde_json::json!(command);
                    overrides["job"]["args"] = serde_json::json!([]);
                }
                overrides
            }
            Commands::Check => serde_json::json!({}),
        }
    }
}
