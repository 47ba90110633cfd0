//! Run command implementation
//!
//! Connects to the ensemble and hands over to the [`Supervisor`]

use std::sync::Arc;

use tracing::info;
use zkmutex_leader_election::{JobPaths, ZkSession};

use crate::error::CliResult;
use crate::job::CommandRunner;
use crate::supervisor::{Supervisor, SupervisorContext};
use crate::validate::ValidatedConfig;

/// Help text for the run command
pub const DESCRIPTION: &str = include_str!("description.md");

pub async fn handle_command(validated: ValidatedConfig) -> CliResult<i32> {
    let session = ZkSession::connect(&validated.address, validated.session_timeout).await?;
    info!(
        "Connected to {} for sync group {}",
        validated.ensemble, validated.sync_group
    );

    let context = SupervisorContext {
        coordinator: Arc::new(session),
        paths: JobPaths::new(&validated.sync_group),
        job: validated.job,
    };
    let supervisor = Supervisor::new(context, CommandRunner::new(validated.run_as));

    Ok(supervisor.run().await?)
}
