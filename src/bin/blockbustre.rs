use anyhow::Result;
use blockbustre::cli::{actions, actions::Action, start, telemetry};

// Main function
#[tokio::main]
async fn main() -> Result<()> {
    // Start the program
    let action = start()?;

    // Handle the action
    let result = match action {
        Action::Server(args) => actions::server::handle(args).await,
        Action::SeedRoles { dsn } => actions::seed_roles::handle(dsn).await,
    };

    telemetry::shutdown_tracer();

    result
}
