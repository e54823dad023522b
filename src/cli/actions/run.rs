use super::{client, server, Action};
use crate::cli::telemetry;
use anyhow::Result;

pub(super) async fn execute(action: Action) -> Result<()> {
    let result = match action {
        Action::Server(args) => server::execute(args).await,
        Action::Client(args) => client::execute(args).await,
    };

    telemetry::shutdown_tracer();

    result
}
