use super::Session;
use anyhow::Result;
use caus_sdk::{render_graph, DiscoverOptions};

/// Execute the `discover` command
pub async fn execute(session: &Session, options: DiscoverOptions, json: bool) -> Result<()> {
    let graph = session
        .service
        .discover(&session.variables, &session.window, options)
        .await?;

    if json {
        println!("{}", graph.to_json_pretty()?);
    } else {
        print!("{}", render_graph(&graph, session.window.step()));
    }
    Ok(())
}
