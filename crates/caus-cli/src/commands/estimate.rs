use super::{load_graph, Session};
use anyhow::Result;
use caus_sdk::render_estimation;
use std::path::Path;

/// Execute the `estimate` command
pub async fn execute(session: &Session, graph_path: &Path) -> Result<()> {
    let graph = load_graph(graph_path)?;
    let result = session
        .service
        .estimate(&session.variables, &session.window, graph)
        .await?;

    print!("{}", render_estimation(&result));
    Ok(())
}
