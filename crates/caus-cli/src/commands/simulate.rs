use super::{load_graph, Session};
use anyhow::{bail, Result};
use caus_sdk::{parse_intervention, render_simulation, EffectReport, SimulateOptions};
use std::path::Path;

/// Execute the `simulate` command
///
/// Without an effect variable the engine's raw JSON is printed.
pub async fn execute(
    session: &Session,
    graph_path: &Path,
    expression: &str,
    horizon: i32,
    effect: Option<&str>,
) -> Result<()> {
    let intervention = parse_intervention(expression)?;
    if let Some(effect) = effect {
        if !session.variables.iter().any(|v| v.name == effect) {
            bail!("effect variable '{}' is not a configured variable", effect);
        }
    }
    let graph = load_graph(graph_path)?;

    let result = session
        .service
        .simulate(
            &session.variables,
            &session.window,
            SimulateOptions {
                graph,
                intervention: intervention.clone(),
                horizon,
            },
        )
        .await?;

    match effect {
        Some(effect) => {
            let report = EffectReport::from_result(&result, effect)?;
            print!("{}", render_simulation(&intervention, &report));
        }
        None => println!("{}", result.json),
    }
    Ok(())
}
