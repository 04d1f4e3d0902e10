use anyhow::Result;

use namo::orchestrator::ReflectionOrchestrator;

/// Run a single turn and print the full response as JSON.
pub async fn submit(orchestrator: &ReflectionOrchestrator, text: &str, pretty: bool) -> Result<()> {
    let response = orchestrator.submit(text).await;
    let json = if pretty {
        serde_json::to_string_pretty(&response)?
    } else {
        serde_json::to_string(&response)?
    };
    println!("{json}");
    Ok(())
}
