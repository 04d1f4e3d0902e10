//! CLI `chat` command: an interactive loop over stdin.

use anyhow::Result;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

use namo::orchestrator::{ReflectionOrchestrator, TurnResponse};

const EXIT_WORDS: &[&str] = &["exit", "quit", "/quit"];

pub async fn chat(orchestrator: &ReflectionOrchestrator) -> Result<()> {
    println!("namo chat. Type `exit` to leave.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("you> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };
        let text = line.trim();
        if EXIT_WORDS.contains(&text) {
            break;
        }

        let response = orchestrator.submit(text).await;
        print_turn(&response);
    }

    Ok(())
}

fn print_turn(response: &TurnResponse) {
    println!("namo> {}", response.reply);
    if response.is_blocked() {
        println!(
            "       (blocked: {}, risk {:.2})",
            response.risk.reason, response.risk.risk_level
        );
        return;
    }
    println!(
        "       tone {} · moral {:.2} · coherence {:.2} · tags [{}] · {}ms",
        response.tone,
        response.moral_index,
        response.coherence,
        response.tags.join(", "),
        response.latency_ms
    );
    if !response.memory_summary.text.is_empty() {
        println!("       {}", response.memory_summary.text);
    }
}
