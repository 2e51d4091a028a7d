//! Agent command handler (single message + interactive mode).

use std::io::{self, BufRead, Write};

use anyhow::Result;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use loopclaw::agent::AgentLoop;
use loopclaw::config::Config;
use loopclaw::error::LoopError;

use super::common::create_agent;

/// Interactive or single-message agent mode.
pub(crate) async fn cmd_agent(config: Config, message: Option<String>, stream: bool) -> Result<()> {
    let mut agent = create_agent(&config)?;
    let streaming = stream || config.agent.streaming;

    if let Some(msg) = message {
        match run_turn(&mut agent, &msg, streaming).await {
            Ok(()) => return Ok(()),
            Err(LoopError::Cancelled) => {
                eprintln!("[interrupted]");
                std::process::exit(130);
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    }

    println!("LoopClaw Interactive Agent");
    println!("Type your message and press Enter. Type 'quit' or 'exit' to stop.");
    println!("Press Ctrl-C to interrupt a running turn.");
    println!();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let mut input = String::new();
        match stdin.lock().read_line(&mut input) {
            Ok(0) => {
                println!();
                break;
            }
            Ok(_) => {
                let input = input.trim();
                if input.is_empty() {
                    continue;
                }
                if input == "quit" || input == "exit" {
                    println!("Goodbye!");
                    break;
                }

                println!();
                match run_turn(&mut agent, input, streaming).await {
                    Ok(()) => println!(),
                    Err(LoopError::Cancelled) => {
                        println!("[interrupted]");
                        println!();
                    }
                    Err(e) => {
                        eprintln!("Error: {}", e);
                        eprintln!();
                    }
                }
            }
            Err(e) => {
                eprintln!("Error reading input: {}", e);
                break;
            }
        }
    }

    Ok(())
}

/// Run one turn, cancelling it on Ctrl-C, and print the answer.
async fn run_turn(agent: &mut AgentLoop, input: &str, streaming: bool) -> Result<(), LoopError> {
    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let outcome = if streaming {
        let (tx, mut rx) = mpsc::channel::<String>(64);
        let printer = tokio::spawn(async move {
            while let Some(text) = rx.recv().await {
                print!("{}", text);
                let _ = io::stdout().flush();
            }
        });
        let outcome = agent.run(input, &cancel, Some(&tx)).await;
        drop(tx);
        let _ = printer.await;
        outcome.map(|_| println!())
    } else {
        agent.run(input, &cancel, None).await.map(|answer| {
            println!("{}", answer);
        })
    };

    watcher.abort();
    outcome
}
