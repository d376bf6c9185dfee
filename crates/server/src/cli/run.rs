use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use gemma_core::{GenerateEvent, GenerateRequest};
use tokio::sync::mpsc;
use tracing::info;

use crate::cli::{GlobalArgs, RunArgs};
use crate::config::AppConfig;

pub async fn execute(global: GlobalArgs, args: RunArgs) -> anyhow::Result<()> {
    let cfg = AppConfig::load_or_default()?;

    let ctx = {
        let model = args.model.clone();
        let cfg = cfg.clone();
        tokio::task::spawn_blocking(move || super::open_context(&global, &model, &cfg)).await??
    };
    let ctx = Arc::new(ctx);
    info!(model_type = %ctx.config().model_type, "Context ready for interactive use");

    let max_length = args.max_length.unwrap_or(cfg.default_max_length);

    println!("Model loaded. Type your prompt (Ctrl-D to quit).\n");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            println!();
            break; // EOF
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut request = GenerateRequest::new(line).with_max_length(max_length);
        if let Some(secs) = args.timeout {
            request = request.with_timeout(Duration::from_secs(secs));
        }

        let (tx, mut rx) = mpsc::channel(64);
        let ctx_clone = ctx.clone();
        tokio::task::spawn_blocking(move || {
            gemma_core::generate_blocking(&ctx_clone, &request, tx);
        });

        while let Some(event) = rx.recv().await {
            match event {
                GenerateEvent::Token(piece) => {
                    print!("{piece}");
                    stdout.flush()?;
                }
                GenerateEvent::Done {
                    finish_reason,
                    text_bytes,
                } => {
                    println!();
                    eprintln!("  [{finish_reason} | {text_bytes} bytes]");
                    break;
                }
                GenerateEvent::Error(e) => {
                    eprintln!("\nError: {e}");
                    break;
                }
            }
        }

        println!();
    }

    ctx.close();
    Ok(())
}
