// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Line-oriented chat frontend

use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use crossterm::{
    style::{Color, ResetColor, SetForegroundColor},
    ExecutableCommand,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

use leyia::chat::{ChatSession, SessionEvent, SubmitOutcome, TurnOutcome, UsageStats};
use leyia::cli::{parse_input, ChatArgs, ReplInput};
use leyia::config::Settings;
use leyia::error::Result;
use leyia::llm::providers::OpenAiAssistantClient;
use leyia::tools::{SearchBackend, TavilyClient};

pub async fn run_chat(args: ChatArgs, settings: Settings) -> anyhow::Result<()> {
    let api_key = settings.get_assistant_api_key().with_context(|| {
        format!(
            "no assistant API key configured (set {})",
            settings.assistant.api_key_env
        )
    })?;
    let client = Arc::new(match settings.assistant.base_url {
        Some(ref url) => OpenAiAssistantClient::with_base_url(api_key, url.clone()),
        None => OpenAiAssistantClient::new(api_key),
    });

    let mut builder = ChatSession::builder(settings.clone())
        .with_assistant(client.clone())
        .with_file_store(client);
    if let Some(key) = settings.get_search_api_key() {
        let backend: Arc<dyn SearchBackend> = Arc::new(TavilyClient::new(key, &settings.search));
        builder = builder.with_search_backend(backend);
    }
    if let Some(id) = args.assistant {
        builder = builder.with_assistant_id(id);
    }
    let session = builder.build()?;

    let printer = tokio::spawn(print_events(session.subscribe()));
    session.initialize().await;
    print_welcome()?;

    for path in &args.file {
        upload(&session, path).await;
    }
    if let Some(prompt) = args.prompt {
        ask(&session, &prompt).await?;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print_prompt()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };

        match parse_input(&line) {
            ReplInput::Empty => {}
            ReplInput::Message(text) => ask(&session, &text).await?,
            ReplInput::Upload(paths) => {
                for path in paths {
                    upload(&session, &path).await;
                }
            }
            ReplInput::Delete(id) => match session.delete_file(&id).await {
                Ok(()) => println!("Archivo {} eliminado.", id),
                Err(e) => print_error(&format!("No se pudo eliminar {}: {}", id, e))?,
            },
            ReplInput::Files => print_files(&session).await,
            ReplInput::Cancel => {
                if !session.cancel_active_turn().await {
                    println!("No hay ninguna solicitud en curso.");
                }
            }
            ReplInput::Reset => session.reset_session().await,
            ReplInput::Usage => print_usage(&session.snapshot().await.usage),
            ReplInput::Help => print_help(),
            ReplInput::Invalid(message) => print_error(&message)?,
            ReplInput::Quit => break,
        }
    }

    session.shutdown().await;
    printer.abort();
    Ok(())
}

/// Submit a question and wait for its turn, cancelling on Ctrl+C
async fn ask(session: &ChatSession, text: &str) -> Result<()> {
    match session.submit_message(text).await {
        SubmitOutcome::Accepted { .. } => {
            print_response_prefix()?;
            tokio::select! {
                _ = session.wait_idle() => {}
                _ = tokio::signal::ctrl_c() => {
                    session.cancel_active_turn().await;
                    session.wait_idle().await;
                }
            }
        }
        SubmitOutcome::Busy => println!("Espera a que termine la respuesta actual."),
        SubmitOutcome::Empty => {}
    }
    Ok(())
}

async fn upload(session: &ChatSession, path: &Path) {
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let result = match tokio::fs::read(path).await {
        Ok(bytes) => session.upload_file(&bytes, &filename).await,
        Err(e) => Err(e.into()),
    };
    match result {
        Ok(handle) => println!("\n{} subido ({}).", handle.filename, handle.id),
        Err(e) => {
            let _ = print_error(&format!("No se pudo subir {}: {}", filename, e));
        }
    }
}

/// Render streamed events as they arrive
async fn print_events(mut events: broadcast::Receiver<SessionEvent>) {
    let mut shown = String::new();
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "event printer lagged");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        match event {
            SessionEvent::AssistantText { content, .. } => {
                if let Some(new_text) = content.strip_prefix(shown.as_str()) {
                    print!("{}", new_text);
                } else {
                    print!("\n{}", content);
                }
                shown = content;
                let _ = io::stdout().flush();
            }
            SessionEvent::ToolStatus { status, .. } => {
                let _ = print_dim(&format!("[{}]", status));
            }
            SessionEvent::TurnFinished { outcome, .. } => {
                let final_text = outcome.final_text(&shown);
                match final_text.strip_prefix(shown.as_str()) {
                    Some(rest) if outcome == TurnOutcome::Completed => println!("{}", rest),
                    _ if outcome == TurnOutcome::Cancelled && !shown.is_empty() => println!(),
                    _ => println!("\n{}", final_text),
                }
                shown.clear();
            }
            SessionEvent::UploadProgress {
                filename,
                page,
                total,
            } => {
                eprint!("\r{}: OCR página {} de {}", filename, page, total);
                if page == total {
                    eprintln!();
                }
            }
            SessionEvent::Notice { message } => {
                let _ = print_error(&message);
            }
            SessionEvent::SessionReset => println!("Conversación reiniciada."),
            SessionEvent::MessageAppended { .. }
            | SessionEvent::ThinkingTick { .. }
            | SessionEvent::UsageUpdated(_)
            | SessionEvent::FilesChanged { .. } => {}
        }
    }
}

async fn print_files(session: &ChatSession) {
    let files = session.snapshot().await.files;
    if files.is_empty() {
        println!("No hay archivos subidos.");
        return;
    }
    for file in files {
        println!(
            "  {}  {}  ({})",
            file.id,
            file.filename,
            file.uploaded_at.format("%Y-%m-%d %H:%M")
        );
    }
}

fn print_usage(usage: &UsageStats) {
    println!(
        "Último turno: {} entrada + {} salida = {} tokens",
        usage.last_input_tokens, usage.last_output_tokens, usage.last_total_tokens
    );
    println!(
        "Sesión: {} entrada + {} salida = {} tokens (≈ US${:.4})",
        usage.total_input_tokens, usage.total_output_tokens, usage.total_tokens, usage.cost_usd
    );
}

fn print_welcome() -> Result<()> {
    let mut stdout = io::stdout();
    stdout.execute(SetForegroundColor(Color::Cyan))?;
    println!("leyia v{}", env!("CARGO_PKG_VERSION"));
    stdout.execute(ResetColor)?;
    println!("Escribe /help para ver los comandos.");
    Ok(())
}

fn print_help() {
    println!("\nComandos:");
    println!("  /upload <ruta>...  - Subir documentos (.txt, .docx, .pdf)");
    println!("  /delete <id>       - Eliminar un archivo subido");
    println!("  /files             - Listar archivos subidos");
    println!("  /cancel            - Cancelar la respuesta en curso");
    println!("  /reset             - Reiniciar la conversación");
    println!("  /usage             - Mostrar tokens y costo");
    println!("  /quit              - Salir");
    println!("\nCtrl+C cancela la respuesta en curso.");
    println!();
}

fn print_prompt() -> Result<()> {
    let mut stdout = io::stdout();
    stdout.execute(SetForegroundColor(Color::Green))?;
    print!("\ntú: ");
    stdout.execute(ResetColor)?;
    stdout.flush()?;
    Ok(())
}

fn print_response_prefix() -> Result<()> {
    let mut stdout = io::stdout();
    stdout.execute(SetForegroundColor(Color::Cyan))?;
    print!("\nleyia: ");
    stdout.execute(ResetColor)?;
    stdout.flush()?;
    Ok(())
}

fn print_dim(text: &str) -> Result<()> {
    let mut stdout = io::stdout();
    stdout.execute(SetForegroundColor(Color::DarkGrey))?;
    print!("{} ", text);
    stdout.execute(ResetColor)?;
    stdout.flush()?;
    Ok(())
}

fn print_error(text: &str) -> Result<()> {
    let mut stderr = io::stderr();
    stderr.execute(SetForegroundColor(Color::Red))?;
    eprintln!("{}", text);
    stderr.execute(ResetColor)?;
    Ok(())
}
