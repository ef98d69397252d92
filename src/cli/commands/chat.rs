//! Interactive chat command.

use super::connect;
use super::docs::print_documents;
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::session::ChatSession;
use anyhow::Result;
use console::style;
use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::debug;

/// What a Ctrl-C means at the moment it arrives.
#[derive(Debug, PartialEq)]
enum Interrupt {
    /// Nothing in flight: leave the chat.
    Exit,
    /// A request was running and has been told to stop.
    Cancel,
}

/// Ctrl-C routing for one chat session.
///
/// A single listener serves the whole session. While a request runs the
/// signal cancels it; at the prompt it ends the chat.
#[derive(Default)]
struct Interrupts {
    busy: AtomicBool,
    cancel: Notify,
}

impl Interrupts {
    fn on_interrupt(&self) -> Interrupt {
        if self.busy.load(Ordering::SeqCst) {
            self.cancel.notify_waiters();
            Interrupt::Cancel
        } else {
            Interrupt::Exit
        }
    }

    /// Mark a request as running until the guard drops.
    fn begin_request(&self) -> RequestGuard<'_> {
        self.busy.store(true, Ordering::SeqCst);
        RequestGuard(&self.busy)
    }
}

struct RequestGuard<'a>(&'a AtomicBool);

impl Drop for RequestGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Listen for Ctrl-C for the rest of the session.
fn listen_for_interrupts(orchestrator: Arc<Orchestrator>) -> Arc<Interrupts> {
    let interrupts = Arc::new(Interrupts::default());
    let handle = interrupts.clone();

    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if handle.on_interrupt() == Interrupt::Exit {
                // The prompt is blocked reading stdin, so leave from here.
                println!();
                Output::info("Goodbye!");
                orchestrator.close().await.ok();
                std::process::exit(130);
            }
        }
    });

    interrupts
}

/// A line typed at the chat prompt.
#[derive(Debug, PartialEq)]
enum ChatInput {
    Empty,
    Exit,
    Clear,
    Help,
    Docs,
    Models,
    Model(String),
    /// `None` flips the current value.
    History(Option<bool>),
    Debug(Option<bool>),
    Unknown(String),
    Question(String),
}

fn parse_toggle(arg: &str) -> std::result::Result<Option<bool>, ()> {
    match arg.to_ascii_lowercase().as_str() {
        "" => Ok(None),
        "on" | "true" | "yes" => Ok(Some(true)),
        "off" | "false" | "no" => Ok(Some(false)),
        _ => Err(()),
    }
}

fn parse_input(line: &str) -> ChatInput {
    let line = line.trim();

    if line.is_empty() {
        return ChatInput::Empty;
    }
    if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
        return ChatInput::Exit;
    }
    if line.eq_ignore_ascii_case("clear") {
        return ChatInput::Clear;
    }

    let Some(command) = line.strip_prefix('/') else {
        return ChatInput::Question(line.to_string());
    };

    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };

    match name.to_ascii_lowercase().as_str() {
        "exit" | "quit" => ChatInput::Exit,
        "clear" | "reset" => ChatInput::Clear,
        "help" => ChatInput::Help,
        "docs" => ChatInput::Docs,
        "models" => ChatInput::Models,
        "model" if arg.is_empty() => ChatInput::Models,
        "model" => ChatInput::Model(arg.to_string()),
        "history" => parse_toggle(arg)
            .map(ChatInput::History)
            .unwrap_or_else(|_| ChatInput::Unknown(line.to_string())),
        "debug" => parse_toggle(arg)
            .map(ChatInput::Debug)
            .unwrap_or_else(|_| ChatInput::Unknown(line.to_string())),
        _ => ChatInput::Unknown(line.to_string()),
    }
}

fn print_help() {
    Output::kv("/model <name>", "switch model");
    Output::kv("/models", "list models");
    Output::kv("/history [on|off]", "remember the chat history");
    Output::kv("/debug [on|off]", "show the query used to search the documents");
    Output::kv("/docs", "list documents");
    Output::kv("clear", "start over");
    Output::kv("exit", "quit");
}

fn print_status(session: &ChatSession) {
    Output::kv("Model", &session.model_name);
    Output::kv("Chat history", if session.use_chat_history { "on" } else { "off" });
    Output::kv("Debug", if session.debug { "on" } else { "off" });
}

/// Run the interactive chat command.
pub async fn run_chat(
    model: Option<String>,
    no_history: bool,
    debug_mode: bool,
    settings: Settings,
) -> Result<()> {
    let orchestrator = Arc::new(connect(settings).await?);

    let mut session = orchestrator.new_session();
    if let Some(model) = model {
        if let Err(e) = orchestrator.select_model(&mut session, &model) {
            Output::error(&format!("{}", e));
            orchestrator.close().await.ok();
            return Err(e.into());
        }
    }
    if no_history {
        session.use_chat_history = false;
    }
    if debug_mode {
        session.debug = true;
    }

    println!("\n{}", style("Chat Document Assistant").bold().cyan());
    println!("These documents will be used to answer your questions:");
    if print_documents(&orchestrator).await.is_err() {
        orchestrator.close().await.ok();
        anyhow::bail!("could not list documents");
    }

    println!();
    print_status(&session);
    println!(
        "\n{}\n",
        style("Ask about your documents, '/help' for commands, 'exit' to quit.").dim()
    );

    let interrupts = listen_for_interrupts(orchestrator.clone());
    let outcome = chat_loop(&orchestrator, &interrupts, &mut session).await;
    orchestrator.close().await.ok();
    outcome
}

async fn chat_loop(
    orchestrator: &Orchestrator,
    interrupts: &Interrupts,
    session: &mut ChatSession,
) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("{} ", style("You:").green().bold());
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            // EOF
            println!();
            break;
        }

        match parse_input(&line) {
            ChatInput::Empty => continue,
            ChatInput::Exit => {
                Output::info("Goodbye!");
                break;
            }
            ChatInput::Clear => {
                session.clear();
                Output::info("Conversation cleared.");
            }
            ChatInput::Help => print_help(),
            ChatInput::Docs => {
                print_documents(orchestrator).await.ok();
            }
            ChatInput::Models => {
                for model in &orchestrator.settings().chat.models {
                    let marker = if *model == session.model_name { " (current)" } else { "" };
                    Output::list_item(&format!("{}{}", model, marker));
                }
            }
            ChatInput::Model(name) => match orchestrator.select_model(session, &name) {
                Ok(()) => Output::success(&format!("Using {}", session.model_name)),
                Err(e) => Output::error(&format!("{}", e)),
            },
            ChatInput::History(value) => {
                session.use_chat_history = value.unwrap_or(!session.use_chat_history);
                print_status(session);
            }
            ChatInput::Debug(value) => {
                session.debug = value.unwrap_or(!session.debug);
                print_status(session);
            }
            ChatInput::Unknown(text) => {
                Output::warning(&format!("Unknown command: {} (try /help)", text));
            }
            ChatInput::Question(question) => ask(orchestrator, interrupts, session, &question).await,
        }
    }

    Ok(())
}

/// Answer one question. Ctrl-C abandons the request and keeps the session.
async fn ask(
    orchestrator: &Orchestrator,
    interrupts: &Interrupts,
    session: &mut ChatSession,
    question: &str,
) {
    let spinner = Output::spinner(&format!("{} thinking...", session.model_name));

    let cancelled = interrupts.cancel.notified();
    let outcome = {
        let _running = interrupts.begin_request();
        tokio::select! {
            result = orchestrator.engine().respond(session, question) => Some(result),
            _ = cancelled => None,
        }
    };
    spinner.finish_and_clear();

    match outcome {
        Some(Ok(turn)) => {
            if let Some(query) = &turn.standalone_query {
                Output::debug_note("Summary to be used to find similar chunks in the docs:", query);
            }
            println!("\n{} {}\n", style("Assistant:").cyan().bold(), turn.format_for_display());
            debug!("Session now holds {} messages", session.len());
        }
        Some(Err(e)) => Output::error(&format!("Error: {}", e)),
        None => Output::warning("Request cancelled."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_lines_are_questions() {
        assert_eq!(
            parse_input("  What is the warranty?\n"),
            ChatInput::Question("What is the warranty?".to_string())
        );
        assert_eq!(parse_input("   \n"), ChatInput::Empty);
    }

    #[test]
    fn test_session_commands() {
        assert_eq!(parse_input("exit"), ChatInput::Exit);
        assert_eq!(parse_input("QUIT"), ChatInput::Exit);
        assert_eq!(parse_input("clear"), ChatInput::Clear);
        assert_eq!(parse_input("/reset"), ChatInput::Clear);
        assert_eq!(parse_input("/docs"), ChatInput::Docs);
        assert_eq!(parse_input("/model"), ChatInput::Models);
        assert_eq!(
            parse_input("/model mistral-large"),
            ChatInput::Model("mistral-large".to_string())
        );
    }

    #[tokio::test]
    async fn test_interrupt_cancels_running_request() {
        let interrupts = Interrupts::default();
        assert_eq!(interrupts.on_interrupt(), Interrupt::Exit);

        let cancelled = interrupts.cancel.notified();
        {
            let _running = interrupts.begin_request();
            assert_eq!(interrupts.on_interrupt(), Interrupt::Cancel);
        }
        tokio::time::timeout(std::time::Duration::from_secs(1), cancelled)
            .await
            .expect("request should be cancelled");

        // Back at the prompt the next Ctrl-C leaves.
        assert_eq!(interrupts.on_interrupt(), Interrupt::Exit);
    }

    #[tokio::test]
    async fn test_interrupt_at_prompt_does_not_cancel_next_request() {
        let interrupts = Interrupts::default();
        assert_eq!(interrupts.on_interrupt(), Interrupt::Exit);

        let cancelled = interrupts.cancel.notified();
        let _running = interrupts.begin_request();
        let waited = tokio::time::timeout(std::time::Duration::from_millis(50), cancelled).await;
        assert!(waited.is_err());
    }

    #[test]
    fn test_toggles() {
        assert_eq!(parse_input("/history off"), ChatInput::History(Some(false)));
        assert_eq!(parse_input("/history"), ChatInput::History(None));
        assert_eq!(parse_input("/debug ON"), ChatInput::Debug(Some(true)));
        assert_eq!(
            parse_input("/debug maybe"),
            ChatInput::Unknown("/debug maybe".to_string())
        );
    }
}
