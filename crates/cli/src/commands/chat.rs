//! `lumeo chat` — Interactive or single-message chat mode.

use std::io::Write;

use lumeo_agent::{ChatSession, EntryKind, MAX_INPUT_CHARS, TurnEvent, Workflow};
use lumeo_config::AppConfig;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

/// One line of interactive input.
#[derive(Debug, PartialEq, Eq)]
enum Input {
    Empty,
    Message(String),
    /// `/search`, `/search on`, `/search off`
    Search(Option<bool>),
    Clear,
    History,
    Help,
    Exit,
    Unknown(String),
}

fn parse_input(line: &str) -> Input {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Input::Empty;
    }
    if matches!(trimmed, "exit" | "quit") {
        return Input::Exit;
    }
    let Some(command) = trimmed.strip_prefix('/') else {
        return Input::Message(trimmed.to_string());
    };

    let mut parts = command.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("search"), None) => Input::Search(None),
        (Some("search"), Some("on")) => Input::Search(Some(true)),
        (Some("search"), Some("off")) => Input::Search(Some(false)),
        (Some("clear"), None) => Input::Clear,
        (Some("history"), None) => Input::History,
        (Some("help"), None) => Input::Help,
        (Some("exit" | "quit"), None) => Input::Exit,
        _ => Input::Unknown(trimmed.to_string()),
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled { "on" } else { "off" }
}

/// Print streamed text as it arrives; show tool activity on stderr.
fn render_event(event: &TurnEvent) {
    match event {
        TurnEvent::Chunk { content } => {
            print!("{content}");
            let _ = std::io::stdout().flush();
        }
        TurnEvent::ToolCall { arguments, .. } => {
            let query = arguments["query"].as_str().unwrap_or("…");
            eprintln!("  🔎 Searching the web: {query}");
        }
        TurnEvent::ToolResult { .. } | TurnEvent::Done { .. } => {}
    }
}

fn print_help() {
    println!("  Commands:");
    println!("    /search [on|off]  Toggle web search (currently shown with no argument)");
    println!("    /clear            Clear chat and memory (starts a new thread)");
    println!("    /history          Show this session's transcript");
    println!("    /exit             Quit");
}

pub async fn run(message: Option<String>, web_search: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if web_search && !config.has_search_key() {
        eprintln!("  ⚠️  Web search is on but no search key is set (TAVILY_API_KEY).");
    }

    let workflow = Workflow::from_config(&config)?;
    let mut session = ChatSession::new(workflow).with_web_search(web_search);
    debug!(
        provider = %config.default_provider,
        model = %session.workflow().model(),
        thread = %session.thread_id(),
        "Chat started"
    );

    if let Some(msg) = message {
        // Single message mode
        session.respond_with(&msg, render_event).await?;
        println!();
        return Ok(());
    }

    // Interactive mode
    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║          Lumeo — Interactive Chat            ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Provider:    {}", config.default_provider);
    println!("  Model:       {}", session.workflow().model());
    println!("  Web search:  {}", on_off(session.web_search()));
    println!("  Memory:      {}", config.memory.backend);
    println!();
    println!("  Type your message and press Enter. /help lists commands.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match parse_input(&line) {
            Input::Empty => continue,
            Input::Exit => break,
            Input::Help => print_help(),
            Input::Unknown(cmd) => println!("  Unknown command: {cmd} (try /help)"),
            Input::Search(None) => {
                println!("  Web search is {}", on_off(session.web_search()));
            }
            Input::Search(Some(enabled)) => {
                session.set_web_search(enabled);
                println!("  Web search {}", on_off(enabled));
                if enabled && !config.has_search_key() {
                    eprintln!("  ⚠️  No search key is set (TAVILY_API_KEY); searches will fail.");
                }
            }
            Input::Clear => match session.clear().await {
                Ok(_) => println!("  Chat and memory cleared."),
                Err(e) => eprintln!("  [Error] {e}"),
            },
            Input::History => {
                for entry in session.transcript() {
                    let who = match entry.kind {
                        EntryKind::User => "You",
                        EntryKind::Assistant => "Lumeo",
                        EntryKind::Error => "Error",
                    };
                    println!(
                        "  [{}] {who}: {}",
                        entry.timestamp.format("%H:%M:%S"),
                        entry.content
                    );
                }
            }
            Input::Message(text) => {
                if text.chars().count() > MAX_INPUT_CHARS {
                    eprintln!("  [Error] Messages are limited to {MAX_INPUT_CHARS} characters.");
                    continue;
                }
                println!();
                print!("  Lumeo > ");
                std::io::stdout().flush()?;
                match session.respond_with(&text, render_event).await {
                    Ok(_) => println!(),
                    Err(e) => {
                        println!();
                        eprintln!("  [Error] {e}");
                    }
                }
                println!();
            }
        }
    }

    println!();
    println!("  Goodbye! 👋");
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_a_message() {
        assert_eq!(parse_input("  hello there "), Input::Message("hello there".into()));
        assert_eq!(parse_input("   "), Input::Empty);
    }

    #[test]
    fn slash_commands() {
        assert_eq!(parse_input("/search on"), Input::Search(Some(true)));
        assert_eq!(parse_input("/search off"), Input::Search(Some(false)));
        assert_eq!(parse_input("/search"), Input::Search(None));
        assert_eq!(parse_input("/clear"), Input::Clear);
        assert_eq!(parse_input("/history"), Input::History);
        assert_eq!(parse_input("/exit"), Input::Exit);
        assert_eq!(parse_input("exit"), Input::Exit);
        assert_eq!(parse_input("/help"), Input::Help);
    }

    #[test]
    fn unknown_commands_are_reported() {
        assert_eq!(parse_input("/search maybe"), Input::Unknown("/search maybe".into()));
        assert_eq!(parse_input("/nope"), Input::Unknown("/nope".into()));
    }
}
