//! Context inspector CLI.
//!
//! This is the entry point for the `ctxi` binary: a line-oriented front end
//! that sends messages to an agent and inspects its context.

use std::path::PathBuf;

use clap::Parser;
use ctx_inspector_client::{HttpTransport, InspectorClient, InspectorConfig};
use ctx_inspector_cli::{parse_command, App, Command, Role, TranscriptEntry};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

/// Context inspector CLI - talk to an agent and inspect its context.
#[derive(Parser, Debug)]
#[command(name = "ctxi")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Backend URL (overrides the config file).
    #[arg(long, env = "CTX_INSPECTOR_BASE_URL")]
    base_url: Option<String>,

    /// JSON config file.
    #[arg(long, env = "CTX_INSPECTOR_CONFIG")]
    config: Option<PathBuf>,

    /// Timeline poll interval in milliseconds while a message is running.
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Enable debug logging.
    #[arg(long, default_value = "false")]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.debug {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("ctx_inspector_cli=debug,ctx_inspector_client=debug,warn")
        });
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let mut config = match &args.config {
        Some(path) => InspectorConfig::load(path)?,
        None => InspectorConfig::default(),
    };
    if let Some(base_url) = args.base_url {
        config.base_url = base_url;
    }
    if let Some(millis) = args.poll_interval_ms {
        config.poll_interval_millis = millis;
    }

    let transport = HttpTransport::new(&config)?;
    let client = InspectorClient::new(transport, &config.base_url);
    let mut app = App::new(client, config.poll_interval());

    let mut entries = app.transcript.subscribe();

    println!("Connected to {} (type /help for commands)", app.base_url());
    match app.load_sessions().await {
        Ok(sessions) => println!("{} sessions available", sessions.len()),
        Err(e) => eprintln!("Failed to load sessions: {}", e.user_message()),
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(e) => {
                eprintln!("{e}");
                continue;
            }
        };
        if command == Command::Quit {
            break;
        }

        // Print entries while the command runs so live output shows up
        // before the interaction finishes.
        let run = execute(&mut app, command);
        tokio::pin!(run);
        let result = loop {
            tokio::select! {
                result = &mut run => break result,
                Some(entry) = entries.recv() => print_entry(&entry),
            }
        };
        while let Ok(entry) = entries.try_recv() {
            print_entry(&entry);
        }

        if let Err(e) = result {
            eprintln!("Error: {}", e.user_message());
        }
    }

    Ok(())
}

/// Run one command against the app.
async fn execute(
    app: &mut App<HttpTransport>,
    command: Command,
) -> Result<(), ctx_inspector_cli::AppError> {
    match command {
        Command::Empty | Command::Quit => {}
        Command::Help => println!("{}", ctx_inspector_cli::commands::HELP),
        Command::Message(message) => {
            let report = app.send_message(&message).await?;
            if let Some(usage) = report.result.usage {
                println!("({} tokens)", usage.total_tokens);
            }
        }
        Command::Sessions => {
            let active = app.state.active().cloned();
            for session in app.load_sessions().await? {
                let marker = match &active {
                    Some(key) if key.session_id == session.session_id => "*",
                    _ => " ",
                };
                let agents: Vec<&str> = session.agents.iter().map(|a| a.display_name()).collect();
                println!(
                    "{marker} {} ({} agents: {})",
                    session.session_id,
                    session.agent_count,
                    agents.join(", ")
                );
            }
        }
        Command::New => match app.create_session().await? {
            Some(key) => println!("Using {key}"),
            None => println!("Created a session without agents"),
        },
        Command::Close(session) => app.close_session(session.as_deref()).await?,
        Command::Use { session, agent } => {
            let key = app.select(&session, agent.as_deref()).await?;
            println!("Using {key}");
        }
        Command::Windows => print_snapshot(app, |s| &s.windows),
        Command::Apps => print_snapshot(app, |s| &s.apps),
        Command::Context => print_snapshot(app, |s| &s.raw_context),
        Command::LlmInput => print_snapshot(app, |s| &s.raw_llm_input),
        Command::Timeline { include_obsolete } => {
            for item in app.timeline(include_obsolete).await? {
                let obsolete = if item.is_obsolete { " (obsolete)" } else { "" };
                println!(
                    "#{:<4} {:<20} ~{} tokens{obsolete}",
                    item.seq, item.item_type, item.estimated_tokens
                );
            }
        }
        Command::Invoke {
            window_id,
            action_id,
            params,
        } => {
            app.invoke_action(&window_id, &action_id, params).await?;
        }
        Command::SimulateAssistant(content) => {
            app.simulate_assistant(&content).await?;
        }
        Command::SimulateTool { tool_name, content } => {
            app.simulate_tool(&tool_name, &content).await?;
        }
        Command::Refresh => {
            app.refresh_active().await?;
            println!("Refreshed {}", app.active_key()?);
        }
    }
    Ok(())
}

fn print_snapshot<V: Serialize + ?Sized>(
    app: &App<HttpTransport>,
    select: impl Fn(&ctx_inspector_cli::AgentSnapshot) -> &V,
) {
    let Some(snapshot) = app.state.snapshot() else {
        eprintln!("Nothing loaded yet; use /use or /new first");
        return;
    };
    match serde_json::to_string_pretty(select(snapshot)) {
        Ok(text) => println!("{text}"),
        Err(e) => eprintln!("Failed to render: {e}"),
    }
}

fn print_entry(entry: &TranscriptEntry) {
    let time = entry.created_at.format("%H:%M:%S");
    let label = match entry.role {
        Role::User => "you",
        Role::Assistant => "agent",
        Role::System => "system",
        Role::Simulator => "sim",
    };
    for (i, line) in entry.content.lines().enumerate() {
        if i == 0 {
            println!("[{time}] {label:>6}: {line}");
        } else {
            println!("{:>18}{line}", "");
        }
    }
}
