use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;

use keepsake_core::attachment::{content_type_for_path, PreviewRegistry, RejectionFeedback};
use keepsake_core::config::CoreConfig;
use keepsake_core::models::{ChatMessage, MessageAttachment, Role};
use keepsake_core::tracing_setup::init_tracing;
use keepsake_core::{ChatController, EventBus, HttpMemoryApi, ToastHost};

#[derive(Parser)]
#[command(name = "keepsake")]
#[command(about = "Chat with your memory archive from the terminal")]
struct Cli {
    /// Base URL of the memory backend API
    #[arg(long)]
    api_base: Option<String>,

    /// Data directory for persisted client state
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Bearer token (prefer the KEEPSAKE_TOKEN env var)
    #[arg(long)]
    token: Option<String>,

    /// Show a toast instead of silently dropping rejected attachments
    #[arg(long)]
    loud_rejections: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List known conversation sessions
    Sessions,

    /// Print the transcript of a session
    Show {
        /// Session id
        session_id: String,
    },

    /// Interactive chat (default)
    Chat {
        /// Session id to open instead of resuming the last one
        #[arg(long)]
        session: Option<String>,
    },
}

fn build_config(cli: &Cli) -> CoreConfig {
    let data_dir = cli.data_dir.clone().unwrap_or_else(|| {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("keepsake")
    });
    let mut config = CoreConfig::new(data_dir);
    if let Some(ref base) = cli.api_base {
        config = config.with_api_base(base.clone());
    }
    if let Some(token) = cli
        .token
        .clone()
        .or_else(|| std::env::var("KEEPSAKE_TOKEN").ok())
    {
        config = config.with_auth_token(token);
    }
    config
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = build_config(&cli);

    let api = Arc::new(HttpMemoryApi::new(&config));
    let bus = EventBus::new();
    let registry = PreviewRegistry::new();
    let mut controller = ChatController::new(api, bus.clone(), registry, &config);
    if cli.loud_rejections {
        controller.set_rejection_feedback(RejectionFeedback::Toast);
    }

    match cli.command {
        Some(Commands::Sessions) => {
            if !controller.refresh_directory().await {
                anyhow::bail!("could not reach the memory backend");
            }
            print_sessions(&controller);
            Ok(())
        }
        Some(Commands::Show { session_id }) => {
            if !controller.select_session(&session_id).await {
                anyhow::bail!("could not load session {}", session_id);
            }
            for message in controller.messages() {
                print_message(message);
            }
            Ok(())
        }
        Some(Commands::Chat { session }) => run_chat(controller, bus, session).await,
        None => run_chat(controller, bus, None).await,
    }
}

fn print_sessions(controller: &ChatController<HttpMemoryApi>) {
    let sessions = controller.directory().sessions();
    if sessions.is_empty() {
        println!("No sessions yet. Start one with `keepsake chat`.");
        return;
    }
    for session in sessions {
        println!(
            "{}  {:>4} msgs  {}  {}",
            session.last_activity.format("%Y-%m-%d %H:%M"),
            session.message_count,
            session.id,
            session.title
        );
    }
}

fn print_message(message: &ChatMessage) {
    let speaker = match message.role {
        Role::User => "you",
        Role::Assistant => "assistant",
        Role::System => return,
    };
    println!("{}: {}", speaker, message.content);
    for attachment in &message.attachments {
        match attachment {
            MessageAttachment::Preview(handle) => {
                println!("  [attached {}]", handle.path.display());
            }
            MessageAttachment::Remote { url, .. } => println!("  [attachment {}]", url),
        }
    }
    for (index, source) in message.sources.iter().enumerate() {
        let title = source.title.as_deref().unwrap_or("memory");
        let jump = if source.can_navigate() {
            " (/source to jump)"
        } else {
            ""
        };
        println!("  [{}] {}{}", index + 1, title, jump);
    }
}

async fn run_chat(
    mut controller: ChatController<HttpMemoryApi>,
    bus: EventBus,
    session: Option<String>,
) -> Result<()> {
    let cancel = CancellationToken::new();

    // Toast viewport: print each newly arrived toast
    let (host, mut snapshot_rx) = ToastHost::new(&bus, cancel.clone());
    let host_task = tokio::spawn(host.run());
    let viewport = tokio::spawn(async move {
        let mut seen: HashSet<String> = HashSet::new();
        while snapshot_rx.changed().await.is_ok() {
            let fresh: Vec<_> = snapshot_rx
                .borrow_and_update()
                .iter()
                .filter(|toast| !seen.contains(&toast.id))
                .cloned()
                .collect();
            for toast in fresh {
                seen.insert(toast.id.clone());
                match toast.description {
                    Some(ref description) => {
                        println!("{} {} — {}", toast.variant.icon(), toast.title, description)
                    }
                    None => println!("{} {}", toast.variant.icon(), toast.title),
                }
            }
        }
    });

    // Stand-in for the timeline view: report focus jumps
    let mut focus_rx = bus.subscribe_focus();
    let timeline = tokio::spawn(async move {
        while let Ok(focus) = focus_rx.recv().await {
            match focus.anchor_date {
                Some(date) => println!("→ opening timeline at {} ({})", date, focus.item_id),
                None => println!("→ opening timeline ({})", focus.item_id),
            }
        }
    });

    match session {
        Some(id) => {
            if !controller.select_session(&id).await {
                anyhow::bail!("could not load session {}", id);
            }
        }
        None => controller.resume().await,
    }
    for message in controller.messages() {
        print_message(message);
    }
    println!("(type /help for commands)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b"you> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }

        match line.split_whitespace().collect::<Vec<_>>().as_slice() {
            ["/quit"] | ["/exit"] => break,
            ["/help"] => print_help(),
            ["/new"] => {
                controller.new_conversation();
                print_message(&controller.messages()[0]);
            }
            ["/sessions"] => {
                controller.refresh_directory().await;
                print_sessions(&controller);
            }
            ["/open", id] => {
                if controller.select_session(id).await {
                    for message in controller.messages() {
                        print_message(message);
                    }
                } else {
                    println!("could not load session {}", id);
                }
            }
            ["/attach", path] => {
                let path = PathBuf::from(path);
                let content_type = content_type_for_path(&path);
                controller.attach(&path, content_type);
                match controller.pending_attachment() {
                    Some(handle) => println!("attached {}", handle.path.display()),
                    None => println!("not attached (only images are supported)"),
                }
            }
            ["/detach"] => controller.remove_attachment(),
            ["/sources"] => {
                if let Some(message) = last_assistant(controller.messages()) {
                    print_message(message);
                }
            }
            ["/source", index] => {
                let citation = index
                    .parse::<usize>()
                    .ok()
                    .filter(|n| *n >= 1)
                    .and_then(|n| {
                        last_assistant(controller.messages())
                            .and_then(|m| m.sources.get(n - 1).cloned())
                    });
                match citation {
                    Some(citation) if citation.can_navigate() => {
                        controller.activate_source(&citation).await;
                    }
                    Some(_) => println!("that source has no linked memory"),
                    None => println!("no such source"),
                }
            }
            _ if line.starts_with('/') => println!("unknown command (try /help)"),
            _ => {
                controller.set_input(line.clone());
                let before = controller.messages().len();
                controller.send().await;
                for message in &controller.messages()[before..] {
                    print_message(message);
                }
            }
        }
    }

    tracing::debug!("shutting down chat shell");
    controller.teardown();
    cancel.cancel();
    let _ = host_task.await;
    viewport.abort();
    timeline.abort();
    Ok(())
}

fn last_assistant(messages: &[ChatMessage]) -> Option<&ChatMessage> {
    messages.iter().rev().find(|m| m.role == Role::Assistant)
}

fn print_help() {
    println!("/new              start a new conversation");
    println!("/sessions         list sessions");
    println!("/open <id>        switch to a session");
    println!("/attach <path>    attach an image to the next message");
    println!("/detach           drop the pending attachment");
    println!("/sources          show the last reply's sources");
    println!("/source <n>       jump the timeline to source n");
    println!("/quit             exit");
}
