//! huddle-tail: follow one chat from the terminal.
//!
//! Lines typed on stdin are sent as messages. `/older` scrolls to the top
//! (loading history), `/bottom` jumps back down, `/open <chat-id>` switches
//! chats, `/reload` reopens the current one and `/quit` exits.

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use huddle_client_lib::{
    init_tracing, FeedConfig, FeedController, ScrollAction, Viewport, VirtualViewport,
};
use huddle_shared::types::ChatId;

/// One terminal line per message.
const ROW_HEIGHT: f64 = 1.0;

#[derive(Parser)]
#[command(name = "huddle-tail")]
#[command(about = "Follow a team chat from the terminal", long_about = None)]
#[command(version)]
struct Cli {
    /// Chat to open.
    chat_id: String,

    /// Visible message rows.
    #[arg(short, long, default_value = "15")]
    rows: usize,

    /// Overrides HUDDLE_API_URL.
    #[arg(long)]
    api_url: Option<String>,

    /// Overrides HUDDLE_API_TOKEN.
    #[arg(long, env = "HUDDLE_API_TOKEN", hide_env_values = true)]
    token: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = FeedConfig::from_env();
    if let Some(url) = cli.api_url {
        config.push_url = format!("{}/events", url.trim_end_matches('/'));
        config.api_url = url;
    }
    if cli.token.is_some() {
        config.api_token = cli.token;
    }

    let chat_id = ChatId::parse(&cli.chat_id).context("chat id must be a UUID")?;
    let (mut ctl, _listener) = FeedController::connect(&config)?;
    let mut viewport = VirtualViewport::new(ROW_HEIGHT, cli.rows as f64 * ROW_HEIGHT);

    ctl.open(chat_id);
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            event = ctl.next_event() => {
                let Some(event) = event else { break };
                ctl.handle(event);
                redraw(&mut ctl, &mut viewport);
            }
            line = stdin.next_line() => {
                let Some(line) = line? else { break };
                if !command(&mut ctl, &mut viewport, &line) {
                    break;
                }
            }
        }
    }

    tracing::info!("huddle-tail exiting");
    Ok(())
}

/// One line of user input.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Quit,
    Older,
    Bottom,
    Open(ChatId),
    Reload,
    Send(&'a str),
    Empty,
    /// A `/` line that is not a known command, or `/open` with a bad id.
    Invalid(String),
}

fn parse_input(line: &str) -> Input<'_> {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    if !line.starts_with('/') {
        return Input::Send(line);
    }

    let (cmd, arg) = line.split_once(' ').unwrap_or((line, ""));
    match cmd {
        "/quit" => Input::Quit,
        "/older" => Input::Older,
        "/bottom" => Input::Bottom,
        "/reload" => Input::Reload,
        "/open" => match ChatId::parse(arg) {
            Ok(chat_id) => Input::Open(chat_id),
            Err(e) => Input::Invalid(format!("invalid chat id {:?}: {e}", arg.trim())),
        },
        other => Input::Invalid(format!("unknown command {other}")),
    }
}

/// Returns `false` when the user asked to quit.
fn command(ctl: &mut FeedController, viewport: &mut VirtualViewport, line: &str) -> bool {
    match parse_input(line) {
        Input::Quit => return false,
        Input::Older => {
            viewport.set_scroll_top(0.0);
            if !ctl.on_scroll(&*viewport) {
                println!("-- no older messages --");
            }
            redraw(ctl, viewport);
        }
        Input::Bottom => {
            viewport.set_scroll_top(viewport.max_scroll_top());
            ctl.on_scroll(&*viewport);
            redraw(ctl, viewport);
        }
        Input::Open(chat_id) => {
            *viewport = VirtualViewport::new(viewport.row_height(), viewport.client_height());
            ctl.open(chat_id);
        }
        Input::Reload => ctl.reload(),
        Input::Send(text) => {
            if !ctl.send(text) {
                println!("-- still sending, try again --");
            }
        }
        Input::Empty => {}
        Input::Invalid(reason) => {
            println!("-- {reason} (commands: /older /bottom /open <chat-id> /reload /quit) --");
        }
    }
    true
}

/// Lay out the store, let the anchor adjust, then print the visible rows.
fn redraw(ctl: &mut FeedController, viewport: &mut VirtualViewport) {
    viewport.layout(ctl.feed().messages().len());
    let action = ctl.after_layout(viewport);
    if action == ScrollAction::Unchanged && ctl.feed().messages().is_empty() {
        return;
    }

    let first = viewport.first_visible_row();
    let visible = (viewport.client_height() / ROW_HEIGHT) as usize;

    println!("\x1b[2J\x1b[H");
    for message in ctl.feed().messages().iter().skip(first).take(visible) {
        println!(
            "[{}] {}: {}",
            message.created_at.format("%H:%M"),
            message.sender_name,
            message.content
        );
    }
    let below = ctl
        .feed()
        .messages()
        .len()
        .saturating_sub(first + visible);
    if below > 0 {
        println!("-- {below} newer below, /bottom to jump --");
    }
}
