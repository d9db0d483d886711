use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ragchat_client::{
    ChatSession, ClientError, Config, IngestionTracker, RawTextRenderer, TerminalView, Uploader,
};
use ragchat_notify::NotificationSocket;
use ragchat_render::{citations, IncrementalRenderer};
use ragchat_stream::StreamingChatClient;

/// How long `upload` waits for the notification socket before uploading anyway
const SOCKET_OPEN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "ragchat", version)]
#[command(about = "Terminal client for a RagChat backend")]
struct Cli {
    /// Backend base URL, overrides configuration
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a question in a conversation
    Chat {
        conversation: i64,
        query: String,
        /// Use the non-streaming endpoint
        #[arg(long)]
        no_stream: bool,
        /// Answer without earlier turns as context
        #[arg(long)]
        no_memory: bool,
        #[arg(long)]
        temperature: Option<f32>,
        #[arg(long)]
        max_tokens: Option<u32>,
    },

    /// Print notifications until Ctrl-C
    Watch,

    /// Upload a document into a knowledge base and follow its ingestion
    Upload { kb_id: i64, file: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(base_url) = cli.base_url {
        config.server.base_url = base_url;
    }

    init_logging(&config);
    tracing::debug!(base_url = %config.server.base_url, "Configuration loaded");

    match cli.command {
        Commands::Chat {
            conversation,
            query,
            no_stream,
            no_memory,
            temperature,
            max_tokens,
        } => {
            let mut defaults = config.chat.clone().with_memory(!no_memory);
            if no_stream {
                defaults = defaults.with_stream(false);
            }
            if let Some(temperature) = temperature {
                defaults = defaults.with_temperature(temperature);
            }
            if let Some(max_tokens) = max_tokens {
                defaults = defaults.with_max_tokens(max_tokens);
            }
            run_chat(&config, defaults, conversation, query).await
        }
        Commands::Watch => run_watch(&config).await,
        Commands::Upload { kb_id, file } => run_upload(&config, kb_id, file).await,
    }
}

async fn run_chat(
    config: &Config,
    defaults: ragchat_client::ChatDefaults,
    conversation: i64,
    text: String,
) -> anyhow::Result<()> {
    let client = StreamingChatClient::builder()
        .base_url(&config.server.base_url)
        .connect_timeout(config.server.connect_timeout())
        .build()?;
    let session = ChatSession::new(Arc::new(client), defaults);
    let query = session.query(text);

    if !session.defaults().stream {
        return match session.ask(conversation, &query).await {
            Ok(reply) => {
                for citation in citations(&reply.sources) {
                    println!("[{}]", citation.label);
                }
                println!("{}", reply.answer);
                Ok(())
            }
            Err(e) => anyhow::bail!(e.user_message()),
        };
    }

    let turn = match session.start_stream(conversation, &query).await {
        Ok(turn) => turn,
        Err(e @ ClientError::Stream(_)) => anyhow::bail!(e.user_message()),
        Err(e) => return Err(e.into()),
    };

    let cancel = turn.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let mut renderer = IncrementalRenderer::new(RawTextRenderer);
    let mut view = TerminalView::new(std::io::stdout());
    turn.render(&mut renderer, &mut view).await;

    match renderer.message().and_then(|m| m.error()) {
        Some(error) => anyhow::bail!(error.to_string()),
        None => Ok(()),
    }
}

async fn run_watch(config: &Config) -> anyhow::Result<()> {
    let socket = NotificationSocket::new(&config.server.base_url, config.notify.clone().into())?;

    socket.on_progress(|p| {
        println!(
            "[kb {}] {} {:.0}% {}",
            p.kb_id.unwrap_or_default(),
            p.stage,
            p.progress,
            p.message
        )
    })?;
    socket.on_complete(|c| println!("[kb {}] complete: {}", c.kb_id.unwrap_or_default(), c.message))?;
    socket.on_job_error(|e| println!("[kb {}] failed: {}", e.kb_id.unwrap_or_default(), e.describe()))?;

    let mut status = socket.subscribe();
    tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let current = status.borrow_and_update().clone();
            if current.gave_up {
                eprintln!("notifications offline after {} attempts", current.reconnect_attempts);
            } else {
                eprintln!("socket {:?}", current.state);
            }
        }
    });

    println!("client id: {}", socket.client_id());
    socket.connect()?;

    tokio::signal::ctrl_c().await?;
    socket.close()?;
    Ok(())
}

async fn run_upload(config: &Config, kb_id: i64, file: PathBuf) -> anyhow::Result<()> {
    let socket = NotificationSocket::new(&config.server.base_url, config.notify.clone().into())?;
    let tracker = IngestionTracker::new();
    tracker.attach(&socket)?;
    socket.connect()?;

    let mut status = socket.subscribe();
    let opened = tokio::time::timeout(SOCKET_OPEN_TIMEOUT, status.wait_for(|s| s.is_open()))
        .await
        .is_ok_and(|result| result.is_ok());
    if !opened {
        tracing::warn!("Notification socket not open, progress will not be reported");
    }

    let mut progress = tracker.subscribe();
    tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let job = progress.borrow_and_update().get(&kb_id).cloned();
            if let Some(job) = job {
                eprintln!("{:>5.1}% {} {}", job.progress, job.stage, job.message);
            }
        }
    });

    let uploader = Uploader::new(&config.server.base_url, config.server.connect_timeout())?;
    let receipt = uploader
        .upload_file(kb_id, &file, socket.client_id())
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;
    println!("{}", receipt.message);

    if !socket.is_connected() {
        return Ok(());
    }

    tokio::select! {
        job = tracker.wait_until_done(kb_id) => {
            socket.close()?;
            match job.error {
                Some(error) => anyhow::bail!(error),
                None => println!("{}", job.message),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            socket.close()?;
        }
    }

    Ok(())
}

fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.logging.format.as_str() {
        "json" => {
            registry
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
                .init();
        }
    }
}
