use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use teloxide::Bot;

use yturl::cli::{Cli, Commands};
use yturl::core::web_server::{start_web_server, WebState};
use yturl::core::{config, init_logger, log_startup_configuration};
use yturl::download::formats::{audio_choices, video_choices};
use yturl::download::metadata::{fetch_metadata, format_duration};
use yturl::download::{DownloadJob, Downloader, MediaReference, Mode, Stage};
use yturl::telegram::{create_bot, run_bot, BotGateway, EnvFileOwnerStore, OwnerRegistry, TeloxideTransport};

/// Main entry point
///
/// Parses CLI arguments and dispatches to the subcommand; no subcommand
/// means `serve`.
#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before any config static is read
    let _ = dotenvy::dotenv();

    let cli = Cli::parse_args();

    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Panic caught: {:?}", panic_info);
        if let Some(location) = panic_info.location() {
            log::error!("Panic at {}:{}:{}", location.file(), location.line(), location.column());
        }
    }));

    init_logger(&config::LOG_FILE_PATH)?;

    match cli.command {
        Some(Commands::Serve { port }) => run_serve(port).await,
        Some(Commands::Bot) => run_bot_only().await,
        Some(Commands::Info { url, mode, json }) => run_cli_info(url, mode, json).await,
        Some(Commands::Download {
            url,
            format,
            mode,
            output,
        }) => run_cli_download(url, format, mode, output).await,
        None => {
            log::info!("No command specified, running serve");
            run_serve(None).await
        }
    }
}

fn build_gateway(bot: Bot) -> Arc<BotGateway> {
    let store = Arc::new(EnvFileOwnerStore::from_config());
    let owners = Arc::new(OwnerRegistry::new(*config::telegram::OWNER_ID, store));
    Arc::new(BotGateway::new(Arc::new(TeloxideTransport::new(bot)), owners))
}

async fn ensure_work_dir() -> Result<()> {
    tokio::fs::create_dir_all(config::TEMP_FILES_DIR.as_path())
        .await
        .map_err(|e| anyhow::anyhow!("Cannot create {}: {}", config::TEMP_FILES_DIR.display(), e))
}

/// Web API, with the bot alongside when a token is configured
async fn run_serve(port: Option<u16>) -> Result<()> {
    log_startup_configuration();
    ensure_work_dir().await?;

    if let Some(token) = config::telegram::BOT_TOKEN.as_deref() {
        let bot = create_bot(token)?;
        let gateway = build_gateway(bot.clone());
        tokio::spawn(async move {
            if let Err(e) = run_bot(bot, gateway).await {
                log::error!("Telegram bot stopped: {}", e);
            }
        });
    }

    let port = port.unwrap_or(*config::WEB_PORT);
    start_web_server(port, WebState::from_config()).await?;
    Ok(())
}

async fn run_bot_only() -> Result<()> {
    log_startup_configuration();
    ensure_work_dir().await?;

    let token = config::telegram::BOT_TOKEN
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("TELEGRAM_BOT is not set"))?;
    let bot = create_bot(token)?;
    let gateway = build_gateway(bot.clone());
    run_bot(bot, gateway).await
}

fn source_url(url: &str) -> String {
    let reference = MediaReference::detect(url);
    if !reference.is_supported() {
        log::warn!("{} is not a known platform; passing it to yt-dlp as is", reference.url);
    }
    reference.url
}

async fn run_cli_info(url: String, mode: Mode, json: bool) -> Result<()> {
    let info = fetch_metadata(&config::YTDL_BIN, &source_url(&url)).await?;
    let choices = match mode {
        Mode::Video => video_choices(&info.formats),
        Mode::Audio => audio_choices(&info.formats),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&choices)?);
        return Ok(());
    }

    println!("Title:    {}", info.title);
    println!("Author:   {}", info.uploader_name.as_deref().unwrap_or("-"));
    println!("Duration: {}", format_duration(info.duration_seconds.unwrap_or(0.0)));
    println!();
    if choices.is_empty() {
        println!("No {} formats available", mode);
        return Ok(());
    }
    println!("{:<12} {:<10} {:>10}", "FORMAT", "QUALITY", "SIZE");
    for choice in &choices {
        let size = choice
            .estimated_size_bytes
            .map(|b| format!("{:.1} MB", b as f64 / config::MIB as f64))
            .unwrap_or_else(|| "?".to_string());
        println!("{:<12} {:<10} {:>10}", choice.format_id, choice.quality_label, size);
    }
    Ok(())
}

async fn run_cli_download(url: String, format: String, mode: Mode, output: Option<PathBuf>) -> Result<()> {
    let dir = match output {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    tokio::fs::create_dir_all(&dir).await?;

    let job = DownloadJob::new(mode, format, source_url(&url), &dir);
    let path = job.output_path();
    let mut handle = Downloader::new(config::YTDL_BIN.as_str()).start(job);

    loop {
        let event = tokio::select! {
            event = handle.next_event() => event,
            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupted, stopping download");
                handle.shutdown().await;
                return Err(anyhow::anyhow!("Download interrupted"));
            }
        };
        let Some(event) = event else {
            return Err(anyhow::anyhow!("Download ended without a result"));
        };
        println!("{}", serde_json::to_string(&event)?);

        match event.stage {
            Stage::Done => {
                println!("Saved to {}", path.display());
                return Ok(());
            }
            Stage::Error => {
                return Err(anyhow::anyhow!(event
                    .error_message
                    .unwrap_or_else(|| "Download failed".to_string())));
            }
            _ => {}
        }
    }
}
