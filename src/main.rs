use anyhow::Context;
use clap::{Arg, ArgAction, Command};
use indicatif::{ProgressBar, ProgressStyle};
use orange_uploader::plugins::http::cli::HttpCliPlugin;
use orange_uploader::{
    ChunkedUploadSession, HttpTransport, StatusPolicy, TransportContext, UploadConfig, UploadEvent, UploadState,
    DEFAULT_CHUNK_LIMIT, DEFAULT_UPLOAD_LIMIT,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn build_cli(http: &HttpCliPlugin) -> Command {
    let upload = Command::new("upload")
        .about("Upload a file to an existing upload session URL")
        .arg(Arg::new("url").help("Upload session URL").required(true))
        .arg(Arg::new("file").help("File to upload").required(true))
        .arg(
            Arg::new("chunk_size")
                .long("chunk-size")
                .help("Chunk size in bytes [default: 1024]")
                .value_parser(clap::value_parser!(u64))
                .num_args(1),
        )
        .arg(
            Arg::new("max_size")
                .long("max-size")
                .help("Refuse files of this many bytes or more [default: 60000000]")
                .value_parser(clap::value_parser!(u64))
                .num_args(1),
        )
        .arg(
            Arg::new("whole")
                .long("whole")
                .help("Send the file in a single request")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("strict")
                .long("strict")
                .help("Stop at the first chunk the server does not accept")
                .action(ArgAction::SetTrue),
        );

    let abort = Command::new("abort")
        .about("Delete an upload session")
        .arg(Arg::new("url").help("Upload session URL").required(true));

    Command::new("orange-uploader")
        .about("Resumable chunked uploader for pre-created upload sessions")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(http.augment_command(upload))
        .subcommand(http.augment_command(abort))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let http = HttpCliPlugin::new();
    let matches = build_cli(&http).get_matches();

    match matches.subcommand() {
        Some(("upload", m)) => {
            let url = m.get_one::<String>("url").context("missing url")?;
            let file: PathBuf = m.get_one::<String>("file").context("missing file")?.into();
            let chunk_size = m.get_one::<u64>("chunk_size").copied().unwrap_or(DEFAULT_CHUNK_LIMIT);
            let max_size = m.get_one::<u64>("max_size").copied().unwrap_or(DEFAULT_UPLOAD_LIMIT);

            let mut ctx = TransportContext::default();
            http.apply_matches(m, &mut ctx)?;

            let config = UploadConfig {
                upload_limit: max_size,
                status_policy: if m.get_flag("strict") { StatusPolicy::EveryChunk } else { StatusPolicy::LastChunk },
            };
            let session = ChunkedUploadSession::new(Arc::new(HttpTransport::new(ctx)?), config);

            let rx = session.subscribe();
            let ui_task = tokio::spawn(render_progress(rx));

            let outcome = if m.get_flag("whole") {
                session.upload_whole(url, &file).await
            } else {
                session.upload_in_chunks(url, &file, chunk_size).await
            };
            drop(session);
            let _ = ui_task.await;

            let outcome = outcome.with_context(|| format!("upload {}", file.display()))?;
            if !outcome.is_success() {
                anyhow::bail!(
                    "upload rejected: status={} body={}",
                    outcome.status.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string()),
                    String::from_utf8_lossy(&outcome.body),
                );
            }
            println!(
                "Uploaded {} ({} in {} chunks)",
                file.display(),
                fmt_bytes(outcome.bytes_sent),
                outcome.chunks_sent
            );
        }
        Some(("abort", m)) => {
            let url = m.get_one::<String>("url").context("missing url")?;
            let mut ctx = TransportContext::default();
            http.apply_matches(m, &mut ctx)?;

            let session = ChunkedUploadSession::new(Arc::new(HttpTransport::new(ctx)?), UploadConfig::default());
            if !session.delete_session(url).await? {
                anyhow::bail!("server did not delete the upload session");
            }
            println!("Upload session deleted");
        }
        _ => {}
    }

    Ok(())
}

async fn render_progress(mut rx: tokio::sync::broadcast::Receiver<UploadEvent>) {
    let sty_bar = ProgressStyle::with_template(
        "{prefix} {bar:40.cyan/blue} {bytes}/{total_bytes} ({bytes_per_sec}, eta {eta}) {wide_msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    let pb = ProgressBar::hidden();

    loop {
        let evt = match rx.recv().await {
            Ok(e) => e,
            Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
            Err(_) => break,
        };

        match evt {
            UploadEvent::Started { source, total, chunks, .. } => {
                pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
                pb.set_style(sty_bar.clone());
                pb.set_length(total);
                pb.set_prefix(format!(
                    "[{}]",
                    source.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default()
                ));
                pb.set_message(format!("0/{} chunks", chunks));
            }
            UploadEvent::ChunkSent { index, chunks, status, .. } => {
                pb.set_message(format!("{}/{} chunks, last status {}", index + 1, chunks, status));
            }
            UploadEvent::Progress { sent, .. } => {
                pb.set_position(sent);
            }
            UploadEvent::StateChanged { state, .. } if state.is_terminal() => {
                if state == UploadState::Completed {
                    pb.finish_with_message("done");
                } else {
                    pb.abandon_with_message("failed");
                }
                break;
            }
            UploadEvent::StateChanged { .. } => {}
            UploadEvent::Error { scope, message } => {
                pb.println(format!("[ERROR] {}: {}", scope, message));
            }
            UploadEvent::Info { scope, message } => {
                pb.println(format!("[INFO] {}: {}", scope, message));
            }
        }
    }
}

fn fmt_bytes(n: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = 1024.0 * 1024.0;
    let f = n as f64;
    if f >= MB {
        format!("{:.2}MiB", f / MB)
    } else if f >= KB {
        format!("{:.2}KiB", f / KB)
    } else {
        format!("{}B", n)
    }
}
