use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use attest_scan::types::ScanReport;
use attest_scan::{
    server, source, ClientConfig, RequestEncoding, ScanBackend, ScanClient, ScanError,
    ScanSession, SessionState, Submission,
};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing::{debug, info};

/// attest-scan: submit a dependency manifest to a license scanning service and report compliance.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "attest-scan",
    version,
    about = "Submit a dependency manifest to a license scanning service and report compliance.",
    long_about = None
)]
struct Cli {
    /// Manifest to scan (requirements.txt, package.json, Cargo.lock, ...).
    file: Option<PathBuf>,

    /// Base URL of the scanning service; requests go to `<endpoint>/scan`.
    #[arg(long, default_value = attest_scan::client::DEFAULT_BASE_URL)]
    endpoint: String,

    /// Request body encoding.
    #[arg(long, value_enum, default_value_t = RequestEncoding::Json)]
    encoding: RequestEncoding,

    /// Request timeout in milliseconds.
    #[arg(long = "timeout-ms", default_value_t = 30_000)]
    timeout_ms: u64,

    /// Write the report as pretty JSON to this path (optional).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Print the final score without animating the progress bar.
    #[arg(long = "no-animate", default_value_t = false)]
    no_animate: bool,

    /// Start the embedded HTTP API exposing the scan session.
    #[arg(long = "serve-ui", default_value_t = false)]
    serve_ui: bool,

    /// Address for the embedded HTTP API.
    #[arg(long, default_value = "127.0.0.1:8080")]
    bind: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = ClientConfig {
        base_url: cli.endpoint.clone(),
        timeout: Duration::from_millis(cli.timeout_ms),
        encoding: cli.encoding,
    };
    let client = ScanClient::new(&config).context("failed to set up scan client")?;
    info!(endpoint = %client.endpoint(), encoding = ?config.encoding, "scan client ready");

    let backend: Arc<dyn ScanBackend> = Arc::new(client);
    let mut session = ScanSession::new(backend);
    if cli.no_animate {
        session = session.without_animation();
    }

    // Start embedded API server if requested (non-blocking background task)
    if cli.serve_ui {
        let bind = cli.bind.clone();
        let state = server::AppState::new(session.clone());
        tokio::spawn(async move {
            if let Err(e) = server::spawn_server(&bind, state).await {
                eprintln!("HTTP API server error: {e}");
            }
        });
        println!("Scan API starting at http://{} (Ctrl+C to stop)", cli.bind);
    }

    match source::read_request(cli.file.as_deref()).await {
        Ok(request) => {
            run_scan(&session, request, !cli.no_animate, cli.output.as_deref()).await?;
        }
        Err(ScanError::NoFileSelected) => debug!("no file selected"),
        Err(e) => return Err(e).context("failed to load manifest"),
    }

    // If the API is running, keep the process alive until Ctrl+C.
    if cli.serve_ui {
        println!("Press Ctrl+C to stop the server...");
        let _ = tokio::signal::ctrl_c().await;
    }

    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

async fn run_scan(
    session: &ScanSession<dyn ScanBackend>,
    request: attest_scan::ScanRequest,
    animate: bool,
    output: Option<&std::path::Path>,
) -> Result<()> {
    println!("Scanning {}...", request.file_name);
    match session.scan(request).await {
        Submission::Finished(SessionState::Displaying { report }) => {
            if animate {
                session
                    .follow_progress(&report, |value| {
                        print!("\r{}", progress_bar(value));
                        let _ = std::io::stdout().flush();
                    })
                    .await;
                println!();
            } else {
                println!("{}", progress_bar(report.score));
            }
            print_report(&report, &session.history().await);
            if let Some(path) = output {
                write_report_json(path, &report)
                    .with_context(|| format!("failed to write JSON to {}", path.display()))?;
                println!("Wrote JSON report to {}", path.display());
            }
            Ok(())
        }
        Submission::Finished(SessionState::Failed { notice, reason }) => {
            eprintln!("{notice}");
            Err(anyhow!(reason))
        }
        Submission::Dropped => Err(anyhow!("a scan is already in progress")),
        other => Err(anyhow!("scan did not complete: {other:?}")),
    }
}

fn progress_bar(value: u8) -> String {
    const WIDTH: usize = 40;
    let filled = WIDTH * usize::from(value.min(100)) / 100;
    format!(
        "[{}{}] {:>3}%",
        "#".repeat(filled),
        "-".repeat(WIDTH - filled),
        value
    )
}

fn print_report(report: &ScanReport, history: &[String]) {
    println!("\nScan results for {}", report.file_name);
    if report.detected.is_empty() {
        println!("  Detected licenses : none");
    } else {
        println!("  Detected licenses : {}", report.detected.join(", "));
    }

    if report.violations.is_empty() {
        println!("  Violations        : None");
    } else {
        let lic_w = report
            .violations
            .iter()
            .map(|v| v.license.len())
            .max()
            .unwrap_or(0)
            .max("license".len());
        println!("  Violations        : {}", report.violations.len());
        println!("    {:<lic_w$}  {}", "license", "explanation", lic_w = lic_w);
        println!("    {:-<lic_w$}  {:-<11}", "", "", lic_w = lic_w);
        for v in &report.violations {
            println!("    {:<lic_w$}  {}", v.license, v.explanation, lic_w = lic_w);
        }
    }
    println!("  Compliance score  : {}%", report.score);
    if let Some(reported) = report.reported_score {
        println!("  Service score     : {reported}%");
    }

    if !history.is_empty() {
        println!("\nRecent scans:");
        for name in history {
            println!("  - {name}");
        }
    }
}

fn write_report_json(path: &std::path::Path, report: &ScanReport) -> Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, report)?;
    Ok(())
}
