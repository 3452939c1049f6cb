//! Receipt rendering and print dispatch

use std::io;
use std::process::Stdio;

use chrono::{DateTime, Local};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use qs_machine::{Outcome, OutcomeOrigin, PrintError, PrinterConfig, ReceiptPrinter};

const RULE: &str = "----------------------------------------";

/// Verification link for a verifier checksum
pub fn explorer_link(explorer_url: &str, checksum: &str) -> String {
    format!(
        "{}/reports/{}?lazy=1",
        explorer_url.trim_end_matches('/'),
        checksum
    )
}

/// Plain-text receipt for one settled spin
pub fn render_receipt(
    outcome: &Outcome,
    verified_checksum: Option<&str>,
    config: &PrinterConfig,
    printed_at: DateTime<Local>,
) -> String {
    let stops = outcome
        .stops
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join("  ");

    let mut lines = vec![
        config.title.clone(),
        RULE.to_string(),
        format!("Time:      {}", printed_at.format("%Y-%m-%d %H:%M:%S")),
        format!("Reels:     {}", stops),
        format!("Result:    {}", if outcome.is_winner { "WIN" } else { "NO WIN" }),
        format!(
            "Source:    {}",
            match outcome.origin {
                OutcomeOrigin::Local => "local (debug)",
                OutcomeOrigin::Remote => "oracle",
            }
        ),
        format!("Quote:     {}", outcome.checksum()),
    ];

    if let Some(timestamp) = outcome.metadata.get("timestamp") {
        let text = timestamp
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| timestamp.to_string());
        lines.push(format!("Issued:    {}", text));
    }

    lines.push(RULE.to_string());
    match verified_checksum {
        Some(checksum) => {
            lines.push(format!("Verified:  {}", checksum));
            lines.push(format!("Check at:  {}", explorer_link(&config.explorer_url, checksum)));
        }
        None => lines.push("Verified:  not available".to_string()),
    }
    lines.push(String::new());
    lines.join("\n")
}

/// Pipes rendered receipts into an external print command (`lp` by default)
#[derive(Debug, Clone)]
pub struct CommandPrinter {
    config: PrinterConfig,
}

impl CommandPrinter {
    pub fn new(config: PrinterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PrinterConfig {
        &self.config
    }

    /// Render and submit one receipt
    pub async fn submit(&self, outcome: &Outcome, checksum: Option<&str>) -> Result<(), PrintError> {
        let receipt = render_receipt(outcome, checksum, &self.config, Local::now());

        let mut child = Command::new(&self.config.command)
            .args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            let written = async {
                stdin.write_all(receipt.as_bytes()).await?;
                stdin.shutdown().await
            };
            match written.await {
                Ok(()) => {}
                // command exited early; its status says why
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                    log::debug!("[Printer] {} closed stdin early", self.config.command);
                }
                Err(e) => return Err(e.into()),
            }
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PrintError::CommandFailed(format!(
                "{} ({})",
                output.status,
                stderr.trim()
            )));
        }

        log::info!("[Printer] Receipt sent to {}", self.config.command);
        Ok(())
    }
}

impl ReceiptPrinter for CommandPrinter {
    fn print<'a>(
        &'a self,
        outcome: &'a Outcome,
        checksum: Option<&'a str>,
    ) -> BoxFuture<'a, Result<(), PrintError>> {
        self.submit(outcome, checksum).boxed()
    }
}
