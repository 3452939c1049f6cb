//! Spin trigger channels
//!
//! Newline-delimited commands, one reply line each, on a TCP listener and
//! on stdin:
//!
//! | Command  | Reply                                   |
//! |----------|-----------------------------------------|
//! | `spin`   | `accepted g<n>` or `busy`               |
//! | `status` | controller snapshot as one JSON line    |
//! | `reload` | `reloaded` once the new config is live  |
//!
//! A reload rebuilds the pipeline and cue bus too, so `data_dir`,
//! `verify_url`, `[printer]` and `[audio]` changes apply from the next spin.
//! Only `[trigger]` needs a restart.
//! | `quit`   | none; the connection closes             |

use std::io;
use std::str::FromStr;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use qs_machine::{SpinHandle, SpinRequest, TriggerConfig};

use crate::source::ConfigSource;

/// Pause after a failed accept (e.g. out of file descriptors)
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Commands understood by the trigger channels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerCommand {
    Spin,
    Status,
    Reload,
    Quit,
}

impl FromStr for TriggerCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "spin" => Ok(Self::Spin),
            "status" => Ok(Self::Status),
            "reload" => Ok(Self::Reload),
            "quit" | "exit" => Ok(Self::Quit),
            other => Err(format!("unknown command '{}'", other)),
        }
    }
}

/// What to do with the connection after a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Line(String),
    Close,
}

/// Shared state of every trigger channel
#[derive(Clone)]
pub struct TriggerContext {
    handle: SpinHandle,
    source: ConfigSource,
    /// Channels bound at startup; reload cannot rebind them
    trigger: TriggerConfig,
}

impl TriggerContext {
    pub fn new(handle: SpinHandle, source: ConfigSource, trigger: TriggerConfig) -> Self {
        Self {
            handle,
            source,
            trigger,
        }
    }

    pub async fn execute(&self, command: TriggerCommand) -> Reply {
        match command {
            TriggerCommand::Spin => match self.handle.request_spin().await {
                Ok(SpinRequest::Accepted(ticket)) => {
                    Reply::Line(format!("accepted {}", ticket.generation()))
                }
                Ok(SpinRequest::Busy) => Reply::Line("busy".to_string()),
                Err(e) => Reply::Line(format!("error: {}", e)),
            },
            TriggerCommand::Status => match serde_json::to_string(&self.handle.snapshot()) {
                Ok(json) => Reply::Line(json),
                Err(e) => Reply::Line(format!("error: {}", e)),
            },
            TriggerCommand::Reload => self.reload().await,
            TriggerCommand::Quit => Reply::Close,
        }
    }

    /// Parse and run one input line; blank lines produce no reply
    pub async fn handle_line(&self, line: &str) -> Option<Reply> {
        if line.trim().is_empty() {
            return None;
        }
        match line.parse::<TriggerCommand>() {
            Ok(command) => Some(self.execute(command).await),
            Err(e) => {
                log::debug!("[Trigger] {}", e);
                Some(Reply::Line(format!("error: {}", e)))
            }
        }
    }

    async fn reload(&self) -> Reply {
        let config = match self.source.load() {
            Ok(config) => config,
            Err(e) => {
                log::warn!("[Trigger] Reload of {} failed: {}", self.source.path().display(), e);
                return Reply::Line(format!("error: {}", e));
            }
        };
        let applied = match self
            .handle
            .configure(config.spin_settings(), config.timing.clone())
            .await
        {
            Ok(()) => {
                self.handle
                    .replace_collaborators(qs_io::pipeline_for(&config), qs_io::cue_bus_for(&config))
                    .await
            }
            Err(e) => Err(e),
        };
        match applied {
            Ok(()) => {
                log::info!("[Trigger] Reloaded {}", self.source.path().display());
                if config.trigger != self.trigger {
                    log::warn!("[Trigger] [trigger] changes take effect after a restart");
                }
                Reply::Line("reloaded".to_string())
            }
            Err(e) => {
                log::warn!("[Trigger] Reload rejected: {}", e);
                Reply::Line(format!("error: {}", e))
            }
        }
    }
}

/// Serve commands from `reader` until EOF or `quit`
pub async fn serve_lines<R, W>(context: &TriggerContext, reader: R, mut writer: W) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        match context.handle_line(&line).await {
            None => continue,
            Some(Reply::Close) => break,
            Some(Reply::Line(text)) => {
                writer.write_all(text.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
        }
    }
    Ok(())
}

/// Bind the TCP trigger and serve each connection on its own task
pub async fn listen_tcp(context: TriggerContext, addr: &str) -> io::Result<JoinHandle<()>> {
    let listener = TcpListener::bind(addr).await?;
    log::info!("[Trigger] Listening on {}", listener.local_addr()?);
    Ok(tokio::spawn(accept_loop(context, listener)))
}

async fn accept_loop(context: TriggerContext, listener: TcpListener) {
    loop {
        let (socket, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                log::warn!("[Trigger] Accept failed: {}", e);
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                continue;
            }
        };

        log::debug!("[Trigger] {} connected", peer);
        let context = context.clone();
        tokio::spawn(async move {
            let (read, write) = socket.into_split();
            if let Err(e) = serve_lines(&context, BufReader::new(read), write).await {
                log::warn!("[Trigger] {} dropped: {}", peer, e);
            }
            log::debug!("[Trigger] {} disconnected", peer);
        });
    }
}

/// Serve commands typed on stdin
pub fn spawn_stdin(context: TriggerContext) -> JoinHandle<()> {
    tokio::spawn(async move {
        let stdin = BufReader::new(tokio::io::stdin());
        if let Err(e) = serve_lines(&context, stdin, tokio::io::stdout()).await {
            log::warn!("[Trigger] stdin failed: {}", e);
        }
        log::info!("[Trigger] stdin closed");
    })
}
