//! Outcome resolver: local sampling or one request to the remote oracle

use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{ResolverMode, SpinSettings};
use crate::error::ResolutionError;
use crate::outcome::{parse_oracle_response, Outcome};

/// Anything that can produce a spin outcome
pub trait OutcomeSource: Send + Sync {
    fn resolve<'a>(
        &'a self,
        settings: &'a SpinSettings,
    ) -> BoxFuture<'a, Result<Outcome, ResolutionError>>;
}

/// Mode-dispatching resolver.
///
/// Local mode draws three independent uniform stops; remote mode issues
/// exactly one POST to the configured endpoint. There is no retry: a failed
/// attempt goes straight back to the controller.
pub struct OutcomeResolver {
    rng: Mutex<StdRng>,
    client: reqwest::Client,
}

impl OutcomeResolver {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
            client: reqwest::Client::new(),
        }
    }

    /// Seeded RNG for reproducible local outcomes
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            client: reqwest::Client::new(),
        }
    }

    /// Draw a local outcome (no I/O)
    pub fn resolve_local(&self, settings: &SpinSettings) -> Result<Outcome, ResolutionError> {
        let (min, max) = (settings.stop_min, settings.stop_max);
        if min > max {
            return Err(ResolutionError::InvalidStopRange { min, max });
        }

        let stops = {
            let mut rng = self.rng.lock();
            [
                rng.random_range(min..=max),
                rng.random_range(min..=max),
                rng.random_range(min..=max),
            ]
        };
        log::info!("[Resolver] Local outcome {:?}", stops);
        Ok(Outcome::local(stops))
    }

    /// Ask the oracle once
    pub async fn resolve_remote(&self, settings: &SpinSettings) -> Result<Outcome, ResolutionError> {
        if settings.url.is_empty() {
            return Err(ResolutionError::MissingEndpoint);
        }

        log::info!("[Resolver] Requesting outcome from {}", settings.url);
        let response = self
            .client
            .post(&settings.url)
            .timeout(Duration::from_millis(settings.resolve_timeout_ms))
            .send()
            .await
            .map_err(|e| transport_error(e, settings.resolve_timeout_ms))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolutionError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| transport_error(e, settings.resolve_timeout_ms))?;
        let outcome = parse_oracle_response(&body)?;
        log::info!(
            "[Resolver] Remote outcome {:?} (winner: {}, attestation: {} bytes)",
            outcome.stops,
            outcome.is_winner,
            outcome.attestation.as_ref().map_or(0, Vec::len)
        );
        Ok(outcome)
    }
}

impl Default for OutcomeResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl OutcomeSource for OutcomeResolver {
    fn resolve<'a>(
        &'a self,
        settings: &'a SpinSettings,
    ) -> BoxFuture<'a, Result<Outcome, ResolutionError>> {
        match settings.mode {
            ResolverMode::Local => futures_util::future::ready(self.resolve_local(settings)).boxed(),
            ResolverMode::Remote => self.resolve_remote(settings).boxed(),
        }
    }
}

fn transport_error(error: reqwest::Error, timeout_ms: u64) -> ResolutionError {
    if error.is_timeout() {
        ResolutionError::Timeout(timeout_ms)
    } else {
        ResolutionError::Transport(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::OutcomeOrigin;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response, return the endpoint URL
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });
        format!("http://{}/slot_machine/spin", addr)
    }

    #[test]
    fn test_local_outcome_in_range() {
        let resolver = OutcomeResolver::with_seed(7);
        let settings = SpinSettings::local(0, 7);
        for _ in 0..200 {
            let outcome = resolver.resolve_local(&settings).unwrap();
            assert!(outcome.stops.iter().all(|s| *s <= 7));
            assert_eq!(outcome.origin, OutcomeOrigin::Local);
            assert_eq!(outcome.is_winner, outcome.stops.iter().all(|s| *s == outcome.stops[0]));
        }
    }

    #[test]
    fn test_local_single_value_range_always_wins() {
        let resolver = OutcomeResolver::with_seed(1);
        let outcome = resolver.resolve_local(&SpinSettings::local(3, 3)).unwrap();
        assert_eq!(outcome.stops, [3, 3, 3]);
        assert!(outcome.is_winner);
    }

    #[test]
    fn test_local_invalid_range() {
        let resolver = OutcomeResolver::with_seed(1);
        assert_eq!(
            resolver.resolve_local(&SpinSettings::local(5, 2)),
            Err(ResolutionError::InvalidStopRange { min: 5, max: 2 })
        );
    }

    #[tokio::test]
    async fn test_dispatch_by_mode() {
        let resolver = OutcomeResolver::with_seed(3);
        let outcome = resolver.resolve(&SpinSettings::local(0, 7)).await.unwrap();
        assert_eq!(outcome.origin, OutcomeOrigin::Local);

        let missing = resolver.resolve(&SpinSettings::remote("")).await;
        assert_eq!(missing, Err(ResolutionError::MissingEndpoint));
    }

    #[tokio::test]
    async fn test_remote_outcome() {
        let url = serve_once(
            "200 OK",
            r#"{"slots":[3,3,3],"is_winner":false,"quote":"0x0102"}"#,
        )
        .await;
        let resolver = OutcomeResolver::new();
        let outcome = resolver.resolve(&SpinSettings::remote(url)).await.unwrap();

        assert_eq!(outcome.stops, [3, 3, 3]);
        assert!(!outcome.is_winner);
        assert_eq!(outcome.attestation, Some(vec![1, 2]));
    }

    #[tokio::test]
    async fn test_remote_http_error() {
        let url = serve_once("500 Internal Server Error", "{}").await;
        let resolver = OutcomeResolver::new();
        let result = resolver.resolve(&SpinSettings::remote(url)).await;
        assert_eq!(result, Err(ResolutionError::Status(500)));
    }

    #[tokio::test]
    async fn test_remote_malformed_body() {
        let url = serve_once("200 OK", r#"{"slots":[1,2]}"#).await;
        let resolver = OutcomeResolver::new();
        let result = resolver.resolve(&SpinSettings::remote(url)).await;
        assert!(matches!(result, Err(ResolutionError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_remote_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let resolver = OutcomeResolver::new();
        let settings = SpinSettings::remote(format!("http://{}/spin", addr));
        let result = resolver.resolve(&settings).await;
        assert!(matches!(result, Err(ResolutionError::Transport(_))));
    }

    #[tokio::test]
    async fn test_remote_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            // accept and never answer
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let resolver = OutcomeResolver::new();
        let mut settings = SpinSettings::remote(format!("http://{}/spin", addr));
        settings.resolve_timeout_ms = 100;
        let result = resolver.resolve(&settings).await;
        assert_eq!(result, Err(ResolutionError::Timeout(100)));
    }
}
