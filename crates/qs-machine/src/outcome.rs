//! Spin outcome and the oracle wire format

use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use qs_stage::{AllReelsStopped, REEL_COUNT};

use crate::error::ResolutionError;

/// Who produced the outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeOrigin {
    /// Sampled on the machine (debug mode)
    Local,
    /// Returned by the remote oracle
    Remote,
}

/// Resolved result of one spin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub stops: [u32; REEL_COUNT],
    pub is_winner: bool,
    /// Opaque proof payload (remote outcomes only)
    #[serde(default, with = "hex_bytes", skip_serializing_if = "Option::is_none")]
    pub attestation: Option<Vec<u8>>,
    pub origin: OutcomeOrigin,
    /// Extra oracle fields, kept verbatim
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Outcome {
    /// Local outcome: winner iff all stops match
    pub fn local(stops: [u32; REEL_COUNT]) -> Self {
        Self {
            stops,
            is_winner: all_equal(&stops),
            attestation: None,
            origin: OutcomeOrigin::Local,
            metadata: serde_json::Map::new(),
        }
    }

    /// Remote outcome; the oracle's winner flag is taken as-is
    pub fn remote(stops: [u32; REEL_COUNT], is_winner: bool, attestation: Option<Vec<u8>>) -> Self {
        Self {
            stops,
            is_winner,
            attestation,
            origin: OutcomeOrigin::Remote,
            metadata: serde_json::Map::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Map<String, serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Final win flag once the reels have landed.
    ///
    /// Local outcomes are confirmed against the stops the reels reported.
    /// Remote outcomes keep the oracle's flag; it is never recomputed.
    pub fn settle(&self, stopped: &AllReelsStopped) -> bool {
        match self.origin {
            OutcomeOrigin::Local => stopped.is_matching(),
            OutcomeOrigin::Remote => self.is_winner,
        }
    }

    /// Bytes handed to the store and verifier: the attestation when present,
    /// otherwise the outcome's JSON record
    pub fn blob(&self) -> Vec<u8> {
        match &self.attestation {
            Some(bytes) => bytes.clone(),
            None => serde_json::to_vec(self).unwrap_or_default(),
        }
    }

    /// SHA-256 of [`Outcome::blob`], lowercase hex
    pub fn checksum(&self) -> String {
        checksum(&self.blob())
    }
}

/// SHA-256, lowercase hex
pub fn checksum(blob: &[u8]) -> String {
    hex::encode(Sha256::digest(blob))
}

fn all_equal(stops: &[u32; REEL_COUNT]) -> bool {
    stops.iter().all(|s| *s == stops[0])
}

// ═══════════════════════════════════════════════════════════════════════════════
// WIRE FORMAT
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
struct OracleResponse {
    #[serde(alias = "reels")]
    slots: Vec<u32>,
    is_winner: bool,
    #[serde(default)]
    quote: Option<String>,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

/// Parse an oracle response body into a remote outcome
pub fn parse_oracle_response(body: &[u8]) -> Result<Outcome, ResolutionError> {
    let response: OracleResponse =
        serde_json::from_slice(body).map_err(|e| ResolutionError::Malformed(e.to_string()))?;

    let stops: [u32; REEL_COUNT] = response.slots.as_slice().try_into().map_err(|_| {
        ResolutionError::Malformed(format!(
            "expected {} stops, got {}",
            REEL_COUNT,
            response.slots.len()
        ))
    })?;

    let attestation = match response.quote.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(text) => Some(decode_attestation(text)?),
    };

    Ok(Outcome::remote(stops, response.is_winner, attestation).with_metadata(response.extra))
}

/// Hex (optionally `0x`-prefixed) or standard base64
pub fn decode_attestation(text: &str) -> Result<Vec<u8>, ResolutionError> {
    let stripped = text.strip_prefix("0x").unwrap_or(text);
    if let Ok(bytes) = hex::decode(stripped) {
        return Ok(bytes);
    }
    base64::engine::general_purpose::STANDARD
        .decode(text)
        .map_err(|_| ResolutionError::Malformed("attestation is neither hex nor base64".into()))
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => s.serialize_str(&format!("0x{}", hex::encode(bytes))),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        let text = Option::<String>::deserialize(d)?;
        text.map(|t| hex::decode(t.trim_start_matches("0x")).map_err(serde::de::Error::custom))
            .transpose()
    }
}
