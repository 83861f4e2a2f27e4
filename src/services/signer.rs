//! `i-sign` header generation for upstream calls.
//!
//! Every upstream request carries a compact JSON object
//! `{"nonce":..,"timestamp":..,"sign":..}` where `sign` is the lowercase hex
//! MD5 of `nonce=<nonce>&timestamp=<timestamp>&app_key=<key>`. The upstream
//! compares the header byte-for-byte, so field order and the absence of
//! whitespace matter.

use rand::Rng;
use serde::Serialize;

/// One freshly generated signature. Never cached or reused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Signature {
    pub nonce: String,
    pub timestamp: i64,
    pub sign: String,
}

impl Signature {
    /// Compact JSON in `nonce, timestamp, sign` order.
    pub fn to_header_value(&self) -> String {
        // A struct of two strings and an integer cannot fail to serialize.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Produces time- and nonce-bound signatures from a shared app key.
#[derive(Clone)]
pub struct Signer {
    app_key: String,
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer").finish_non_exhaustive()
    }
}

impl Signer {
    pub fn new(app_key: impl Into<String>) -> Self {
        Self {
            app_key: app_key.into(),
        }
    }

    /// Generate the header value for one upstream call.
    pub fn generate(&self) -> String {
        self.sign_with(random_nonce(), chrono::Utc::now().timestamp_millis())
            .to_header_value()
    }

    /// Deterministic signing for a given nonce and timestamp.
    pub fn sign_with(&self, nonce: String, timestamp: i64) -> Signature {
        let sign = digest(&nonce, timestamp, &self.app_key);
        Signature {
            nonce,
            timestamp,
            sign,
        }
    }
}

/// 16 lowercase hex characters (64 random bits).
fn random_nonce() -> String {
    format!("{:016x}", rand::thread_rng().gen::<u64>())
}

/// MD5 over the canonical `nonce=..&timestamp=..&app_key=..` string.
pub fn digest(nonce: &str, timestamp: i64, app_key: &str) -> String {
    let payload = format!(
        "nonce={}&timestamp={}&app_key={}",
        nonce, timestamp, app_key
    );
    format!("{:x}", md5::compute(payload.as_bytes()))
}
