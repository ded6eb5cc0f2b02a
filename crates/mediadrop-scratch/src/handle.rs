//! Signed retrieval handles.
//!
//! A handle names an artifact and an optional target format. The signer binds
//! both to an expiry with HMAC-SHA256 so clients cannot point `/stream` at
//! arbitrary files or keep links alive forever.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use hmac::digest::{Key, KeyInit};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{ScratchError, ScratchResult};

/// Minimum key length accepted by [`HandleSigner::new`].
pub const MIN_SECRET_LEN: usize = 16;

type HmacSha256 = Hmac<Sha256>;

/// Unsigned reference to a scratch artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalHandle {
    /// Artifact file name inside the scratch directory.
    pub artifact: String,
    /// Target format, e.g. `mp3`.
    pub requested_format: Option<String>,
}

impl RetrievalHandle {
    /// Handle for the artifact as stored.
    #[must_use]
    pub fn original(artifact: impl Into<String>) -> Self {
        Self {
            artifact: artifact.into(),
            requested_format: None,
        }
    }

    /// Handle asking for the artifact converted to `format`.
    #[must_use]
    pub fn converted(artifact: impl Into<String>, format: impl Into<String>) -> Self {
        Self {
            artifact: artifact.into(),
            requested_format: Some(format.into()),
        }
    }
}

/// A handle plus its expiry and signature, as carried in `/stream` queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedHandle {
    /// Artifact file name.
    pub file: String,
    /// Target format.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Unix timestamp (seconds) after which the handle is rejected.
    pub expires: i64,
    /// URL-safe base64 HMAC-SHA256.
    pub sig: String,
}

impl SignedHandle {
    /// URL query string (`file=..&format=..&expires=..&sig=..`).
    #[must_use]
    pub fn to_query(&self) -> String {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        query.append_pair("file", &self.file);
        if let Some(format) = &self.format {
            query.append_pair("format", format);
        }
        query.append_pair("expires", &self.expires.to_string());
        query.append_pair("sig", &self.sig);
        query.finish()
    }
}

/// Issues and verifies [`SignedHandle`]s.
#[derive(Clone)]
pub struct HandleSigner {
    keyed: Arc<HmacSha256>,
    ttl: Duration,
}

impl fmt::Debug for HandleSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleSigner")
            .field("key", &"<redacted>")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl HandleSigner {
    /// Signer keyed with a configured secret.
    ///
    /// # Errors
    ///
    /// Returns `WeakSecret` when the secret is shorter than [`MIN_SECRET_LEN`].
    pub fn new(secret: &[u8], ttl: Duration) -> ScratchResult<Self> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(ScratchError::WeakSecret {
                min_len: MIN_SECRET_LEN,
            });
        }
        let keyed = <HmacSha256 as KeyInit>::new_from_slice(secret).map_err(|_| {
            ScratchError::WeakSecret {
                min_len: MIN_SECRET_LEN,
            }
        })?;
        Ok(Self {
            keyed: Arc::new(keyed),
            ttl,
        })
    }

    /// Signer keyed with a random block-sized key; handles die with the process.
    #[must_use]
    pub fn random(ttl: Duration) -> Self {
        let mut key = Key::<HmacSha256>::default();
        rand::fill(key.as_mut_slice());
        Self {
            keyed: Arc::new(<HmacSha256 as KeyInit>::new(&key)),
            ttl,
        }
    }

    /// Sign `handle` with an expiry of now plus the configured TTL.
    #[must_use]
    pub fn sign(&self, handle: &RetrievalHandle) -> SignedHandle {
        self.sign_at(handle, Utc::now().timestamp())
    }

    /// Sign `handle` as if the current time were `now` (unix seconds).
    #[must_use]
    pub fn sign_at(&self, handle: &RetrievalHandle, now: i64) -> SignedHandle {
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let expires = now.saturating_add(ttl);
        let format = handle.requested_format.as_deref();
        SignedHandle {
            file: handle.artifact.clone(),
            format: handle.requested_format.clone(),
            expires,
            sig: URL_SAFE_NO_PAD.encode(
                self.mac(&handle.artifact, format, expires)
                    .finalize()
                    .into_bytes(),
            ),
        }
    }

    /// Verify a handle against the current time.
    ///
    /// # Errors
    ///
    /// Returns `AccessDenied` when the signature is malformed, wrong or expired.
    pub fn verify(&self, signed: &SignedHandle) -> ScratchResult<RetrievalHandle> {
        self.verify_at(signed, Utc::now().timestamp())
    }

    /// Verify a handle as if the current time were `now`.
    ///
    /// # Errors
    ///
    /// Returns `AccessDenied` when the signature is malformed, wrong or expired.
    pub fn verify_at(&self, signed: &SignedHandle, now: i64) -> ScratchResult<RetrievalHandle> {
        let provided = URL_SAFE_NO_PAD
            .decode(signed.sig.as_bytes())
            .map_err(|_| ScratchError::denied(&signed.file, "malformed_signature"))?;
        self.mac(&signed.file, signed.format.as_deref(), signed.expires)
            .verify_slice(&provided)
            .map_err(|_| ScratchError::denied(&signed.file, "bad_signature"))?;
        if now > signed.expires {
            return Err(ScratchError::denied(&signed.file, "expired"));
        }
        Ok(RetrievalHandle {
            artifact: signed.file.clone(),
            requested_format: signed.format.clone(),
        })
    }

    fn mac(&self, artifact: &str, format: Option<&str>, expires: i64) -> HmacSha256 {
        // Length prefixes keep field boundaries unambiguous.
        let format = format.unwrap_or("");
        let mut mac = HmacSha256::clone(&self.keyed);
        mac.update(format!("{}:{artifact}", artifact.len()).as_bytes());
        mac.update(format!("{}:{format}", format.len()).as_bytes());
        mac.update(expires.to_string().as_bytes());
        mac
    }
}
