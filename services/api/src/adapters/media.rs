//! services/api/src/adapters/media.rs
//!
//! This module contains the signer for direct-to-media-host uploads.
//! Only parameter signing happens here; the client uploads the file bytes
//! straight to the host, and no file content ever passes through this
//! service.

use sha2::{Digest, Sha256};

/// Signs upload parameters with the media host's shared API secret.
#[derive(Clone)]
pub struct MediaSigner {
    cloud_name: String,
    api_key: String,
    api_secret: String,
}

/// The signed parameter set a client needs for one direct upload.
#[derive(Debug, Clone)]
pub struct SignedUploadParams {
    pub signature: String,
    pub timestamp: i64,
    pub cloud_name: String,
    pub api_key: String,
    pub folder: String,
    pub resource_type: String,
}

impl MediaSigner {
    /// Creates a new `MediaSigner`.
    pub fn new(cloud_name: String, api_key: String, api_secret: String) -> Self {
        Self {
            cloud_name,
            api_key,
            api_secret,
        }
    }

    /// Signs the upload parameters for the given timestamp.
    ///
    /// The host's signing contract: parameters sorted by name, serialized
    /// as `key=value` joined with `&`, the API secret appended, and the
    /// whole string digested to lowercase hex.
    pub fn sign_upload(
        &self,
        resource_type: &str,
        folder: &str,
        timestamp: i64,
    ) -> SignedUploadParams {
        let params = [
            ("folder", folder.to_string()),
            ("resource_type", resource_type.to_string()),
            ("timestamp", timestamp.to_string()),
        ];

        let signature = sign_params(&params, &self.api_secret);

        SignedUploadParams {
            signature,
            timestamp,
            cloud_name: self.cloud_name.clone(),
            api_key: self.api_key.clone(),
            folder: folder.to_string(),
            resource_type: resource_type.to_string(),
        }
    }
}

fn sign_params(params: &[(&str, String)], api_secret: &str) -> String {
    let mut sorted: Vec<&(&str, String)> = params.iter().collect();
    sorted.sort_by_key(|(key, _)| *key);

    let to_sign = sorted
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    let digest = hasher.finalize();

    digest.iter().map(|b| format!("{:02x}", b)).collect()
}
