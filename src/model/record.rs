//! Fingerprint records loaded from the input feed.

use serde::{Deserialize, Serialize};

use super::RecordId;

/// One fingerprinted audio file.
///
/// Records are immutable once loaded and shared read-only across the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FingerprintRecord {
    /// Catalog entity (asset) the file belongs to.
    #[serde(alias = "asset_id", alias = "assetID")]
    pub entity_id: String,
    /// Identifies the physical file variant (for example the storage key).
    #[serde(alias = "file_key", alias = "fileKey")]
    pub variant_key: String,
    /// Audio duration in seconds.
    pub duration: f64,
    /// Opaque perceptual fingerprint payload.
    pub fingerprint: String,
    /// Catalog the file originates from.
    #[serde(default)]
    pub source: String,
    /// Container or codec format (mp3, wav, ...).
    #[serde(default)]
    pub format: String,
}

impl FingerprintRecord {
    /// Identity of this record within a pair key.
    pub fn id(&self) -> RecordId {
        RecordId::new(&self.entity_id, &self.variant_key)
    }

    /// Reason this record cannot take part in a comparison, if any.
    pub fn rejection_reason(&self) -> Option<&'static str> {
        if !self.duration.is_finite() || self.duration <= 0.0 {
            Some("duration must be a positive number")
        } else if self.fingerprint.is_empty() {
            Some("fingerprint is empty")
        } else if self.variant_key.is_empty() {
            Some("variant key is empty")
        } else {
            None
        }
    }
}
