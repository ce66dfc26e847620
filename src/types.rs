use serde::{Deserialize, Serialize};

/// Error text for a result that is missing, below the confidence threshold,
/// or classified as `UNKNOWN`.
pub const LOW_CONFIDENCE_ERROR: &str = "Confidence too low or unknown";

/// Sentinel short form the model uses when it cannot place an address.
pub const UNKNOWN_COUNTRY: &str = "UNKNOWN";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressRecord {
    pub position: usize,
    pub text: String,
}

impl AddressRecord {
    pub fn new(position: usize, text: impl Into<String>) -> Self {
        Self {
            position,
            text: text.into(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// One classification candidate as returned by the remote model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    #[serde(default)]
    pub short_form: Option<String>,
    #[serde(default)]
    pub long_form: Option<String>,
    pub confidence: f64,
}

impl ClassificationResult {
    pub fn new(short_form: &str, long_form: &str, confidence: f64) -> Self {
        Self {
            short_form: Some(short_form.to_string()),
            long_form: Some(long_form.to_string()),
            confidence,
        }
    }

    /// Returns the `(short_form, long_form)` pair when this result clears
    /// `min_confidence` and names an actual country.
    pub fn accepted(&self, min_confidence: f64) -> Option<(&str, &str)> {
        if self.confidence.is_nan() || self.confidence < min_confidence {
            return None;
        }
        let short_form = self.short_form.as_deref()?.trim();
        let long_form = self.long_form.as_deref()?.trim();
        if short_form.is_empty()
            || long_form.is_empty()
            || short_form.eq_ignore_ascii_case(UNKNOWN_COUNTRY)
        {
            return None;
        }
        Some((short_form, long_form))
    }
}

/// Envelope the model is instructed to reply with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationBatchResponse {
    pub results: Vec<ClassificationResult>,
}

/// One row of the output table.
///
/// Either all three success fields or `error` are populated, never both.
/// Build values with [`OutputRecord::classified`] or [`OutputRecord::failed`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputRecord {
    pub address: String,
    #[serde(rename = "shortForm")]
    short_form: Option<String>,
    #[serde(rename = "longForm")]
    long_form: Option<String>,
    confidence: Option<f64>,
    error: Option<String>,
}

impl OutputRecord {
    pub fn classified(
        address: impl Into<String>,
        short_form: impl Into<String>,
        long_form: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self {
            address: address.into(),
            short_form: Some(short_form.into()),
            long_form: Some(long_form.into()),
            confidence: Some(confidence),
            error: None,
        }
    }

    pub fn failed(address: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            short_form: None,
            long_form: None,
            confidence: None,
            error: Some(error.into()),
        }
    }

    pub fn short_form(&self) -> Option<&str> {
        self.short_form.as_deref()
    }

    pub fn long_form(&self) -> Option<&str> {
        self.long_form.as_deref()
    }

    pub fn confidence(&self) -> Option<f64> {
        self.confidence
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub index: usize,
    pub records: Vec<AddressRecord>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
