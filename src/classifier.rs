use async_trait::async_trait;

use crate::error::ClassifyError;
use crate::types::ClassificationResult;

/// Remote capability that places a list of addresses in countries.
///
/// Implementations return one result per input address, in input order.
/// A shorter result list is tolerated by callers; missing entries are
/// treated as unclassifiable.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(
        &self,
        addresses: &[String],
    ) -> Result<Vec<ClassificationResult>, ClassifyError>;
}
