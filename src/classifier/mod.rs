pub mod http;
pub mod types;

use crate::record::RawRecord;
use std::future::Future;
use tokio_util::sync::CancellationToken;

pub use types::{
    ClassificationRequest, ClassificationResult, ClassifyError, Label, PredictResponse,
    FEATURE_COLUMNS,
};

/// One scoring call per invocation, no retries.
pub trait Classifier {
    fn score(
        &self,
        req: &ClassificationRequest,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<ClassificationResult, ClassifyError>>;

    fn classify(
        &self,
        row: &RawRecord,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<ClassificationResult, ClassifyError>> {
        let req = ClassificationRequest::from_record(row);
        async move { self.score(&req, cancel).await }
    }
}
