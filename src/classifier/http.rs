use super::{types::*, Classifier};
use crate::config::Config;
use anyhow::{Context, Result};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub struct HttpClassifier {
    endpoint: String,
    http: reqwest::Client,
}

impl HttpClassifier {
    pub fn new(cfg: &Config) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if cfg.classifier.timeout_seconds > 0 {
            builder = builder.timeout(Duration::from_secs(cfg.classifier.timeout_seconds));
        }
        if cfg.classifier.connect_timeout_seconds > 0 {
            builder = builder
                .connect_timeout(Duration::from_secs(cfg.classifier.connect_timeout_seconds));
        }
        let http = builder.build().with_context(|| "building HTTP client")?;

        Ok(Self {
            endpoint: endpoint_url(&cfg.classifier.base_url, &cfg.classifier.predict_path),
            http,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post(&self, req: &ClassificationRequest) -> Result<ClassificationResult, ClassifyError> {
        debug!(endpoint = %self.endpoint, "predict request");
        let resp = self
            .http
            .post(&self.endpoint)
            .json(req)
            .send()
            .await
            .map_err(transport)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.error)
                .unwrap_or_else(|| "Prediction failed".to_string());
            warn!(status = status.as_u16(), "classifier returned error: {message}");
            return Err(ClassifyError::Transport {
                status: Some(status.as_u16()),
                message,
            });
        }

        let body: PredictResponse = resp.json().await.map_err(transport)?;
        Ok(body.into())
    }
}

impl Classifier for HttpClassifier {
    async fn score(
        &self,
        req: &ClassificationRequest,
        cancel: &CancellationToken,
    ) -> Result<ClassificationResult, ClassifyError> {
        if cancel.is_cancelled() {
            return Err(ClassifyError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ClassifyError::Cancelled),
            res = self.post(req) => res,
        }
    }
}

pub fn endpoint_url(base_url: &str, path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if path.is_empty() {
        base.to_string()
    } else if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

fn transport(err: reqwest::Error) -> ClassifyError {
    ClassifyError::Transport {
        status: err.status().map(|s| s.as_u16()),
        message: err.to_string(),
    }
}
