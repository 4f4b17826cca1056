use std::future::Future;
use std::time::Duration;

use serde_json::Value;

use crate::capture::SampledFrame;

use super::types::{parse_response, FrameRequest, RecognitionError, SubmitOutcome};

const USER_AGENT: &str = concat!("facecheck/", env!("CARGO_PKG_VERSION"));
const MAX_ERROR_BODY_CHARS: usize = 200;

/// The external recognition service, as seen by the loop.
///
/// Implementations issue exactly one request per call. No retries: the next
/// tick brings a fresher frame anyway.
pub trait RecognitionClient: Send + Sync + 'static {
    fn submit(
        &self,
        frame: SampledFrame,
    ) -> impl Future<Output = Result<SubmitOutcome, RecognitionError>> + Send;
}

pub struct HttpRecognitionClient {
    http: reqwest::Client,
    endpoint: reqwest::Url,
}

impl HttpRecognitionClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, RecognitionError> {
        let endpoint = reqwest::Url::parse(endpoint)
            .map_err(|err| RecognitionError::Decode(format!("invalid endpoint {endpoint}: {err}")))?;
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self { http, endpoint })
    }

    pub fn endpoint(&self) -> &reqwest::Url {
        &self.endpoint
    }
}

impl RecognitionClient for HttpRecognitionClient {
    fn submit(
        &self,
        frame: SampledFrame,
    ) -> impl Future<Output = Result<SubmitOutcome, RecognitionError>> + Send {
        async move {
            let encoded = frame.to_base64();
            let response = self
                .http
                .post(self.endpoint.clone())
                .json(&FrameRequest { frame: &encoded })
                .send()
                .await?;

            let status = response.status();
            let bytes = response.bytes().await?;

            // The service reports failures as `{success: false}` with a 4xx, so
            // the body is read regardless of status.
            let body: Value = match serde_json::from_slice(&bytes) {
                Ok(body) => body,
                Err(err) if status.is_success() => {
                    return Err(RecognitionError::Decode(err.to_string()))
                }
                Err(_) => {
                    return Err(RecognitionError::Status {
                        status: status.as_u16(),
                        body: String::from_utf8_lossy(&bytes)
                            .chars()
                            .take(MAX_ERROR_BODY_CHARS)
                            .collect(),
                    })
                }
            };

            parse_response(frame.sequence, &body)
        }
    }
}
