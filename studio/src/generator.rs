//! Model fallback: try each model in order, issuing `desired_count`
//! independent calls per model, and stop at the first model that yields an
//! image.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use gemini_studio_types::config::GenerationConfig;
use gemini_studio_types::request::GenerateContentRequest;

use crate::credentials::Credential;
use crate::decode::{classify_response, GeneratedImage};
use crate::error::{Error, Result};
use crate::request::GenerationRequest;
use crate::transport::Transport;

/// 默认模型回退顺序。
pub const DEFAULT_MODEL_FALLBACK_LIST: [&str; 3] = [
    "imagen-3.0-generate-001",
    "gemini-2.0-flash-exp",
    "gemini-2.5-flash-image",
];

/// 顺序调用之间的默认间隔。
pub const DEFAULT_CALL_SPACING: Duration = Duration::from_secs(2);

/// 同一模型内多次调用的派发方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// 逐个调用，两次调用之间等待 `spacing`。
    Sequential { spacing: Duration },
    /// 同时发出全部调用，全部结束后汇总。
    Concurrent,
}

impl Default for DispatchMode {
    fn default() -> Self {
        Self::Sequential {
            spacing: DEFAULT_CALL_SPACING,
        }
    }
}

/// 成功的生成结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResult {
    /// 产出图片的模型。
    pub model: String,
    /// 按调用顺序排列的图片。
    pub images: Vec<GeneratedImage>,
}

impl GenerationResult {
    /// 按调用顺序生成 data URI。
    #[must_use]
    pub fn data_uris(&self) -> Vec<String> {
        self.images.iter().map(GeneratedImage::to_data_uri).collect()
    }
}

/// 单次调用结束后对当前模型的决定。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallControl {
    Continue,
    Abort,
}

/// 单次调用的结果。
pub type CallOutcome = Result<GeneratedImage>;

/// 一个模型的尝试：累计成功图片与最近一次错误。
#[derive(Debug)]
struct ModelAttempt<'a> {
    model: &'a str,
    images: Vec<GeneratedImage>,
    last_error: Option<Error>,
    aborted: bool,
}

impl<'a> ModelAttempt<'a> {
    const fn new(model: &'a str) -> Self {
        Self {
            model,
            images: Vec::new(),
            last_error: None,
            aborted: false,
        }
    }

    fn record(&mut self, call: usize, outcome: CallOutcome) -> CallControl {
        match outcome {
            Ok(image) => {
                tracing::debug!(model = self.model, call, mime = %image.mime_type, "call produced image");
                self.images.push(image);
                CallControl::Continue
            }
            Err(err) if err.is_quota() => {
                tracing::warn!(model = self.model, call, error = %err, "quota exhausted, abandoning model");
                self.aborted = true;
                self.last_error = Some(err);
                CallControl::Abort
            }
            Err(err) => {
                tracing::warn!(model = self.model, call, error = %err, "call failed");
                self.last_error = Some(err);
                CallControl::Continue
            }
        }
    }

    fn finish(self) -> Result<GenerationResult> {
        if !self.aborted && !self.images.is_empty() {
            return Ok(GenerationResult {
                model: self.model.to_string(),
                images: self.images,
            });
        }
        if self.aborted && !self.images.is_empty() {
            tracing::debug!(
                model = self.model,
                discarded = self.images.len(),
                "discarding partial images of aborted attempt"
            );
        }
        Err(self.last_error.unwrap_or_else(|| Error::NoImageInResponse {
            model: self.model.to_string(),
            detail: "no call completed".into(),
        }))
    }
}

/// 带模型回退的图片生成器。
#[derive(Clone)]
pub struct FallbackGenerator {
    transport: Arc<dyn Transport>,
    dispatch: DispatchMode,
    generation_config: Option<GenerationConfig>,
}

impl FallbackGenerator {
    /// 使用默认派发方式（顺序、间隔 2 秒）与仅图片输出的配置。
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            dispatch: DispatchMode::default(),
            generation_config: Some(GenerationConfig::image_only()),
        }
    }

    #[must_use]
    pub const fn with_dispatch(mut self, dispatch: DispatchMode) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// 设置请求的 generationConfig（`None` 表示不发送）。
    #[must_use]
    pub fn with_generation_config(mut self, config: Option<GenerationConfig>) -> Self {
        self.generation_config = config;
        self
    }

    #[must_use]
    pub const fn dispatch(&self) -> DispatchMode {
        self.dispatch
    }

    #[must_use]
    pub fn generation_config(&self) -> Option<&GenerationConfig> {
        self.generation_config.as_ref()
    }

    /// 依次尝试 `models`，返回第一个产出图片的模型的结果。
    ///
    /// # Errors
    /// 模型列表为空时返回 `InvalidConfig`；全部模型失败时返回 `AllModelsFailed`。
    pub async fn generate<S: AsRef<str>>(
        &self,
        request: &GenerationRequest,
        models: &[S],
        credential: &Credential,
    ) -> Result<GenerationResult> {
        if models.is_empty() {
            return Err(Error::InvalidConfig {
                message: "model list must not be empty".into(),
            });
        }

        let body = request.to_wire(self.generation_config.clone());
        let mut attempted = Vec::with_capacity(models.len());
        let mut last_error = None;

        for model in models {
            let model = model.as_ref();
            attempted.push(model.to_string());
            tracing::info!(
                model,
                count = request.desired_count(),
                transport = self.transport.name(),
                "trying model"
            );

            match self.run_attempt(model, &body, request.desired_count(), credential).await {
                Ok(result) => {
                    tracing::info!(model, images = result.images.len(), "model produced images");
                    return Ok(result);
                }
                Err(err) => {
                    tracing::warn!(model, error = %err, "model failed, falling back");
                    last_error = Some(err);
                }
            }
        }

        let err = Error::AllModelsFailed {
            attempted,
            last: last_error.map(Box::new),
        };
        tracing::error!(error = %err, "all models failed");
        Err(err)
    }

    async fn run_attempt(
        &self,
        model: &str,
        body: &GenerateContentRequest,
        count: usize,
        credential: &Credential,
    ) -> Result<GenerationResult> {
        let mut attempt = ModelAttempt::new(model);
        match self.dispatch {
            DispatchMode::Sequential { spacing } => {
                for call in 0..count {
                    if call > 0 && !spacing.is_zero() {
                        tracing::debug!(model, call, spacing = ?spacing, "waiting before next call");
                        tokio::time::sleep(spacing).await;
                    }
                    let outcome = self.call(model, body, credential).await;
                    if attempt.record(call, outcome) == CallControl::Abort {
                        break;
                    }
                }
            }
            DispatchMode::Concurrent => {
                tracing::debug!(model, count, "dispatching calls concurrently");
                let outcomes =
                    join_all((0..count).map(|_| self.call(model, body, credential))).await;
                for (call, outcome) in outcomes.into_iter().enumerate() {
                    if attempt.record(call, outcome) == CallControl::Abort {
                        break;
                    }
                }
            }
        }
        attempt.finish()
    }

    async fn call(
        &self,
        model: &str,
        body: &GenerateContentRequest,
        credential: &Credential,
    ) -> CallOutcome {
        let raw = self.transport.generate_content(model, body, credential).await?;
        tracing::debug!(model, status = raw.status, "received response");
        classify_response(model, raw)
    }
}

impl std::fmt::Debug for FallbackGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackGenerator")
            .field("transport", &self.transport.name())
            .field("dispatch", &self.dispatch)
            .field("generation_config", &self.generation_config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::{ReferenceBoard, ReferenceImage, SlotKind};
    use crate::request::ImageCount;
    use crate::test_support::{StubReply, StubTransport};

    fn generator(stub: &Arc<StubTransport>, dispatch: DispatchMode) -> FallbackGenerator {
        let transport: Arc<dyn Transport> = stub.clone();
        FallbackGenerator::new(transport).with_dispatch(dispatch)
    }

    fn sequential() -> DispatchMode {
        DispatchMode::Sequential {
            spacing: Duration::ZERO,
        }
    }

    fn request(prompt: &str, count: usize) -> GenerationRequest {
        GenerationRequest::new(prompt, std::iter::empty(), ImageCount::new(count).unwrap())
            .unwrap()
    }

    fn key() -> Credential {
        Credential::new("test-key").unwrap()
    }

    #[tokio::test]
    async fn two_calls_on_first_model_return_two_uris_in_order() {
        let stub = Arc::new(
            StubTransport::new().script("m1", vec![StubReply::png(&[1]), StubReply::png(&[2])]),
        );
        let result = generator(&stub, sequential())
            .generate(&request("a cat", 2), &["m1"], &key())
            .await
            .unwrap();

        assert_eq!(result.model, "m1");
        assert_eq!(
            result.data_uris(),
            vec!["data:image/png;base64,AQ==", "data:image/png;base64,Ag=="]
        );
        let calls = stub.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls
            .iter()
            .all(|call| call.prompt.as_deref() == Some("a cat") && call.parts == 1));
    }

    #[tokio::test]
    async fn success_on_first_model_never_calls_second() {
        let stub = Arc::new(
            StubTransport::new()
                .always("a", StubReply::png(&[7]))
                .always("b", StubReply::png(&[8])),
        );
        let result = generator(&stub, sequential())
            .generate(&request("x", 3), &["a", "b"], &key())
            .await
            .unwrap();
        assert_eq!(result.model, "a");
        assert_eq!(result.images.len(), 3);
        assert_eq!(stub.calls_for("b"), 0);
    }

    #[tokio::test]
    async fn text_only_model_falls_back_to_next() {
        let stub = Arc::new(
            StubTransport::new()
                .always("a", StubReply::TextOnly("I cannot draw".into()))
                .always("b", StubReply::png(&[5])),
        );
        let result = generator(&stub, sequential())
            .generate(&request("x", 2), &["a", "b"], &key())
            .await
            .unwrap();
        assert_eq!(result.model, "b");
        assert_eq!(result.images, vec![GeneratedImage::new("image/png", vec![5]); 2]);
        assert_eq!(stub.calls_for("a"), 2);
    }

    #[tokio::test]
    async fn all_quota_failures_surface_quota_message() {
        let stub = Arc::new(
            StubTransport::new()
                .always("a", StubReply::quota())
                .always("b", StubReply::quota()),
        );
        let err = generator(&stub, sequential())
            .generate(&request("x", 4), &["a", "b"], &key())
            .await
            .unwrap_err();

        assert!(err.is_quota());
        assert!(err.user_message().contains("429"));
        assert!(err.user_message().contains("reducing the number of images to 1"));
        // quota aborts after the first call of each model
        assert_eq!(stub.calls_for("a"), 1);
        assert_eq!(stub.calls_for("b"), 1);
        match err {
            Error::AllModelsFailed { attempted, .. } => assert_eq!(attempted, vec!["a", "b"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn quota_mid_batch_discards_partial_images() {
        let stub = Arc::new(
            StubTransport::new()
                .script(
                    "a",
                    vec![StubReply::png(&[1]), StubReply::quota(), StubReply::png(&[3])],
                )
                .always("b", StubReply::png(&[9])),
        );
        let result = generator(&stub, sequential())
            .generate(&request("x", 3), &["a", "b"], &key())
            .await
            .unwrap();
        assert_eq!(result.model, "b");
        assert_eq!(result.images.len(), 3);
        assert_eq!(stub.calls_for("a"), 2);
    }

    #[tokio::test]
    async fn non_quota_failures_do_not_stop_the_batch() {
        let stub = Arc::new(StubTransport::new().script(
            "a",
            vec![
                StubReply::NetworkDown,
                StubReply::Status(500, "boom".into()),
                StubReply::png(&[4]),
            ],
        ));
        let result = generator(&stub, sequential())
            .generate(&request("x", 3), &["a", "b"], &key())
            .await
            .unwrap();
        assert_eq!(result.model, "a");
        assert_eq!(result.images, vec![GeneratedImage::new("image/png", vec![4])]);
        assert_eq!(stub.calls_for("a"), 3);
        assert_eq!(stub.calls_for("b"), 0);
    }

    #[tokio::test]
    async fn concurrent_quota_anywhere_fails_the_attempt() {
        let stub = Arc::new(
            StubTransport::new()
                .script(
                    "a",
                    vec![StubReply::png(&[1]), StubReply::png(&[2]), StubReply::quota()],
                )
                .always("b", StubReply::png(&[6])),
        );
        let result = generator(&stub, DispatchMode::Concurrent)
            .generate(&request("x", 3), &["a", "b"], &key())
            .await
            .unwrap();
        assert_eq!(result.model, "b");
        assert_eq!(stub.calls_for("a"), 3);
        assert_eq!(stub.calls_for("b"), 3);
    }

    #[tokio::test]
    async fn concurrent_mode_collects_every_image() {
        let stub = Arc::new(StubTransport::new().always("a", StubReply::png(&[1, 2])));
        let result = generator(&stub, DispatchMode::Concurrent)
            .generate(&request("x", 4), &["a"], &key())
            .await
            .unwrap();
        assert_eq!(result.images.len(), 4);
    }

    #[tokio::test]
    async fn last_error_comes_from_last_model() {
        let stub = Arc::new(
            StubTransport::new()
                .always("a", StubReply::quota())
                .always("b", StubReply::NetworkDown),
        );
        let err = generator(&stub, sequential())
            .generate(&request("x", 1), &["a", "b"], &key())
            .await
            .unwrap_err();
        assert!(!err.is_quota());
        assert!(err.is_transport());
        assert!(err.user_message().contains("VPN"));
    }

    #[tokio::test]
    async fn empty_model_list_is_rejected_without_calls() {
        let stub = Arc::new(StubTransport::new());
        let models: [&str; 0] = [];
        let err = generator(&stub, sequential())
            .generate(&request("x", 1), &models, &key())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
        assert!(stub.calls().is_empty());
    }

    #[tokio::test]
    async fn empty_request_never_reaches_transport() {
        let stub = Arc::new(StubTransport::new().always("a", StubReply::png(&[1])));
        let board = ReferenceBoard::new();
        let err = GenerationRequest::from_board("   ", &board, ImageCount::default()).unwrap_err();
        assert!(matches!(err, Error::EmptyRequest));
        assert!(stub.calls().is_empty());
    }

    #[tokio::test]
    async fn reference_images_travel_after_prompt() {
        let stub = Arc::new(StubTransport::new().always("a", StubReply::png(&[1])));
        let mut character = ReferenceImage::empty(SlotKind::Character, 1);
        character.populate(vec![1, 2, 3], "image/png");
        let request =
            GenerationRequest::new("", [&character], ImageCount::default()).unwrap();
        generator(&stub, sequential())
            .generate(&request, &["a"], &key())
            .await
            .unwrap();
        let calls = stub.calls();
        assert_eq!(calls[0].parts, 2);
        assert_eq!(calls[0].prompt.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn identical_stub_yields_identical_order() {
        let run = || async {
            let stub = Arc::new(StubTransport::new().script(
                "a",
                vec![StubReply::png(&[1]), StubReply::png(&[2]), StubReply::png(&[3])],
            ));
            generator(&stub, sequential())
                .generate(&request("x", 3), &["a"], &key())
                .await
                .unwrap()
        };
        assert_eq!(run().await, run().await);
    }

    #[test]
    fn default_dispatch_is_spaced_sequential() {
        assert_eq!(
            DispatchMode::default(),
            DispatchMode::Sequential {
                spacing: Duration::from_secs(2)
            }
        );
    }
}
