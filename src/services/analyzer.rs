// src/services/analyzer.rs
use crate::errors::{AiFailure, FloodError, ParseError};
use crate::models::{AnalysisRequest, AnalysisResult, Assessment, ParsedAnalysis, ResultSource};
use crate::services::image_processor::{ImageProcessor, PreparedImage};
use crate::services::llm_service::VisionModel;
use crate::services::normalizer::ResultNormalizer;
use crate::services::prompt::PromptBuilder;
use crate::services::response_parser::ResponseParser;
use crate::services::simulator::FallbackSimulator;
use crate::services::validator::ImageValidator;
use actix_web::web;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Why a request ended up on the simulated path. Logged, never returned.
#[derive(Error, Debug)]
enum FallbackReason {
    #[error(transparent)]
    Ai(#[from] AiFailure),

    #[error("unusable model output: {0}")]
    Parse(#[from] ParseError),
}

/// Runs one analysis end to end. Holds no per-request state.
pub struct FloodAnalyzer {
    model: Option<Arc<dyn VisionModel>>,
    image_processor: Arc<ImageProcessor>,
    timeout: Duration,
}

impl FloodAnalyzer {
    pub fn new(
        model: Option<Arc<dyn VisionModel>>,
        image_processor: Arc<ImageProcessor>,
        timeout: Duration,
    ) -> Self {
        Self {
            model,
            image_processor,
            timeout,
        }
    }

    pub fn model_enabled(&self) -> bool {
        self.model.is_some()
    }

    pub async fn analyze(
        &self,
        request: AnalysisRequest,
    ) -> Result<(AnalysisResult, ResultSource), FloodError> {
        let start = Instant::now();
        let image = request.image();

        info!(
            "Analysis {}: {} bytes of {} ({})",
            request.id(),
            image.size(),
            image.content_type,
            image.filename.as_deref().unwrap_or("unnamed")
        );

        ImageValidator::validate(image.size(), &image.content_type)?;

        let processor = self.image_processor.clone();
        let data = image.data.clone();
        let media_type = image.content_type.clone();
        let prepared = web::block(move || processor.prepare(&data, &media_type))
            .await
            .map_err(|e| FloodError::Internal(e.to_string()))??;
        debug!(
            "Analysis {}: decoded {}x{}, {:.0}% water-like pixels",
            request.id(),
            prepared.dimensions.0,
            prepared.dimensions.1,
            prepared.stats.water_fraction * 100.0
        );

        let assessment = match self.assess_with_model(&prepared).await {
            Ok(parsed) => Assessment::Real(parsed),
            Err(reason) => {
                warn!(
                    "Analysis {}: falling back to simulated result: {}",
                    request.id(),
                    reason
                );
                Assessment::Simulated(FallbackSimulator::simulate(&prepared.stats))
            }
        };

        let (result, source) = ResultNormalizer::normalize(assessment);
        info!(
            "Analysis {}: {} risk via {} path in {}ms",
            request.id(),
            result.risk_level,
            source.as_str(),
            start.elapsed().as_millis()
        );
        Ok((result, source))
    }

    async fn assess_with_model(
        &self,
        prepared: &PreparedImage,
    ) -> Result<ParsedAnalysis, FallbackReason> {
        let model = self.model.as_ref().ok_or(AiFailure::MissingCredential)?;
        let request = PromptBuilder::build(prepared.data.clone(), prepared.media_type.clone());

        let raw = tokio::time::timeout(self.timeout, model.generate(&request))
            .await
            .map_err(|_| AiFailure::Timeout(self.timeout.as_millis() as u64))??;

        Ok(ResponseParser::parse(&raw)?)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{RiskLevel, UploadedImage};
    use crate::services::image_processor::tests::solid_png;
    use crate::services::prompt::ModelRequest;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Canned model reply with an optional delay.
    pub(crate) struct StubModel {
        reply: Result<String, AiFailure>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl StubModel {
        pub(crate) fn replying(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }

        pub(crate) fn failing(failure: AiFailure) -> Self {
            Self {
                reply: Err(failure),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }

        pub(crate) fn slow(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::replying("RISK_LEVEL: Low")
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl VisionModel for StubModel {
        async fn generate(&self, request: &ModelRequest) -> Result<String, AiFailure> {
            assert!(request.prompt.contains("RISK_LEVEL:"));
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.reply.clone()
        }

        fn model_name(&self) -> &str {
            "stub"
        }
    }

    pub(crate) fn analyzer_with(model: Option<Arc<StubModel>>) -> FloodAnalyzer {
        FloodAnalyzer::new(
            model.map(|m| m as Arc<dyn VisionModel>),
            Arc::new(ImageProcessor::new()),
            Duration::from_millis(200),
        )
    }

    fn lake_request() -> AnalysisRequest {
        AnalysisRequest::new(UploadedImage::new(
            Some("lake.png".to_string()),
            "image/png",
            solid_png(40, 40, [30, 70, 190]),
        ))
    }

    fn assert_complete(result: &AnalysisResult) {
        assert!(result.success);
        assert!(!result.ai_analysis.is_empty());
        assert!(!result.recommendations.is_empty());
        assert!(result.elevation.is_finite());
        assert!(result.distance_from_water.is_finite());
    }

    #[actix_web::test]
    async fn model_text_is_parsed_on_success() {
        let model = Arc::new(StubModel::replying(
            "RISK_LEVEL: Low\nDESCRIPTION: Dry\nELEVATION: 80 m\nDISTANCE_FROM_WATER: 900 m\nANALYSIS: Hills\nRECOMMENDATIONS:\n- Relax",
        ));
        let analyzer = analyzer_with(Some(model.clone()));

        let (result, source) = analyzer.analyze(lake_request()).await.unwrap();
        assert_eq!(source, ResultSource::Model);
        assert_eq!(result.risk_level, RiskLevel::Low);
        assert_eq!(result.elevation, 80.0);
        assert_eq!(result.ai_analysis, "Hills");
        assert_eq!(result.recommendations, vec!["Relax"]);
        assert_eq!(model.calls(), 1);
    }

    #[actix_web::test]
    async fn missing_credential_goes_straight_to_simulator() {
        let analyzer = analyzer_with(None);
        assert!(!analyzer.model_enabled());

        let (result, source) = analyzer.analyze(lake_request()).await.unwrap();
        assert_eq!(source, ResultSource::Simulated);
        assert_eq!(result.risk_level, RiskLevel::High);
        assert_complete(&result);
    }

    #[actix_web::test]
    async fn every_ai_failure_still_produces_a_full_result() {
        let failures = [
            StubModel::failing(AiFailure::Transport("connection reset".to_string())),
            StubModel::failing(AiFailure::Quota("429".to_string())),
            StubModel::failing(AiFailure::EmptyResponse),
            StubModel::replying("   "),
            StubModel::slow(Duration::from_secs(5)),
        ];

        for stub in failures {
            let model = Arc::new(stub);
            let analyzer = analyzer_with(Some(model.clone()));
            let (result, source) = analyzer.analyze(lake_request()).await.unwrap();
            assert_eq!(source, ResultSource::Simulated);
            assert_complete(&result);
            assert_eq!(model.calls(), 1);
        }
    }

    #[actix_web::test]
    async fn simulated_results_repeat_for_the_same_image() {
        let analyzer = analyzer_with(None);
        let (a, _) = analyzer.analyze(lake_request()).await.unwrap();
        let (b, _) = analyzer.analyze(lake_request()).await.unwrap();
        assert_eq!(a, b);
    }

    #[actix_web::test]
    async fn rejected_uploads_never_reach_the_model() {
        let model = Arc::new(StubModel::replying("RISK_LEVEL: High"));
        let analyzer = analyzer_with(Some(model.clone()));

        let pdf = AnalysisRequest::new(UploadedImage::new(
            Some("scan.jpg".to_string()),
            "application/pdf",
            bytes::Bytes::from_static(b"%PDF-1.4"),
        ));
        let err = analyzer.analyze(pdf).await.unwrap_err();
        assert!(matches!(err, FloodError::Validation(_)));

        let garbage = AnalysisRequest::new(UploadedImage::new(
            None,
            "image/png",
            bytes::Bytes::from_static(b"not a png"),
        ));
        let err = analyzer.analyze(garbage).await.unwrap_err();
        assert!(matches!(err, FloodError::ImageProcessing(_)));

        assert_eq!(model.calls(), 0);
    }
}
