// src/services/normalizer.rs
use crate::models::{AnalysisResult, Assessment, ResultSource};
use crate::services::response_parser::{
    DEFAULT_DESCRIPTION, DEFAULT_DISTANCE_FROM_WATER_M, DEFAULT_ELEVATION_M,
};

pub const SUCCESS_MESSAGE: &str = "Image analysis completed successfully";

/// The single point where results become the public contract.
pub struct ResultNormalizer;

impl ResultNormalizer {
    pub fn normalize(assessment: Assessment) -> (AnalysisResult, ResultSource) {
        let (result, source) = match assessment {
            Assessment::Real(parsed) => (
                AnalysisResult {
                    success: true,
                    risk_level: parsed.risk_level,
                    description: parsed.description,
                    recommendations: parsed.recommendations,
                    elevation: parsed.elevation,
                    distance_from_water: parsed.distance_from_water,
                    ai_analysis: parsed.ai_analysis,
                    message: SUCCESS_MESSAGE.to_string(),
                },
                ResultSource::Model,
            ),
            Assessment::Simulated(simulated) => (
                AnalysisResult {
                    success: true,
                    risk_level: simulated.risk_level,
                    description: simulated.description,
                    recommendations: simulated.recommendations,
                    elevation: simulated.elevation,
                    distance_from_water: simulated.distance_from_water,
                    ai_analysis: simulated.ai_analysis,
                    message: SUCCESS_MESSAGE.to_string(),
                },
                ResultSource::Simulated,
            ),
        };
        (Self::normalize_result(result), source)
    }

    /// Enforces the output invariants. A complete, valid result comes back unchanged.
    pub fn normalize_result(mut result: AnalysisResult) -> AnalysisResult {
        if !result.elevation.is_finite() {
            result.elevation = DEFAULT_ELEVATION_M;
        }
        if !result.distance_from_water.is_finite() {
            result.distance_from_water = DEFAULT_DISTANCE_FROM_WATER_M;
        }

        result.recommendations = result
            .recommendations
            .into_iter()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .collect();

        if result.description.trim().is_empty() {
            result.description = DEFAULT_DESCRIPTION.to_string();
        }
        if result.success && result.ai_analysis.trim().is_empty() {
            result.ai_analysis = result.description.clone();
        }
        if result.message.trim().is_empty() {
            result.message = SUCCESS_MESSAGE.to_string();
        }
        result
    }
}
