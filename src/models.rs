// src/models.rs
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A file received from the multipart upload. Dropped once the analysis completes.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub filename: Option<String>,
    pub content_type: String,
    pub data: Bytes,
}

impl UploadedImage {
    pub fn new(filename: Option<String>, content_type: impl Into<String>, data: Bytes) -> Self {
        Self {
            filename,
            content_type: content_type.into(),
            data,
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// One analysis job. Immutable once built.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    id: Uuid,
    image: UploadedImage,
}

impl AnalysisRequest {
    pub fn new(image: UploadedImage) -> Self {
        Self {
            id: Uuid::new_v4(),
            image,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn image(&self) -> &UploadedImage {
        &self.image
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
        }
    }

    /// Maps a free-form label onto a level, or `None` when no keyword is recognised.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().to_ascii_lowercase();
        let words: Vec<&str> = label
            .split(|c: char| !c.is_ascii_alphabetic())
            .filter(|w| !w.is_empty())
            .collect();

        // first keyword wins
        for word in &words {
            match *word {
                "high" | "severe" | "extreme" | "critical" => return Some(RiskLevel::High),
                "medium" | "moderate" => return Some(RiskLevel::Medium),
                "low" | "minimal" => return Some(RiskLevel::Low),
                _ => {}
            }
        }
        None
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = std::convert::Infallible;

    /// Never fails: unknown labels fall back to `Medium`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(RiskLevel::from_label(s).unwrap_or_default())
    }
}

/// The response contract returned to the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub success: bool,
    pub risk_level: RiskLevel,
    pub description: String,
    pub recommendations: Vec<String>,
    pub elevation: f64,
    pub distance_from_water: f64,
    pub ai_analysis: String,
    pub message: String,
}

/// Which path produced a result. Diagnostic only, never part of the JSON body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultSource {
    Model,
    Simulated,
}

impl ResultSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultSource::Model => "model",
            ResultSource::Simulated => "simulated",
        }
    }
}

/// Fields extracted from model text. Every field already carries its default.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedAnalysis {
    pub risk_level: RiskLevel,
    pub description: String,
    pub elevation: f64,
    pub distance_from_water: f64,
    pub ai_analysis: String,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedAnalysis {
    pub risk_level: RiskLevel,
    pub description: String,
    pub elevation: f64,
    pub distance_from_water: f64,
    pub ai_analysis: String,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Assessment {
    Real(ParsedAnalysis),
    Simulated(SimulatedAnalysis),
}

/// Colour summary of an uploaded image, used when the model path is unavailable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TerrainStats {
    /// Share of pixels that look like open water, 0..=1.
    pub water_fraction: f64,
    /// Share of pixels that look like vegetation, 0..=1.
    pub vegetation_fraction: f64,
    /// Mean luma, 0..=1.
    pub brightness: f64,
    /// FNV-1a digest of the raw upload.
    pub digest: u64,
}

#[derive(Debug, Serialize)]
pub struct UploadLimits {
    pub max_upload_bytes: usize,
    pub accepted_media_prefix: &'static str,
}
