// src/services/prompt.rs
use bytes::Bytes;

/// Fixed instruction text. The response parser keys on these labels, so keep
/// them stable.
pub const FLOOD_ANALYSIS_PROMPT: &str = r#"You are a hydrology assistant assessing flood risk from a single terrain photograph.

Study the visible terrain cues: rivers, lakes, coastline, standing water, drainage channels,
slope and relief, soil saturation, vegetation cover, paved or built-up surfaces, and any
visible flood defences or water marks. Estimate the ground elevation above the nearest water
level and the horizontal distance to the nearest body of water.

Respond using exactly these labeled lines and nothing else:

RISK_LEVEL: one of Low, Medium, High
DESCRIPTION: one or two sentences summarising the flood risk
ELEVATION: estimated elevation above the nearest water level, as a number in meters
DISTANCE_FROM_WATER: estimated distance to the nearest water body, as a number in meters
ANALYSIS: your reasoning about what is visible in the image
RECOMMENDATIONS:
- first practical recommendation
- second practical recommendation
- third practical recommendation
"#;

/// Everything the vision model needs for one call.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub prompt: &'static str,
    pub image: Bytes,
    pub media_type: String,
}

pub struct PromptBuilder;

impl PromptBuilder {
    pub fn build(image: Bytes, media_type: impl Into<String>) -> ModelRequest {
        ModelRequest {
            prompt: FLOOD_ANALYSIS_PROMPT,
            image,
            media_type: media_type.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_names_every_label() {
        for label in [
            "RISK_LEVEL",
            "DESCRIPTION",
            "ELEVATION",
            "DISTANCE_FROM_WATER",
            "ANALYSIS",
            "RECOMMENDATIONS",
        ] {
            assert!(
                FLOOD_ANALYSIS_PROMPT.contains(&format!("{}:", label)),
                "prompt is missing {}",
                label
            );
        }
    }

    #[test]
    fn prompt_is_identical_across_requests() {
        let a = PromptBuilder::build(Bytes::from_static(b"one"), "image/png");
        let b = PromptBuilder::build(Bytes::from_static(b"two"), "image/jpeg");
        assert_eq!(a.prompt, b.prompt);
        assert_eq!(b.media_type, "image/jpeg");
        assert_eq!(&a.image[..], b"one");
    }
}
