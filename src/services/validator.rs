// src/services/validator.rs
use crate::errors::ValidationError;
use crate::models::UploadLimits;

pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
pub const ACCEPTED_MEDIA_PREFIX: &str = "image/";

/// Metadata-only upload checks. Runs before any decoding or network call.
pub struct ImageValidator;

impl ImageValidator {
    pub fn limits() -> UploadLimits {
        UploadLimits {
            max_upload_bytes: MAX_UPLOAD_BYTES,
            accepted_media_prefix: ACCEPTED_MEDIA_PREFIX,
        }
    }

    pub fn validate(size: usize, media_type: &str) -> Result<(), ValidationError> {
        Self::check_type(media_type)?;
        Self::check_size(size)
    }

    pub fn check_type(media_type: &str) -> Result<(), ValidationError> {
        let normalized = media_type.trim().to_ascii_lowercase();
        if !normalized.starts_with(ACCEPTED_MEDIA_PREFIX) {
            return Err(ValidationError::WrongType {
                media_type: media_type.to_string(),
            });
        }
        Ok(())
    }

    pub fn check_size(size: usize) -> Result<(), ValidationError> {
        if size > MAX_UPLOAD_BYTES {
            return Err(ValidationError::TooLarge {
                size,
                limit: MAX_UPLOAD_BYTES,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MB: usize = 1024 * 1024;

    #[test]
    fn accepts_images_up_to_the_limit() {
        assert!(ImageValidator::validate(2 * MB, "image/jpeg").is_ok());
        assert!(ImageValidator::validate(MAX_UPLOAD_BYTES, "image/png").is_ok());
        assert!(ImageValidator::validate(10, "IMAGE/WEBP").is_ok());
    }

    #[test]
    fn rejects_oversized_uploads() {
        let err = ImageValidator::validate(11 * MB, "image/png").unwrap_err();
        assert_eq!(err.reason(), "TooLarge");
        assert!(ImageValidator::validate(MAX_UPLOAD_BYTES + 1, "image/png").is_err());
    }

    #[test]
    fn rejects_non_image_media_types() {
        let err = ImageValidator::validate(2 * MB, "application/pdf").unwrap_err();
        assert_eq!(
            err,
            ValidationError::WrongType {
                media_type: "application/pdf".to_string()
            }
        );
        assert_eq!(ImageValidator::validate(1, "").unwrap_err().reason(), "WrongType");
        assert_eq!(
            ImageValidator::validate(1, "text/image/png").unwrap_err().reason(),
            "WrongType"
        );
    }
}
