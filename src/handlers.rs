// src/handlers.rs
use crate::services::validator::ImageValidator;
use crate::{AppState, errors::FloodError, models::*};
use actix_multipart::Multipart;
use actix_web::{Error, HttpResponse, web};
use bytes::BytesMut;
use futures_util::TryStreamExt;

pub const SOURCE_HEADER: &str = "X-Analysis-Source";

pub async fn analyze_image(
    mut payload: Multipart,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let upload = read_upload(&mut payload).await?;
    let request = AnalysisRequest::new(upload);

    let (result, source) = data.analyzer.analyze(request).await?;

    Ok(HttpResponse::Ok()
        .insert_header((SOURCE_HEADER, source.as_str()))
        .json(result))
}

/// Takes the first field named `file` or carrying a filename. Type and size are
/// checked while streaming so rejected uploads are never fully buffered.
async fn read_upload(payload: &mut Multipart) -> Result<UploadedImage, FloodError> {
    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| FloodError::Multipart(e.to_string()))?
    {
        let content_disposition = field.content_disposition();
        let filename = content_disposition.get_filename().map(|f| f.to_string());
        let is_file = filename.is_some() || content_disposition.get_name() == Some("file");
        if !is_file {
            continue;
        }

        let content_type = field
            .content_type()
            .map(|ct| ct.to_string())
            .unwrap_or_default();
        ImageValidator::check_type(&content_type)?;

        let mut image_data = BytesMut::new();
        while let Some(chunk) = field
            .try_next()
            .await
            .map_err(|e| FloodError::Multipart(e.to_string()))?
        {
            ImageValidator::check_size(image_data.len() + chunk.len())?;
            image_data.extend_from_slice(&chunk);
        }

        if image_data.is_empty() {
            return Err(FloodError::MissingFile);
        }

        return Ok(UploadedImage::new(filename, content_type, image_data.freeze()));
    }

    Err(FloodError::MissingFile)
}

pub async fn health_check(data: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "message": "Flood Detection API is running",
        "service": "floodsight",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "healthy",
        "ai_enabled": data.analyzer.model_enabled(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

pub async fn upload_limits() -> HttpResponse {
    HttpResponse::Ok().json(ImageValidator::limits())
}
