use actix_multipart::{Field, Multipart};
use actix_web::{web, HttpResponse, Responder};
use futures_util::StreamExt;

use crate::error::DetectError;
use crate::service::DetectionService;

pub const IMAGE_FIELD: &str = "image";
pub const LIVENESS: &str = "Object Detection API is running.";
pub const DETECT_GET: &str = "Detect GET route reached";

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index)).service(
        web::resource("/detect")
            .route(web::get().to(detect_get))
            .route(web::post().to(detect)),
    );
}

pub async fn index() -> impl Responder {
    HttpResponse::Ok().content_type("text/plain").body(LIVENESS)
}

pub async fn detect_get() -> impl Responder {
    HttpResponse::Ok().content_type("text/plain").body(DETECT_GET)
}

pub async fn detect(
    service: web::Data<DetectionService>,
    payload: Multipart,
) -> Result<HttpResponse, DetectError> {
    let bytes = match read_image_field(payload, service.max_upload_bytes()).await? {
        Some(bytes) => bytes,
        None => {
            log::warn!("No image uploaded");
            return Err(DetectError::NoImage);
        }
    };
    log::debug!("Received image upload of {} bytes", bytes.len());

    let worker = service.clone();
    let records = web::block(move || worker.detect_bytes(&bytes))
        .await
        .map_err(|e| {
            log::error!("Detection worker failed: {}", e);
            DetectError::inference(e)
        })?
        .map_err(|e| {
            log::error!("Detection failed: {}", e);
            e
        })?;

    log::info!("Detections: {}", records.len());
    Ok(HttpResponse::Ok().json(records))
}

/// Bytes of the first `image` file field. Other fields, including a plain
/// text field named `image`, are skipped; a multipart body that cannot be
/// parsed counts as no upload.
async fn read_image_field(
    mut payload: Multipart,
    limit: usize,
) -> Result<Option<Vec<u8>>, DetectError> {
    while let Some(item) = payload.next().await {
        let mut field = match item {
            Ok(field) => field,
            Err(e) => {
                log::debug!("Unreadable multipart body: {}", e);
                return Ok(None);
            }
        };

        let disposition = field.content_disposition();
        if disposition.get_name() != Some(IMAGE_FIELD) || disposition.get_filename().is_none() {
            skip(&mut field).await;
            continue;
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let data = chunk.map_err(|e| {
                log::debug!("Truncated image field: {}", e);
                DetectError::NoImage
            })?;
            if bytes.len() + data.len() > limit {
                return Err(DetectError::TooLarge { limit });
            }
            bytes.extend_from_slice(&data);
        }
        return Ok(Some(bytes));
    }
    Ok(None)
}

async fn skip(field: &mut Field) {
    while let Some(chunk) = field.next().await {
        if chunk.is_err() {
            break;
        }
    }
}
