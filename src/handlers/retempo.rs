//! # Tempo Change Handlers
//!
//! ## Available Endpoints:
//! - `POST /change-bpm` - Upload an mp3/wav and download it re-tempoed
//! - `GET /api/v1/plan` - Dry run: show the stage chain for a filename and target
//!
//! ## Upload flow:
//! 1. Stream the `audioFile` field to a fresh path in the upload workspace
//! 2. Read `targetBpm` (and optional `sourceBpm`) form fields
//! 3. Plan the tempo change (rejections happen here, before ffmpeg runs)
//! 4. Run ffmpeg with the `atempo` chain
//! 5. Return the output as an attachment and remove both job files

use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::tempo::{self, RetempoPlan};
use crate::workspace::{download_name, JobFiles};
use actix_multipart::Multipart;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{web, HttpResponse};
use futures_util::stream::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// Content types accepted for `audioFile`.
const ACCEPTED_MEDIA_TYPES: [&str; 3] = ["audio/mpeg", "audio/wav", "audio/x-wav"];

/// Text fields are tiny; anything longer is not a tempo.
const MAX_TEXT_FIELD_BYTES: usize = 64;

/// Header carrying the filter chain that was applied.
pub const STAGES_HEADER: &str = "X-Tempo-Stages";

/// Form fields collected from the multipart body.
#[derive(Debug, Default)]
struct UploadForm {
    original_name: Option<String>,
    content_type: Option<String>,
    target_bpm: Option<String>,
    source_bpm: Option<String>,
    job: Option<JobFiles>,
    size_bytes: usize,
}

/// Query parameters for the dry-run plan endpoint.
#[derive(Debug, Deserialize)]
pub struct PlanQuery {
    pub filename: String,
    pub target_bpm: Option<String>,
    pub source_bpm: Option<String>,
}

/// Re-tempo an uploaded audio file.
///
/// ## Endpoint: `POST /change-bpm`
///
/// ## Request Body:
/// Multipart form data with fields:
/// - `audioFile`: the audio file (`audio/mpeg`, `audio/wav` or `audio/x-wav`)
/// - `targetBpm`: desired tempo
/// - `sourceBpm` (optional): source tempo, overriding the one read from the filename
///
/// ## Response:
/// The transcoded file as `changed_bpm_<target>.<ext>`, with the applied
/// filter chain in the `X-Tempo-Stages` header.
pub async fn change_bpm(
    state: web::Data<AppState>,
    payload: Multipart,
) -> AppResult<HttpResponse> {
    let mut form = UploadForm::default();

    let result = process_upload(&state, payload, &mut form).await;

    if let Some(job) = &form.job {
        job.cleanup().await;
    }

    result
}

async fn process_upload(
    state: &AppState,
    payload: Multipart,
    form: &mut UploadForm,
) -> AppResult<HttpResponse> {
    read_form(state, payload, form).await?;

    let job = form
        .job
        .clone()
        .ok_or_else(|| AppError::ValidationError("No audio file provided".to_string()))?;
    let original_name = form.original_name.clone().unwrap_or_default();

    let plan = tempo::plan(
        &original_name,
        form.source_bpm.as_deref(),
        form.target_bpm.as_deref(),
    )?;

    info!(
        job = %job.id,
        filename = %original_name,
        size_bytes = form.size_bytes,
        source_bpm = plan.source_bpm,
        target_bpm = plan.target_bpm,
        filter = %plan.filter_chain(),
        "Starting tempo change"
    );

    let guard = state.begin_job();
    state.transcoder.run(&job.input, &job.output, &plan.stages).await?;
    let bytes = tokio::fs::read(&job.output).await?;
    guard.succeed();

    let content_type = form
        .content_type
        .clone()
        .unwrap_or_else(|| "application/octet-stream".to_string());
    let attachment_name = download_name(&original_name, &content_type, plan.target_bpm);

    Ok(download_response(
        bytes,
        attachment_name,
        content_type,
        &plan,
    ))
}

/// Drain the multipart stream into `form`, writing the audio field to disk.
///
/// `form.job` is set as soon as a file path is reserved, so the caller can
/// clean up even when this returns an error halfway through.
async fn read_form(state: &AppState, mut payload: Multipart, form: &mut UploadForm) -> AppResult<()> {
    let max_upload_bytes = state.config().uploads.max_upload_bytes;

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| AppError::BadRequest(format!("Multipart error: {}", e)))?;

        let content_disposition = field.content_disposition().ok_or_else(|| {
            AppError::ValidationError("Missing content disposition".to_string())
        })?;
        let field_name = content_disposition
            .get_name()
            .ok_or_else(|| AppError::ValidationError("Missing field name".to_string()))?
            .to_string();

        match field_name.as_str() {
            "audioFile" => {
                if form.job.is_some() {
                    return Err(AppError::ValidationError("Only one audioFile may be uploaded".to_string()));
                }

                let filename = content_disposition.get_filename().unwrap_or_default().to_string();
                let content_type = field
                    .content_type()
                    .map(|mime| mime.essence_str().to_string())
                    .unwrap_or_default();
                if !ACCEPTED_MEDIA_TYPES.contains(&content_type.as_str()) {
                    return Err(AppError::UnsupportedMedia(format!(
                        "Only .mp3 and .wav files are allowed (got '{}')",
                        content_type
                    )));
                }

                let job = state.workspace.allocate(&filename, &content_type);
                form.job = Some(job.clone());
                form.original_name = Some(filename);
                form.content_type = Some(content_type);

                let mut file = tokio::fs::File::create(&job.input).await?;
                while let Some(chunk) = field.next().await {
                    let chunk = chunk.map_err(|e| AppError::BadRequest(format!("Chunk error: {}", e)))?;
                    form.size_bytes += chunk.len();
                    if form.size_bytes > max_upload_bytes {
                        return Err(AppError::PayloadTooLarge { limit: max_upload_bytes });
                    }
                    file.write_all(&chunk).await?;
                }
                file.flush().await?;
            }
            "targetBpm" => form.target_bpm = Some(read_text_field(&mut field, &field_name).await?),
            "sourceBpm" => form.source_bpm = Some(read_text_field(&mut field, &field_name).await?),
            other => {
                warn!(field = %other, "Ignoring unknown form field");
                while let Some(chunk) = field.next().await {
                    chunk.map_err(|e| AppError::BadRequest(format!("Chunk error: {}", e)))?;
                }
            }
        }
    }

    Ok(())
}

async fn read_text_field(field: &mut actix_multipart::Field, name: &str) -> AppResult<String> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|e| AppError::BadRequest(format!("Chunk error: {}", e)))?;
        bytes.extend_from_slice(&chunk);
        if bytes.len() > MAX_TEXT_FIELD_BYTES {
            return Err(AppError::ValidationError(format!("Field '{}' is too long", name)));
        }
    }
    String::from_utf8(bytes)
        .map_err(|_| AppError::ValidationError(format!("Field '{}' is not valid UTF-8", name)))
}

/// Build the attachment response for a finished job.
fn download_response(
    bytes: Vec<u8>,
    attachment_name: String,
    content_type: String,
    plan: &RetempoPlan,
) -> HttpResponse {
    HttpResponse::Ok()
        .content_type(content_type)
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(attachment_name)],
        })
        .insert_header((STAGES_HEADER, plan.filter_chain()))
        .body(bytes)
}

/// Show the stage chain a tempo change would use, without uploading anything.
///
/// ## Endpoint: `GET /api/v1/plan?filename=loop_90.wav&target_bpm=30`
///
/// ## Response:
/// ```json
/// {
///   "plan": {
///     "source_bpm": 90.0,
///     "source": "filename",
///     "target_bpm": 30.0,
///     "ratio": 0.3333333333333333,
///     "stages": [0.5, 0.67]
///   },
///   "filter_chain": "atempo=0.50,atempo=0.67",
///   "timestamp": "2025-01-01T12:00:00Z"
/// }
/// ```
pub async fn plan_tempo(query: web::Query<PlanQuery>) -> AppResult<HttpResponse> {
    let plan = tempo::plan(
        &query.filename,
        query.source_bpm.as_deref(),
        query.target_bpm.as_deref(),
    )?;

    Ok(HttpResponse::Ok().json(json!({
        "filter_chain": plan.filter_chain(),
        "plan": plan,
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}
