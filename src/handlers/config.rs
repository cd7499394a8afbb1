use crate::{error::AppError, state::AppState};
use actix_web::{web, HttpResponse};
use serde_json::json;

/// Read-only view of the startup configuration.
///
/// ## Endpoint: `GET /api/v1/config`
pub async fn get_config(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let config = state.config();

    Ok(HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "config": {
            "server": {
                "host": config.server.host,
                "port": config.server.port
            },
            "uploads": {
                "dir": config.uploads.dir,
                "max_upload_bytes": config.uploads.max_upload_bytes
            },
            "transcoder": {
                "ffmpeg_path": config.transcoder.ffmpeg_path,
                "timeout_secs": config.transcoder.timeout_secs
            },
            "performance": {
                "max_concurrent_jobs": config.performance.max_concurrent_jobs
            }
        }
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use actix_web::{test, App};

    #[actix_web::test]
    async fn test_get_config() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(AppState::new(AppConfig::default())))
                .route("/api/v1/config", web::get().to(get_config)),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/v1/config").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["config"]["server"]["port"], 3000);
        assert_eq!(body["config"]["uploads"]["dir"], "uploads");
        assert_eq!(body["config"]["transcoder"]["ffmpeg_path"], "ffmpeg");
    }
}
