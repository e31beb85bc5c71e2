use axum::http::header::{ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_DISPOSITION};
use axum::response::Response;

use super::prelude::*;
use crate::references::ReferenceInput;
use crate::script::{PageScript, ScriptGenerator, validate_script};
use crate::service::{CoverImageRequest, GeneratedImage, PageImageRequest, RetryOverride};
use crate::style::{ComicStyle, Language};

/// Unwraps a JSON body, turning a missing or broken one into a 400.
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ServiceError> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => {
            debug!("Rejected JSON body: {}", rejection);
            Err(ServiceError::BadRequest("No JSON data provided".to_string()))
        }
    }
}

fn image_response(generated: GeneratedImage) -> Json<Value> {
    Json(json!({
        "success": true,
        "image_url": generated.artifact_id,
        "prompt": generated.prompt,
    }))
}

/// handles GET /api/health
pub(crate) async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Deserialize)]
pub(crate) struct GenerateScriptBody {
    api_key: Option<String>,
    prompt: Option<String>,
    page_count: Option<u32>,
    base_url: Option<String>,
    model: Option<String>,
    comic_style: Option<String>,
    language: Option<String>,
}

/// handles POST /api/generate
pub(crate) async fn generate_script_handler(
    State(state): State<AppState>,
    payload: Result<Json<GenerateScriptBody>, JsonRejection>,
) -> Result<Json<Value>, ServiceError> {
    let req = body(payload)?;
    let api_key = req
        .api_key
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| ServiceError::BadRequest("API key is required".to_string()))?;
    let prompt = req
        .prompt
        .filter(|prompt| !prompt.trim().is_empty())
        .ok_or_else(|| ServiceError::BadRequest("Prompt is required".to_string()))?;
    let page_count = req
        .page_count
        .unwrap_or(crate::constants::SCRIPT_DEFAULT_PAGE_COUNT)
        .max(1);

    let mut generator = ScriptGenerator::new(state.service.http().clone(), api_key)
        .with_style(ComicStyle::from_key(req.comic_style.as_deref().unwrap_or_default()))
        .with_language(Language::from_key_or(
            req.language.as_deref().unwrap_or_default(),
            Language::Chinese,
        ));
    if let Some(base_url) = req.base_url.as_deref().filter(|url| !url.trim().is_empty()) {
        generator = generator.with_base_url(base_url);
    }
    if let Some(model) = req.model.as_deref().filter(|model| !model.trim().is_empty()) {
        generator = generator.with_model(model);
    }

    let pages = generator.generate(&prompt, page_count).await?;
    info!("Generated script with {} page(s)", pages.len());
    Ok(Json(json!({ "success": true, "pages": pages })))
}

#[derive(Deserialize)]
pub(crate) struct ValidateBody {
    #[serde(default)]
    script: Value,
}

/// handles POST /api/validate
pub(crate) async fn validate_handler(
    payload: Result<Json<ValidateBody>, JsonRejection>,
) -> Result<Json<Value>, ServiceError> {
    let req = body(payload)?;
    Ok(Json(match validate_script(&req.script) {
        Ok(()) => json!({ "valid": true }),
        Err(message) => json!({ "valid": false, "error": message }),
    }))
}

#[derive(Deserialize)]
pub(crate) struct GenerateImageBody {
    page_data: Option<Value>,
    comic_style: Option<String>,
    reference_img: Option<ReferenceInput>,
    extra_body: Option<ReferenceInput>,
    google_api_key: Option<String>,
    #[serde(flatten)]
    retry: RetryOverride,
}

/// handles POST /api/generate-image
pub(crate) async fn generate_image_handler(
    State(state): State<AppState>,
    payload: Result<Json<GenerateImageBody>, JsonRejection>,
) -> Result<Json<Value>, ServiceError> {
    let req = body(payload)?;
    let page_data = req
        .page_data
        .filter(|page| !page.is_null())
        .ok_or_else(|| ServiceError::BadRequest("Page data is required".to_string()))?;
    validate_script(&page_data).map_err(ServiceError::BadRequest)?;
    let page: PageScript = serde_json::from_value(page_data)
        .map_err(|err| ServiceError::BadRequest(format!("Invalid page data: {err}")))?;

    let generated = state
        .service
        .generate_page_image(PageImageRequest {
            page,
            style: req.comic_style.unwrap_or_default(),
            references: req.reference_img,
            prior_pages: req
                .extra_body
                .map(ReferenceInput::into_entries)
                .unwrap_or_default(),
            google_api_key: req.google_api_key,
            retry: req.retry,
        })
        .await?;
    Ok(image_response(generated))
}

#[derive(Deserialize)]
pub(crate) struct GenerateCoverBody {
    comic_style: Option<String>,
    language: Option<String>,
    reference_imgs: Option<ReferenceInput>,
    google_api_key: Option<String>,
    #[serde(flatten)]
    retry: RetryOverride,
}

/// handles POST /api/generate-cover
pub(crate) async fn generate_cover_handler(
    State(state): State<AppState>,
    payload: Result<Json<GenerateCoverBody>, JsonRejection>,
) -> Result<Json<Value>, ServiceError> {
    let req = body(payload)?;
    let references = req
        .reference_imgs
        .map(ReferenceInput::into_entries)
        .unwrap_or_default();
    debug!("Cover request with {} reference image(s)", references.len());

    let generated = state
        .service
        .generate_cover_image(CoverImageRequest {
            style: req.comic_style.unwrap_or_default(),
            language: req.language.unwrap_or_default(),
            references,
            google_api_key: req.google_api_key,
            retry: req.retry,
        })
        .await?;
    Ok(image_response(generated))
}

#[derive(Deserialize)]
pub(crate) struct ProxyQuery {
    url: Option<String>,
}

/// handles GET /api/proxy-image
pub(crate) async fn proxy_image_handler(
    State(state): State<AppState>,
    Query(query): Query<ProxyQuery>,
) -> Result<Response, ServiceError> {
    let url = query
        .url
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| ServiceError::BadRequest("Image URL is required".to_string()))?;
    let image = state.service.proxy_download(&url).await?;

    let content_type = HeaderValue::from_str(&image.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("image/png"));
    let disposition = format!(
        "attachment; filename=comic-{:08x}.png",
        rand::random::<u32>()
    );
    let mut response = (StatusCode::OK, image.bytes).into_response();
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, content_type);
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(CONTENT_DISPOSITION, value);
    }
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    Ok(response)
}
