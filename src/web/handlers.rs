use actix_files::NamedFile;
use actix_multipart::Multipart;
use actix_web::http::header::RANGE;
use actix_web::{get, post, route, web, HttpRequest, HttpResponse};
use futures::TryStreamExt;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::catalog::MediaItem;
use crate::streaming::{self, MediaFile};
use crate::web::error::ApiError;
use crate::web::models::AppState;

const MAX_TITLE_BYTES: usize = 1024;

fn find_video(state: &AppState, id: &str) -> Result<(MediaItem, PathBuf), ApiError> {
    let item = state
        .catalog
        .lookup(id)
        .ok_or(ApiError::NotFound("Video not found"))?;
    let path = state.video_path(&item).ok_or_else(|| {
        warn!("Catalog entry {} has an unusable filename {:?}", item.id, item.filename);
        ApiError::NotFound("Video file not found")
    })?;
    Ok((item, path))
}

fn missing_file(item: &MediaItem, path: &Path) -> ApiError {
    warn!(
        "Video {} is in the catalog but {} is missing from storage",
        item.id,
        path.display()
    );
    ApiError::NotFound("Video file not found")
}

// Handler for the index page
#[get("/")]
pub async fn index(state: web::Data<AppState>) -> HttpResponse {
    let videos = state.catalog.list();

    let mut html = String::from(
        r#"
    <!DOCTYPE html>
    <html>
    <head>
        <title>vidserve</title>
        <style>
            body { font-family: Arial, sans-serif; margin: 0; padding: 20px; background-color: #f5f5f5; }
            .video-grid { display: grid; grid-template-columns: repeat(auto-fill, minmax(300px, 1fr)); gap: 20px; }
            .video-item { background-color: white; border-radius: 8px; overflow: hidden; box-shadow: 0 2px 4px rgba(0,0,0,0.1); }
            .thumbnail { width: 100%; height: 180px; object-fit: cover; background-color: #ccc; }
            .video-info { padding: 10px; }
            h1 { color: #333; }
            a { text-decoration: none; color: inherit; }
            .video-title { margin: 5px 0; color: #333; }
        </style>
    </head>
    <body>
        <h1>Select a video to watch</h1>
        <div class="video-grid">
    "#,
    );

    for video in videos {
        html.push_str(&format!(
            r#"
            <div class="video-item">
                <a href="/video/{id}">
                    <img class="thumbnail" src="/api/thumbnails/{id}" alt="{title}" loading="lazy" onerror="this.style.backgroundColor='#ccc';">
                    <div class="video-info">
                        <h3 class="video-title">{title}</h3>
                    </div>
                </a>
            </div>
        "#,
            id = escape_html(&video.id),
            title = escape_html(&video.title)
        ));
    }

    html.push_str(
        r#"
        </div>
    </body>
    </html>
    "#,
    );

    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(html)
}

#[get("/videos")]
pub async fn list_videos(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.catalog.list())
}

#[route("/video/{id}", method = "GET", method = "HEAD")]
pub async fn stream_video(
    req: HttpRequest,
    state: web::Data<AppState>,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let (item, path) = find_video(&state, &id)?;

    let media = match MediaFile::open(&path).await {
        Ok(media) => media,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(missing_file(&item, &path))
        }
        Err(e) => return Err(e.into()),
    };

    let total_size = media.len();
    let range_header = req.headers().get(RANGE).map(|v| v.to_str().unwrap_or(""));
    debug!("Video {} requested, range={:?} size={}", item.id, range_header, total_size);

    let decision = streaming::resolve(range_header, total_size).map_err(|e| {
        debug!("Rejecting range for video {}: {}", item.id, e);
        ApiError::RangeNotSatisfiable { total_size }
    })?;

    streaming::stream(media, decision, &state.content_type, state.chunk_size)
        .await
        .map_err(ApiError::from)
}

#[get("/api/thumbnails/{id}")]
pub async fn get_thumbnail(
    state: web::Data<AppState>,
    id: web::Path<String>,
) -> Result<NamedFile, ApiError> {
    let (item, source) = find_video(&state, &id)?;

    let cached = state.thumbnails.thumbnail_path(&item.id)?;
    if !tokio::fs::try_exists(&cached).await.unwrap_or(false)
        && !tokio::fs::try_exists(&source).await.unwrap_or(false)
    {
        return Err(missing_file(&item, &source));
    }

    let thumb_path = state.thumbnails.get_or_create(&item.id, &source).await?;
    Ok(NamedFile::open_async(thumb_path).await?)
}

#[post("/api/videos")]
pub async fn upload_video(
    state: web::Data<AppState>,
    mut payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let mut title: Option<String> = None;
    let mut stored: Option<(PathBuf, String)> = None;

    let result = read_upload(&state, &mut payload, &mut title, &mut stored).await;

    let title = title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());
    let (title, (stored_path, filename)) = match (result, title, stored) {
        (Ok(()), Some(title), Some(stored)) => (title, stored),
        (result, _, stored) => {
            if let Some((path, _)) = stored {
                let _ = tokio::fs::remove_file(&path).await;
            }
            result?;
            return Err(ApiError::BadRequest(
                "Both a title and a video file are required".to_string(),
            ));
        }
    };

    let catalog = state.catalog.clone();
    let created = web::block(move || catalog.create(&title, &filename))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))
        .and_then(|result| result.map_err(ApiError::from));

    match created {
        Ok(item) => {
            info!("Uploaded video {} as {}", item.id, item.filename);
            Ok(HttpResponse::Created().json(item))
        }
        Err(e) => {
            let _ = tokio::fs::remove_file(&stored_path).await;
            Err(e)
        }
    }
}

async fn read_upload(
    state: &AppState,
    payload: &mut Multipart,
    title: &mut Option<String>,
    stored: &mut Option<(PathBuf, String)>,
) -> Result<(), ApiError> {
    let bad_multipart = |e: actix_multipart::MultipartError| ApiError::BadRequest(e.to_string());

    while let Some(mut field) = payload.try_next().await.map_err(bad_multipart)? {
        let (name, original_filename) = match field.content_disposition() {
            Some(cd) => (
                cd.get_name().map(str::to_string),
                cd.get_filename()
                    .filter(|f| !f.is_empty())
                    .map(str::to_string),
            ),
            None => (None, None),
        };

        if let Some(original) = original_filename {
            if stored.is_some() {
                return Err(ApiError::BadRequest("Only one video file may be uploaded".to_string()));
            }

            let filename = storage_filename(&original);
            let path = state.videos_dir.join(&filename);
            tokio::fs::create_dir_all(&state.videos_dir).await?;
            let mut file = tokio::fs::File::create(&path).await?;
            *stored = Some((path, filename));

            while let Some(chunk) = field.try_next().await.map_err(bad_multipart)? {
                file.write_all(&chunk).await?;
            }
            file.flush().await?;
        } else if name.as_deref() == Some("title") {
            let mut value = Vec::new();
            while let Some(chunk) = field.try_next().await.map_err(bad_multipart)? {
                if value.len() + chunk.len() > MAX_TITLE_BYTES {
                    return Err(ApiError::BadRequest("Title is too long".to_string()));
                }
                value.extend_from_slice(&chunk);
            }
            let value = String::from_utf8(value)
                .map_err(|_| ApiError::BadRequest("Title must be valid UTF-8".to_string()))?;
            *title = Some(value);
        } else {
            // Drain fields we do not understand.
            while field.try_next().await.map_err(bad_multipart)?.is_some() {}
        }
    }

    Ok(())
}

/// Storage name for an upload: a fresh id plus the original extension when it
/// is a plain alphanumeric one.
fn storage_filename(original: &str) -> String {
    let extension = Path::new(original)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 8 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or("mp4".to_string());
    format!("{}.{}", Uuid::new_v4(), extension)
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_filename_keeps_simple_extensions() {
        assert!(storage_filename("holiday.MKV").ends_with(".mkv"));
        assert!(storage_filename("clip.mp4").ends_with(".mp4"));
        assert!(storage_filename("no_extension").ends_with(".mp4"));
        assert!(storage_filename("../../evil.sh;rm -rf").ends_with(".mp4"));
    }

    #[test]
    fn escape_html_neutralizes_markup() {
        assert_eq!(
            escape_html(r#"<b>"Tom" & 'Jerry'</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
    }
}
