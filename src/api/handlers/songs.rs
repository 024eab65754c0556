use std::sync::Arc;

use axum::extract::multipart::Field;
use axum::extract::{Multipart, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::response::{ApiError, AppQuery, JSend, JSendPaginated, Pagination};
use crate::storage::models::SongRecord;
use crate::upload::{
    MediaFile, Notification, NotificationLog, Outcome, PresentationSurface, StaticSession,
    SurfaceSignals, UploadForm, UploadOrchestrator,
};
use crate::AppState;

/// Identity of the uploader. Authentication happens in front of this service.
pub const USER_HEADER: &str = "x-user-id";

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct SongResponse {
    pub author: String,
    pub created_at: String,
    pub id: String,
    pub image_path: String,
    pub song_path: String,
    pub title: String,
    pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct CreateSongResponse {
    pub notifications: Vec<Notification>,
    /// The song listing changed and should be fetched again.
    pub refresh: bool,
    pub song: SongResponse,
}

#[derive(Debug, Deserialize)]
pub struct ListSongsParams {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
    #[serde(default)]
    pub user_id: Option<String>,
}

fn default_limit() -> u32 {
    20
}

// ============================================================================
// Handlers
// ============================================================================

/// Multipart fields: `title`, `author`, `song` (file), `image` (file).
pub async fn create_song(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<JSend<CreateSongResponse>>, ApiError> {
    let session = headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(StaticSession::signed_in)
        .unwrap_or_else(StaticSession::anonymous);

    let notes = Arc::new(NotificationLog::default());
    let signals = Arc::new(SurfaceSignals::default());
    let surface: Arc<dyn PresentationSurface> = signals.clone();

    let orchestrator = UploadOrchestrator::new(
        Arc::clone(&state.object_store),
        Arc::new(state.db.clone()),
        Arc::new(session),
        notes.clone(),
        state.config.upload.clone(),
    );
    let form = UploadForm::new(
        Arc::new(orchestrator),
        notes.clone(),
        &surface,
        state.config.max_upload_size,
    );

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart data: {e}")))?
    {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "title" => {
                form.set_title(read_text(field, "title").await?);
            }
            "author" => {
                form.set_author(read_text(field, "author").await?);
            }
            "song" => {
                form.set_song(read_file(field, "song").await?);
            }
            "image" => {
                form.set_image(read_file(field, "image").await?);
            }
            _ => {
                // Ignore unknown fields
            }
        }
    }

    match form.submit().await {
        Some(Outcome::Success(record)) => Ok(JSend::success(CreateSongResponse {
            notifications: notes.snapshot(),
            refresh: signals.refreshes() > 0,
            song: song_to_response(&record),
        })),
        Some(Outcome::ValidationFailed(reason)) => Err(ApiError::bad_request(reason.to_string())),
        Some(Outcome::UploadFailed { message, .. }) => Err(ApiError::upstream(message)),
        Some(Outcome::Unexpected(_)) => Err(ApiError::internal("Something went wrong")),
        // The form is built per request, so it is never already busy here.
        None => Err(ApiError::conflict("An upload is already in progress")),
    }
}

pub async fn list_songs(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<ListSongsParams>,
) -> Result<Json<JSendPaginated<SongResponse>>, ApiError> {
    if params.limit == 0 {
        return Err(ApiError::bad_request("limit must be greater than 0"));
    }

    let songs = match params.user_id.as_deref() {
        Some(user_id) => state.db.list_songs_by_user(user_id),
        None => state.db.list_songs(),
    }
    .map_err(|e| ApiError::internal(e.to_string()))?;

    let total = songs.len() as u64;
    let items: Vec<SongResponse> = songs
        .iter()
        .skip(params.offset as usize)
        .take(params.limit as usize)
        .map(song_to_response)
        .collect();

    Ok(JSend::page(
        items,
        Pagination {
            limit: params.limit,
            offset: params.offset,
            total,
        },
    ))
}

// ============================================================================
// Helpers
// ============================================================================

async fn read_text(field: Field<'_>, name: &str) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid {name}: {e}")))
}

/// Browsers send an empty, unnamed part for a file input left blank; that counts as absent.
async fn read_file(field: Field<'_>, name: &str) -> Result<Option<MediaFile>, ApiError> {
    let file_name = field.file_name().unwrap_or("").to_string();
    let content_type = field.content_type().map(|s| s.to_string());

    let data = field
        .bytes()
        .await
        .map_err(|e| ApiError::bad_request(format!("Failed to read {name} file: {e}")))?;

    if file_name.is_empty() && data.is_empty() {
        return Ok(None);
    }

    Ok(Some(MediaFile::new(file_name, content_type, data)))
}

fn song_to_response(song: &SongRecord) -> SongResponse {
    SongResponse {
        author: song.author.clone(),
        created_at: song.created_at.to_rfc3339(),
        id: song.id.clone(),
        image_path: song.image_path.clone(),
        song_path: song.song_path.clone(),
        title: song.title.clone(),
        user_id: song.user_id.clone(),
    }
}
