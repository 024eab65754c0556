//! The song upload workflow.
//!
//! A submission stores two blobs (audio, then cover art) under keys derived from one
//! per-attempt [`UploadToken`], then inserts a song record pointing at both. The
//! [`UploadOrchestrator`] sequences those writes and reports exactly one outcome;
//! the [`UploadForm`] owns the user inputs and the busy flag around it.

mod collaborators;
mod form;
mod orchestrator;
mod token;

pub use collaborators::{
    Notification, NotificationLog, Notifier, PresentationSurface, SessionProvider, StaticSession,
    SurfaceSignals, User,
};
pub use form::{FormValues, UploadForm};
pub use orchestrator::UploadOrchestrator;
pub use token::{RandomTokens, TokenGenerator, UploadToken};

use std::fmt;

use bytes::Bytes;
use thiserror::Error;

use crate::storage::models::SongRecord;

/// A user-selected file: name, resolved MIME type and contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

impl MediaFile {
    /// Build a file, guessing the MIME type from the name when the client didn't send a useful one.
    pub fn new(file_name: impl Into<String>, content_type: Option<String>, data: Bytes) -> Self {
        let file_name = file_name.into();
        let content_type = content_type
            .filter(|ct| !ct.is_empty() && ct != "application/octet-stream")
            .or_else(|| {
                mime_guess::from_path(&file_name)
                    .first()
                    .map(|m| m.to_string())
            })
            .unwrap_or_else(|| "application/octet-stream".to_string());

        Self {
            file_name,
            content_type,
            data,
        }
    }

    pub fn byte_size(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_audio(&self) -> bool {
        self.content_type.starts_with("audio/")
    }

    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }
}

/// One submission attempt, as handed from the form to the orchestrator.
/// The uploader's identity is not part of it; it comes from the session.
#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    pub title: String,
    pub author: String,
    pub song: Option<MediaFile>,
    pub image: Option<MediaFile>,
}

/// Which write of an attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Song,
    Image,
    Metadata,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Song => "song",
            Stage::Image => "image",
            Stage::Metadata => "metadata",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Missing fields: title is required")]
    MissingTitle,
    #[error("Missing fields: author is required")]
    MissingAuthor,
    #[error("Missing fields: song file is required")]
    MissingSong,
    #[error("Missing fields: image file is required")]
    MissingImage,
    #[error("You must be signed in to upload")]
    NotSignedIn,
    #[error("Song file must be audio, got {0}")]
    NotAudio(String),
    #[error("Image file must be an image, got {0}")]
    NotImage(String),
    #[error("{field} file is {size} bytes, the limit is {limit}")]
    TooLarge {
        field: &'static str,
        size: u64,
        limit: u64,
    },
}

/// Result of one submission. Exactly one notification is emitted per outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success(SongRecord),
    ValidationFailed(ValidationError),
    UploadFailed { stage: Stage, message: String },
    /// A collaborator panicked or broke its contract.
    Unexpected(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }
}
