use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, error, info, warn};

use super::token::{RandomTokens, TokenGenerator, UploadToken};
use super::{
    MediaFile, Notifier, Outcome, SessionProvider, Stage, UploadRequest, User, ValidationError,
};
use crate::config::UploadConfig;
use crate::object_store::{ObjectStore, StoredObject, UploadOptions};
use crate::storage::models::NewSong;
use crate::storage::MetadataStore;

/// A blob written earlier in the current attempt.
struct Landed {
    namespace: String,
    path: String,
}

/// Progress of one attempt, kept outside the attempt future so it survives a panic.
#[derive(Default)]
struct Attempt {
    token: Option<UploadToken>,
    landed: Vec<Landed>,
}

impl Attempt {
    fn token(&self) -> &str {
        self.token.as_ref().map(UploadToken::as_str).unwrap_or("-")
    }
}

/// Drives one submission: song blob, image blob, then the song record.
///
/// Holds no state of its own between calls; concurrent submissions are isolated
/// only by their tokens.
pub struct UploadOrchestrator {
    blobs: Arc<dyn ObjectStore>,
    metadata: Arc<dyn MetadataStore>,
    session: Arc<dyn SessionProvider>,
    notifier: Arc<dyn Notifier>,
    tokens: Arc<dyn TokenGenerator>,
    settings: UploadConfig,
}

impl UploadOrchestrator {
    pub fn new(
        blobs: Arc<dyn ObjectStore>,
        metadata: Arc<dyn MetadataStore>,
        session: Arc<dyn SessionProvider>,
        notifier: Arc<dyn Notifier>,
        settings: UploadConfig,
    ) -> Self {
        Self {
            blobs,
            metadata,
            session,
            notifier,
            tokens: Arc::new(RandomTokens),
            settings,
        }
    }

    pub fn with_token_generator(mut self, tokens: Arc<dyn TokenGenerator>) -> Self {
        self.tokens = tokens;
        self
    }

    /// Run one attempt and report its outcome to the notifier exactly once.
    /// Never panics: a panicking collaborator becomes [`Outcome::Unexpected`].
    pub async fn submit(&self, request: UploadRequest) -> Outcome {
        let mut attempt = Attempt::default();
        let result = AssertUnwindSafe(self.run(request, &mut attempt))
            .catch_unwind()
            .await;

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(payload) => {
                let detail = panic_message(payload.as_ref());
                error!(token = attempt.token(), error = %detail, "Upload attempt panicked");
                let unexpected = Outcome::Unexpected(detail);
                AssertUnwindSafe(self.fail(&attempt, "panic", unexpected.clone()))
                    .catch_unwind()
                    .await
                    .unwrap_or(unexpected)
            }
        };

        self.notify(outcome)
    }

    /// A panicking notifier turns the outcome into [`Outcome::Unexpected`]
    /// without a second notification.
    fn notify(&self, outcome: Outcome) -> Outcome {
        let sent = guarded(|| match &outcome {
            Outcome::Success(_) => self.notifier.success("Song created!"),
            Outcome::ValidationFailed(reason) => self.notifier.error(&reason.to_string()),
            Outcome::UploadFailed { message, .. } => self.notifier.error(message),
            Outcome::Unexpected(_) => self.notifier.error("Something went wrong"),
        });

        match sent {
            Ok(()) => outcome,
            Err(detail) => {
                error!(error = %detail, "Notifier panicked");
                Outcome::Unexpected(detail)
            }
        }
    }

    async fn run(&self, request: UploadRequest, attempt: &mut Attempt) -> Outcome {
        let user = self.session.current_user();
        let (user, song, image) = match check_request(&request, user) {
            Ok(parts) => parts,
            Err(reason) => {
                debug!(reason = %reason, "Upload rejected before any store call");
                return Outcome::ValidationFailed(reason);
            }
        };

        let token = self.tokens.generate();
        debug!(token = %token, user_id = %user.id, "Starting upload attempt");
        attempt.token = Some(token.clone());

        let songs_ns = self.settings.songs_namespace.as_str();
        let images_ns = self.settings.images_namespace.as_str();

        let song_object = match self
            .put_blob(Stage::Song, songs_ns, &token.song_key(), song)
            .await
        {
            Ok(object) => object,
            Err(outcome) => return self.fail(attempt, Stage::Song.as_str(), outcome).await,
        };
        attempt.landed.push(Landed {
            namespace: songs_ns.to_string(),
            path: song_object.path.clone(),
        });

        let image_object = match self
            .put_blob(Stage::Image, images_ns, &token.image_key(), image)
            .await
        {
            Ok(object) => object,
            Err(outcome) => return self.fail(attempt, Stage::Image.as_str(), outcome).await,
        };
        attempt.landed.push(Landed {
            namespace: images_ns.to_string(),
            path: image_object.path.clone(),
        });

        // Stored as entered; blank checks above only look at the trimmed text.
        let song = NewSong {
            user_id: user.id,
            title: request.title.clone(),
            author: request.author.clone(),
            image_path: image_object.path,
            song_path: song_object.path,
        };

        match self.metadata.insert_song(song).await {
            Ok(record) => {
                info!(
                    token = %token,
                    song_id = %record.id,
                    song_path = %record.song_path,
                    image_path = %record.image_path,
                    "Song created"
                );
                Outcome::Success(record)
            }
            Err(e) => {
                let outcome = Outcome::UploadFailed {
                    stage: Stage::Metadata,
                    message: e.to_string(),
                };
                self.fail(attempt, Stage::Metadata.as_str(), outcome).await
            }
        }
    }

    /// Upload one file without overwriting; a failure comes back as the outcome to report.
    async fn put_blob(
        &self,
        stage: Stage,
        namespace: &str,
        key: &str,
        file: &MediaFile,
    ) -> Result<StoredObject, Outcome> {
        let options = UploadOptions {
            cache_control: self.settings.cache_control,
            content_type: file.content_type.clone(),
            overwrite: false,
        };

        match self
            .blobs
            .upload(namespace, key, file.data.clone(), &options)
            .await
        {
            Ok(object) if object.path.is_empty() => Err(Outcome::Unexpected(format!(
                "blob store returned an empty path for {namespace}/{key}"
            ))),
            Ok(object) => {
                debug!(namespace, key, path = %object.path, bytes = file.byte_size(), "Blob stored");
                Ok(object)
            }
            Err(e) => {
                warn!(namespace, key, error = %e, "Blob upload failed");
                Err(Outcome::UploadFailed {
                    stage,
                    message: format!("Failed {stage} upload"),
                })
            }
        }
    }

    /// Log a failed attempt and, if enabled, remove the blobs it already wrote.
    async fn fail(&self, attempt: &Attempt, cause: &str, outcome: Outcome) -> Outcome {
        let token = attempt.token();

        if attempt.landed.is_empty() {
            warn!(token, cause, "Upload attempt failed");
            return outcome;
        }

        if !self.settings.compensate_orphans {
            let orphans: Vec<String> = attempt
                .landed
                .iter()
                .map(|l| format!("{}/{}", l.namespace, l.path))
                .collect();
            warn!(
                token,
                cause,
                orphans = ?orphans,
                "Upload attempt failed, leaving earlier blobs in place"
            );
            return outcome;
        }

        warn!(token, cause, "Upload attempt failed, removing earlier blobs");
        for blob in &attempt.landed {
            if let Err(e) = self.blobs.delete(&blob.namespace, &blob.path).await {
                warn!(
                    namespace = %blob.namespace,
                    path = %blob.path,
                    error = %e,
                    "Failed to remove orphaned blob"
                );
            }
        }

        outcome
    }
}

/// Guard clause: everything the attempt needs must be present before any store call.
fn check_request(
    request: &UploadRequest,
    user: Option<User>,
) -> Result<(User, &MediaFile, &MediaFile), ValidationError> {
    let song = request.song.as_ref().ok_or(ValidationError::MissingSong)?;
    let image = request.image.as_ref().ok_or(ValidationError::MissingImage)?;
    let user = user.ok_or(ValidationError::NotSignedIn)?;

    if request.title.trim().is_empty() {
        return Err(ValidationError::MissingTitle);
    }
    if request.author.trim().is_empty() {
        return Err(ValidationError::MissingAuthor);
    }

    Ok((user, song, image))
}

/// Run a synchronous collaborator call, turning a panic into its message.
pub(super) fn guarded(call: impl FnOnce()) -> Result<(), String> {
    std::panic::catch_unwind(AssertUnwindSafe(call))
        .map_err(|payload| panic_message(payload.as_ref()))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
