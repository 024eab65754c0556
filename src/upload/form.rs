use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tracing::{debug, error};

use super::orchestrator::guarded;
use super::{
    MediaFile, Notifier, Outcome, PresentationSurface, UploadOrchestrator, UploadRequest,
    ValidationError,
};

/// The four inputs of the upload form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormValues {
    pub title: String,
    pub author: String,
    pub song: Option<MediaFile>,
    pub image: Option<MediaFile>,
}

impl FormValues {
    pub fn is_empty(&self) -> bool {
        *self == FormValues::default()
    }
}

/// Holds one form instance's inputs and its in-flight flag.
///
/// `Idle -> Submitting -> Idle`: a successful submit clears the inputs and closes
/// the surface, a failed one keeps them for correction. Inputs cannot be edited
/// while a submission is in flight.
pub struct UploadForm {
    values: Mutex<FormValues>,
    busy: AtomicBool,
    orchestrator: Arc<UploadOrchestrator>,
    notifier: Arc<dyn Notifier>,
    surface: Weak<dyn PresentationSurface>,
    max_file_size: u64,
}

/// Holds the busy flag for the duration of one submit; released on drop,
/// which covers early returns, panics and the submit future being dropped.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl UploadForm {
    /// The surface is held weakly: if it goes away mid-submit, its signals are skipped.
    pub fn new(
        orchestrator: Arc<UploadOrchestrator>,
        notifier: Arc<dyn Notifier>,
        surface: &Arc<dyn PresentationSurface>,
        max_file_size: u64,
    ) -> Self {
        Self {
            values: Mutex::new(FormValues::default()),
            busy: AtomicBool::new(false),
            orchestrator,
            notifier,
            surface: Arc::downgrade(surface),
            max_file_size,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn values(&self) -> FormValues {
        self.lock_values().clone()
    }

    pub fn set_title(&self, title: impl Into<String>) -> bool {
        let title = title.into();
        self.edit(|v| v.title = title)
    }

    pub fn set_author(&self, author: impl Into<String>) -> bool {
        let author = author.into();
        self.edit(|v| v.author = author)
    }

    pub fn set_song(&self, song: Option<MediaFile>) -> bool {
        self.edit(|v| v.song = song)
    }

    pub fn set_image(&self, image: Option<MediaFile>) -> bool {
        self.edit(|v| v.image = image)
    }

    /// Dismiss the form: drop whatever was entered and tell the surface to close.
    /// Ignored while a submission is in flight.
    pub fn close(&self) -> bool {
        if self.is_busy() {
            return false;
        }
        self.reset();
        self.signal(|s| s.on_close());
        true
    }

    /// Submit the current inputs. Returns `None` without doing anything if a
    /// submission from this form is already in flight.
    pub async fn submit(&self) -> Option<Outcome> {
        let Some(_guard) = BusyGuard::acquire(&self.busy) else {
            debug!("Submit ignored: upload already in progress");
            return None;
        };

        let request = match self.validated_request() {
            Ok(request) => request,
            Err(reason) => {
                debug!(reason = %reason, "Form validation failed");
                let message = reason.to_string();
                let notified = guarded(|| self.notifier.error(&message));
                return Some(settle(Outcome::ValidationFailed(reason), notified));
            }
        };

        let outcome = self.orchestrator.submit(request).await;
        if !outcome.is_success() {
            return Some(outcome);
        }

        let finished = guarded(|| {
            self.signal(|s| s.on_refresh());
            self.reset();
            self.signal(|s| s.on_close());
        });
        Some(settle(outcome, finished))
    }

    fn validated_request(&self) -> Result<UploadRequest, ValidationError> {
        let values = self.values();

        if values.title.trim().is_empty() {
            return Err(ValidationError::MissingTitle);
        }
        if values.author.trim().is_empty() {
            return Err(ValidationError::MissingAuthor);
        }

        let song = values.song.ok_or(ValidationError::MissingSong)?;
        let image = values.image.ok_or(ValidationError::MissingImage)?;

        if !song.is_audio() {
            return Err(ValidationError::NotAudio(song.content_type));
        }
        if !image.is_image() {
            return Err(ValidationError::NotImage(image.content_type));
        }

        for (field, file) in [("song", &song), ("image", &image)] {
            if file.byte_size() > self.max_file_size {
                return Err(ValidationError::TooLarge {
                    field,
                    size: file.byte_size(),
                    limit: self.max_file_size,
                });
            }
        }

        Ok(UploadRequest {
            title: values.title,
            author: values.author,
            song: Some(song),
            image: Some(image),
        })
    }

    fn edit(&self, apply: impl FnOnce(&mut FormValues)) -> bool {
        if self.is_busy() {
            return false;
        }
        apply(&mut self.lock_values());
        true
    }

    fn reset(&self) {
        *self.lock_values() = FormValues::default();
    }

    fn signal(&self, send: impl FnOnce(&dyn PresentationSurface)) {
        match self.surface.upgrade() {
            Some(surface) => send(surface.as_ref()),
            None => debug!("Presentation surface is gone, skipping signal"),
        }
    }

    fn lock_values(&self) -> std::sync::MutexGuard<'_, FormValues> {
        self.values.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A collaborator that panicked after the user was notified downgrades the
/// outcome to [`Outcome::Unexpected`]; nobody is notified a second time.
fn settle(outcome: Outcome, call: Result<(), String>) -> Outcome {
    match call {
        Ok(()) => outcome,
        Err(detail) => {
            error!(error = %detail, "Collaborator panicked while finishing a submit");
            Outcome::Unexpected(detail)
        }
    }
}
