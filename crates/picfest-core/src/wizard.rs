use bytes::Bytes;
use thiserror::Error;
use tracing::debug;

use picfest_types::models::{GuestProfileInput, Media};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardStep {
    Profile = 1,
    SelectMedia = 2,
    Caption = 3,
    Done = 4,
}

impl WizardStep {
    pub fn number(self) -> u8 {
        self as u8
    }
}

/// A file the guest picked but that has not been uploaded yet. Holding it
/// is the server-side counterpart of the browser preview.
#[derive(Debug, Clone)]
pub struct StagedFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl StagedFile {
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Lowercased extension of the original file name, if any.
    pub fn extension(&self) -> Option<String> {
        self.file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty() && ext.len() <= 8)
    }
}

/// Everything needed to perform the upload, taken when submitting starts.
#[derive(Debug, Clone)]
pub struct Submission {
    pub profile: GuestProfileInput,
    pub profile_photo: Option<StagedFile>,
    pub media: StagedFile,
    pub caption: Option<String>,
    pub show_on_screen: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WizardError {
    #[error("Name and email are required")]
    ProfileIncomplete,

    #[error("Not available on step {0}")]
    WrongStep(u8),

    #[error("No media selected")]
    NoMedia,

    #[error("Upload already in progress")]
    AlreadySubmitting,

    #[error("No upload in progress")]
    NotSubmitting,
}

/// Guest upload flow: profile, pick a file, caption, done.
#[derive(Debug)]
pub struct UploadWizard {
    step: WizardStep,
    profile: GuestProfileInput,
    profile_photo: Option<StagedFile>,
    media: Option<StagedFile>,
    caption: String,
    show_on_screen: bool,
    submitting: bool,
    error: Option<String>,
    uploaded: Option<Media>,
    released_previews: u64,
}

impl Default for UploadWizard {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadWizard {
    pub fn new() -> Self {
        Self {
            step: WizardStep::Profile,
            profile: GuestProfileInput::default(),
            profile_photo: None,
            media: None,
            caption: String::new(),
            show_on_screen: true,
            submitting: false,
            error: None,
            uploaded: None,
            released_previews: 0,
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn profile(&self) -> &GuestProfileInput {
        &self.profile
    }

    pub fn profile_photo(&self) -> Option<&StagedFile> {
        self.profile_photo.as_ref()
    }

    pub fn media(&self) -> Option<&StagedFile> {
        self.media.as_ref()
    }

    pub fn caption(&self) -> &str {
        &self.caption
    }

    pub fn show_on_screen(&self) -> bool {
        self.show_on_screen
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn uploaded(&self) -> Option<&Media> {
        self.uploaded.as_ref()
    }

    /// How many staged files were let go (replaced, uploaded or discarded).
    pub fn released_previews(&self) -> u64 {
        self.released_previews
    }

    fn expect_step(&self, step: WizardStep) -> Result<(), WizardError> {
        if self.step == step {
            Ok(())
        } else {
            Err(WizardError::WrongStep(self.step.number()))
        }
    }

    /// The submission holds its own copy of the caption-step fields.
    fn expect_editable(&self) -> Result<(), WizardError> {
        if self.submitting {
            return Err(WizardError::AlreadySubmitting);
        }
        Ok(())
    }

    fn release(&mut self, file: Option<StagedFile>) {
        if let Some(file) = file {
            debug!("Released staged file {}", file.file_name);
            self.released_previews += 1;
        }
    }

    pub fn can_proceed(&self) -> bool {
        !self.profile.name.trim().is_empty() && !self.profile.email.trim().is_empty()
    }

    pub fn set_profile(&mut self, draft: GuestProfileInput) -> Result<(), WizardError> {
        self.expect_step(WizardStep::Profile)?;
        self.profile = draft;
        Ok(())
    }

    pub fn stage_profile_photo(&mut self, file: StagedFile) -> Result<(), WizardError> {
        self.expect_step(WizardStep::Profile)?;
        let previous = self.profile_photo.replace(file);
        self.release(previous);
        Ok(())
    }

    pub fn proceed(&mut self) -> Result<(), WizardError> {
        self.expect_step(WizardStep::Profile)?;
        if !self.can_proceed() {
            return Err(WizardError::ProfileIncomplete);
        }
        self.step = WizardStep::SelectMedia;
        Ok(())
    }

    pub fn back_to_profile(&mut self) -> Result<(), WizardError> {
        self.expect_step(WizardStep::SelectMedia)?;
        self.step = WizardStep::Profile;
        Ok(())
    }

    /// Stage the file to upload. Allowed again on the caption step to swap it.
    pub fn select_media(&mut self, file: StagedFile) -> Result<(), WizardError> {
        if !matches!(self.step, WizardStep::SelectMedia | WizardStep::Caption) {
            return Err(WizardError::WrongStep(self.step.number()));
        }
        self.expect_editable()?;
        let previous = self.media.replace(file);
        self.release(previous);
        self.step = WizardStep::Caption;
        Ok(())
    }

    pub fn set_caption(&mut self, caption: String) -> Result<(), WizardError> {
        self.expect_step(WizardStep::Caption)?;
        self.expect_editable()?;
        self.caption = caption;
        Ok(())
    }

    pub fn set_show_on_screen(&mut self, show: bool) -> Result<(), WizardError> {
        self.expect_step(WizardStep::Caption)?;
        self.expect_editable()?;
        self.show_on_screen = show;
        Ok(())
    }

    pub fn begin_submit(&mut self) -> Result<Submission, WizardError> {
        self.expect_step(WizardStep::Caption)?;
        if self.submitting {
            return Err(WizardError::AlreadySubmitting);
        }
        let media = self.media.clone().ok_or(WizardError::NoMedia)?;

        self.submitting = true;
        self.error = None;

        let caption = self.caption.trim();
        Ok(Submission {
            profile: self.profile.clone(),
            profile_photo: self.profile_photo.clone(),
            media,
            caption: (!caption.is_empty()).then(|| caption.to_string()),
            show_on_screen: self.show_on_screen,
        })
    }

    /// Record the upload outcome. Success moves to the final step and lets
    /// go of the staged files; failure keeps everything for a retry.
    pub fn finish_submit(&mut self, outcome: Result<Media, String>) -> Result<(), WizardError> {
        if !self.submitting {
            return Err(WizardError::NotSubmitting);
        }
        self.submitting = false;

        match outcome {
            Ok(media) => {
                let staged = self.media.take();
                self.release(staged);
                // The badge photo went up with this submission.
                let photo = self.profile_photo.take();
                self.release(photo);
                self.uploaded = Some(media);
                self.step = WizardStep::Done;
            }
            Err(message) => {
                self.error = Some(message);
            }
        }
        Ok(())
    }

    pub fn send_another(&mut self) -> Result<(), WizardError> {
        self.expect_step(WizardStep::Done)?;
        let staged = self.media.take();
        self.release(staged);
        self.caption.clear();
        self.show_on_screen = true;
        self.uploaded = None;
        self.error = None;
        self.step = WizardStep::SelectMedia;
        Ok(())
    }

    /// Drop every staged file, e.g. when the session is discarded.
    pub fn discard(&mut self) {
        let media = self.media.take();
        self.release(media);
        let photo = self.profile_photo.take();
        self.release(photo);
    }
}
