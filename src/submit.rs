//! Public platform submission: form normalisation, the spam honeypot, and the
//! two-step screenshot upload (pre-signed URL, then a direct PUT to storage).

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::ApiError;
use crate::types::{PresignedUpload, PresignedUploadRequest, Submission, SubmissionPayload};

#[async_trait]
pub trait SubmissionApi: Send + Sync + 'static {
    async fn submit(&self, payload: &SubmissionPayload) -> Result<Submission, ApiError>;
    async fn upload_url(&self, req: &PresignedUploadRequest) -> Result<PresignedUpload, ApiError>;
    async fn put_object(&self, upload_url: &str, content_type: &str, bytes: Vec<u8>) -> Result<(), ApiError>;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Submitted(Submission),
    /// Honeypot was filled in; nothing was sent.
    Dropped,
}

/// Raw form input, as typed.
#[derive(Debug, Clone, Default)]
pub struct SubmissionForm {
    pub submitter_name: String,
    pub submitter_email: String,
    pub platform_name: String,
    pub description: String,
    pub website_url: String,
    pub ios_url: String,
    pub android_url: String,
    pub web_url: String,
    pub screenshot_url: String,
    /// Hidden field; humans leave it empty.
    pub honeypot: String,
    pub recaptcha_token: Option<String>,
}

fn optional(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

impl SubmissionForm {
    pub fn is_spam(&self) -> bool {
        !self.honeypot.is_empty()
    }

    pub fn check_required(&self) -> Result<(), SubmitError> {
        for (name, value) in [
            ("submitter_name", &self.submitter_name),
            ("submitter_email", &self.submitter_email),
            ("platform_name", &self.platform_name),
        ] {
            if value.trim().is_empty() {
                return Err(SubmitError::MissingField(name));
            }
        }
        Ok(())
    }

    /// Blank optional fields are left out of the JSON entirely.
    pub fn into_payload(&self) -> SubmissionPayload {
        SubmissionPayload {
            submitter_name: self.submitter_name.trim().to_string(),
            submitter_email: self.submitter_email.trim().to_string(),
            platform_name: self.platform_name.trim().to_string(),
            description: optional(&self.description),
            website_url: optional(&self.website_url),
            ios_url: optional(&self.ios_url),
            android_url: optional(&self.android_url),
            web_url: optional(&self.web_url),
            screenshot_url: optional(&self.screenshot_url),
            recaptcha_token: self.recaptcha_token.as_deref().and_then(optional),
        }
    }
}

pub async fn submit<A: SubmissionApi + ?Sized>(api: &A, form: &SubmissionForm) -> Result<SubmitOutcome, SubmitError> {
    if form.is_spam() {
        log::info!("[submit] honeypot filled, dropping submission");
        return Ok(SubmitOutcome::Dropped);
    }
    form.check_required()?;
    let created = api.submit(&form.into_payload()).await?;
    Ok(SubmitOutcome::Submitted(created))
}

pub fn guess_content_type(filename: &str) -> &'static str {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

/// Upload a screenshot and point the form at its public URL. A failed PUT
/// surfaces as [`ApiError::Upload`] and leaves the form untouched.
pub async fn upload_screenshot<A: SubmissionApi + ?Sized>(
    api: &A,
    form: &mut SubmissionForm,
    filename: &str,
    content_type: Option<&str>,
    bytes: Vec<u8>,
) -> Result<String, ApiError> {
    let content_type = content_type
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| guess_content_type(filename))
        .to_string();
    let target = api
        .upload_url(&PresignedUploadRequest {
            filename: filename.to_string(),
            content_type: Some(content_type.clone()),
        })
        .await?;
    log::debug!("[submit] uploading {} bytes of {content_type}", bytes.len());
    api.put_object(&target.upload_url, &content_type, bytes).await?;
    form.screenshot_url = target.file_url.clone();
    Ok(target.file_url)
}
