use std::io::Cursor;

use axum::{
    extract::{multipart::MultipartError, Multipart},
    http::StatusCode,
};
use bytes::Bytes;
use image::{ImageFormat, ImageReader, Limits};
use tracing::{debug, warn};

use crate::{
    error::{AppError, AppResult},
    forms::{clean_email, FormErrors},
};

pub const NOT_AN_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";
pub const EMPTY_FILE: &str = "The submitted file is empty.";
pub const CLEAR_AND_UPLOAD: &str =
    "Please either submit a file or check the clear checkbox, not both.";

/// A picture file as it arrived in the multipart body.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub body: Bytes,
}

/// Raw fields of the edit-profile submission, before validation.
#[derive(Debug, Clone, Default)]
pub struct EditProfileSubmission {
    pub email: String,
    pub picture: Option<UploadedFile>,
    pub clear_picture: bool,
    /// The body went over the request limit while it was being read.
    pub picture_too_large: bool,
}

/// Turns a multipart read failure into either the "too large" marker or a
/// 400 for anything else.
fn read_error(e: MultipartError, what: &str) -> AppResult<()> {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        warn!("edit-profile body over the size limit");
        return Ok(());
    }
    Err(AppError::BadRequest(format!("{what}: {e}")))
}

impl EditProfileSubmission {
    pub async fn from_multipart(mut mp: Multipart) -> AppResult<Self> {
        let mut out = EditProfileSubmission::default();
        loop {
            let field = match mp.next_field().await {
                Ok(Some(field)) => field,
                Ok(None) => break,
                Err(e) => {
                    read_error(e, "malformed form data")?;
                    out.picture_too_large = true;
                    break;
                }
            };
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "email" => match field.text().await {
                    Ok(text) => out.email = text,
                    Err(e) => {
                        read_error(e, "malformed email field")?;
                        out.picture_too_large = true;
                        break;
                    }
                },
                "picture" => {
                    let file_name = field.file_name().unwrap_or_default().to_string();
                    let body = match field.bytes().await {
                        Ok(body) => body,
                        Err(e) => {
                            read_error(e, "could not read upload")?;
                            out.picture_too_large = true;
                            break;
                        }
                    };
                    // Browsers send an empty part when no file was chosen.
                    if !(file_name.is_empty() && body.is_empty()) {
                        out.picture = Some(UploadedFile { file_name, body });
                    }
                }
                "picture-clear" => out.clear_picture = true,
                _ => {}
            }
        }
        Ok(out)
    }
}

/// The user-record half of the edit page.
#[derive(Debug, Clone)]
pub struct UserEmailForm<'a> {
    pub email: &'a str,
}

impl UserEmailForm<'_> {
    pub fn clean(&self) -> Result<String, FormErrors> {
        let mut errors = FormErrors::new();
        match clean_email(self.email, "email", &mut errors) {
            Some(email) => Ok(email),
            None => Err(errors),
        }
    }
}

/// An uploaded picture that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidPicture {
    pub body: Bytes,
    pub content_type: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PictureChange {
    Keep,
    Clear,
    Replace(ValidPicture),
}

/// The profile half of the edit page.
#[derive(Debug, Clone)]
pub struct ProfileForm<'a> {
    pub picture: Option<&'a UploadedFile>,
    pub clear: bool,
    pub too_large: bool,
    pub max_bytes: usize,
}

impl ProfileForm<'_> {
    pub fn clean(&self) -> Result<PictureChange, FormErrors> {
        let mut errors = FormErrors::new();
        if self.too_large {
            errors.add(
                "picture",
                format!("Ensure this file is at most {} bytes.", self.max_bytes),
            );
            return Err(errors);
        }
        let Some(upload) = self.picture else {
            return Ok(if self.clear {
                PictureChange::Clear
            } else {
                PictureChange::Keep
            });
        };

        if self.clear {
            errors.add("picture", CLEAR_AND_UPLOAD);
            return Err(errors);
        }
        if upload.body.is_empty() {
            errors.add("picture", EMPTY_FILE);
            return Err(errors);
        }
        if upload.body.len() > self.max_bytes {
            errors.add(
                "picture",
                format!(
                    "Ensure this file is at most {} bytes (it is {} bytes).",
                    self.max_bytes,
                    upload.body.len()
                ),
            );
            return Err(errors);
        }
        match verify_image(&upload.body) {
            Some(content_type) => Ok(PictureChange::Replace(ValidPicture {
                body: upload.body.clone(),
                content_type,
            })),
            None => {
                errors.add("picture", NOT_AN_IMAGE);
                Err(errors)
            }
        }
    }
}

/// Errors of both halves of the edit page, shown together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditErrors {
    pub user: FormErrors,
    pub profile: FormErrors,
}

impl EditProfileSubmission {
    /// Validates both forms; nothing may be saved unless both pass.
    pub fn clean(&self, max_bytes: usize) -> Result<(String, PictureChange), EditErrors> {
        let email = UserEmailForm { email: &self.email }.clean();
        let picture = ProfileForm {
            picture: self.picture.as_ref(),
            clear: self.clear_picture,
            too_large: self.picture_too_large,
            max_bytes,
        }
        .clean();
        match (email, picture) {
            (Ok(email), Ok(change)) => Ok((email, change)),
            (email, picture) => Err(EditErrors {
                user: email.err().unwrap_or_default(),
                profile: picture.err().unwrap_or_default(),
            }),
        }
    }
}

/// Largest width or height accepted for a profile picture.
pub const MAX_PICTURE_DIMENSION: u32 = 10_000;

/// Content type of an upload that decodes as a supported image; `None` for
/// anything else, including truncated or corrupted files that merely start
/// with an image signature.
pub fn verify_image(body: &[u8]) -> Option<&'static str> {
    let format = image::guess_format(body).ok()?;
    let content_type = match format {
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::Png => "image/png",
        ImageFormat::Gif => "image/gif",
        ImageFormat::WebP => "image/webp",
        _ => return None,
    };

    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_PICTURE_DIMENSION);
    limits.max_image_height = Some(MAX_PICTURE_DIMENSION);
    let mut reader = ImageReader::with_format(Cursor::new(body), format);
    reader.limits(limits);
    match reader.decode() {
        Ok(_) => Some(content_type),
        Err(e) => {
            debug!(error = %e, "upload failed to decode");
            None
        }
    }
}
