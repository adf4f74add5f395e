use crate::config::Config;
use crate::confirmation;
use crate::error::BookingError;
use crate::mailer::{MailAttachment, MailSender, OutgoingMail};
use crate::ticket::resolve_ticket_id;
use crate::upload::{PendingUpload, UploadError, UploadStore};
use anyhow::anyhow;
use axum::{
    async_trait,
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
    Form, Json,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

pub const DEFAULT_BRANCH: &str = "Non-MBCET";
pub const DEFAULT_SEMESTER: &str = "N/A";
pub const DEFAULT_EVENT_NAME: &str = "Premam";
pub const DEFAULT_EVENT_DATE: &str = "March 15, 2025";
pub const DEFAULT_EVENT_TIME: &str = "6:00 PM";
pub const DEFAULT_EVENT_VENUE: &str = "MBCET Main Auditorium";

pub const SCREENSHOT_FIELD: &str = "screenshot";
pub const BOOKING_CONFIRMED: &str = "Booking confirmed and confirmation email sent";

/// Raw text fields of a booking submission, as the client sent them.
#[derive(Debug, Default, Clone)]
pub struct BookingForm {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub branch: Option<String>,
    pub semester: Option<String>,
    pub event_name: Option<String>,
    pub event_date: Option<String>,
    pub event_time: Option<String>,
    pub event_venue: Option<String>,
    pub screenshot_url: Option<String>,
    pub ticket_id: Option<String>,
}

impl BookingForm {
    /// Unknown field names are ignored.
    pub fn set(&mut self, field: &str, value: String) {
        let slot = match field {
            "name" => &mut self.name,
            "email" => &mut self.email,
            "phone" => &mut self.phone,
            "branch" => &mut self.branch,
            "semester" => &mut self.semester,
            "eventName" => &mut self.event_name,
            "eventDate" => &mut self.event_date,
            "eventTime" => &mut self.event_time,
            "eventVenue" => &mut self.event_venue,
            "screenshotURL" => &mut self.screenshot_url,
            "ticketId" => &mut self.ticket_id,
            _ => {
                debug!("Ignoring unknown booking field: {}", field);
                return;
            }
        };
        *slot = Some(value);
    }

    fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut form = Self::default();
        for (field, value) in pairs {
            form.set(&field, value);
        }
        form
    }

    // JSON clients may send the phone number as a number
    fn from_json(object: serde_json::Map<String, Value>) -> Self {
        Self::from_pairs(object.into_iter().filter_map(|(field, value)| {
            let value = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return None,
            };
            Some((field, value))
        }))
    }
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// A validated booking. Lives only as long as the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub branch: String,
    pub semester: String,
    pub event_name: String,
    pub event_date: String,
    pub event_time: String,
    pub event_venue: String,
    pub screenshot_url: Option<String>,
    pub ticket_id: Option<String>,
}

impl BookingRequest {
    pub fn new(name: &str, email: &str, phone: &str) -> Self {
        Self {
            name: name.to_string(),
            email: email.to_string(),
            phone: phone.to_string(),
            branch: DEFAULT_BRANCH.to_string(),
            semester: DEFAULT_SEMESTER.to_string(),
            event_name: DEFAULT_EVENT_NAME.to_string(),
            event_date: DEFAULT_EVENT_DATE.to_string(),
            event_time: DEFAULT_EVENT_TIME.to_string(),
            event_venue: DEFAULT_EVENT_VENUE.to_string(),
            screenshot_url: None,
            ticket_id: None,
        }
    }
}

impl TryFrom<BookingForm> for BookingRequest {
    type Error = BookingError;

    fn try_from(form: BookingForm) -> Result<Self, Self::Error> {
        let (Some(name), Some(email), Some(phone)) = (
            present(form.name),
            present(form.email),
            present(form.phone),
        ) else {
            return Err(BookingError::MissingFields);
        };

        let or = |value: Option<String>, default: &str| {
            present(value).unwrap_or_else(|| default.to_string())
        };

        Ok(Self {
            name,
            email,
            phone,
            branch: or(form.branch, DEFAULT_BRANCH),
            semester: or(form.semester, DEFAULT_SEMESTER),
            event_name: or(form.event_name, DEFAULT_EVENT_NAME),
            event_date: or(form.event_date, DEFAULT_EVENT_DATE),
            event_time: or(form.event_time, DEFAULT_EVENT_TIME),
            event_venue: or(form.event_venue, DEFAULT_EVENT_VENUE),
            screenshot_url: present(form.screenshot_url),
            ticket_id: present(form.ticket_id),
        })
    }
}

/// Form fields plus the screenshot, already checked by the upload layer.
#[derive(Debug, Default)]
pub struct BookingSubmission {
    pub form: BookingForm,
    pub screenshot: Option<PendingUpload>,
}

#[async_trait]
impl FromRequest<BookingApp> for BookingSubmission {
    type Rejection = BookingError;

    async fn from_request(req: Request, app: &BookingApp) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(req, app)
                .await
                .map_err(|e| anyhow!("Invalid multipart request: {}", e))?;
            return read_multipart(multipart, app.uploads()).await;
        }

        let form = if content_type.starts_with("application/json") {
            let Json(object) = Json::<serde_json::Map<String, Value>>::from_request(req, app)
                .await
                .map_err(|e| anyhow!("Invalid JSON body: {}", e))?;
            BookingForm::from_json(object)
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(pairs) = Form::<Vec<(String, String)>>::from_request(req, app)
                .await
                .map_err(|e| anyhow!("Invalid form body: {}", e))?;
            BookingForm::from_pairs(pairs)
        } else {
            // no body we understand, validation reports what is missing
            BookingForm::default()
        };

        Ok(Self {
            form,
            screenshot: None,
        })
    }
}

async fn read_multipart(
    mut multipart: Multipart,
    uploads: &UploadStore,
) -> Result<BookingSubmission, BookingError> {
    let mut submission = BookingSubmission::default();
    let mut seen_screenshot = false;

    while let Some(field) = multipart.next_field().await.map_err(UploadError::from)? {
        let name = field.name().unwrap_or_default().to_string();

        if field.file_name().is_some() {
            if name != SCREENSHOT_FIELD || seen_screenshot {
                return Err(UploadError::UnexpectedField(name).into());
            }
            seen_screenshot = true;
            submission.screenshot = uploads.accept(field).await?;
        } else {
            let value = field.text().await.map_err(UploadError::from)?;
            submission.form.set(&name, value);
        }
    }

    Ok(submission)
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BookingConfirmation {
    pub message: String,
    pub ticket_id: String,
}

/// Request state for `/book`: the immutable config and the two collaborators.
#[derive(Clone)]
pub struct BookingApp {
    config: Arc<Config>,
    uploads: UploadStore,
    mailer: Arc<dyn MailSender>,
}

impl BookingApp {
    pub fn new(config: Config, mailer: Arc<dyn MailSender>) -> Self {
        let uploads = UploadStore::new(config.upload_dir.clone(), config.max_upload_bytes);
        Self {
            config: Arc::new(config),
            uploads,
            mailer,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn uploads(&self) -> &UploadStore {
        &self.uploads
    }

    /// Validates, stores the screenshot, then sends exactly one confirmation.
    /// Nothing is undone when the send fails or runs past `mail_timeout`.
    pub async fn handle_new_booking(
        &self,
        submission: BookingSubmission,
    ) -> Result<BookingConfirmation, BookingError> {
        let request = BookingRequest::try_from(submission.form)?;
        let ticket_id = resolve_ticket_id(request.ticket_id.as_deref());

        let stored = match submission.screenshot {
            Some(upload) => Some(self.uploads.store(upload).await?),
            None => None,
        };

        let mail = OutgoingMail {
            from: self.config.smtp.sender().map(str::to_string),
            to: request.email.clone(),
            subject: confirmation::subject(&request, &ticket_id),
            html: confirmation::html_body(&request, &ticket_id, stored.is_some()),
            attachment: stored.map(|s| MailAttachment {
                filename: s.filename,
                path: s.path,
                content_type: s.content_type,
            }),
        };

        let send = self.mailer.send(mail);
        match self.config.mail_timeout {
            Some(limit) => tokio::time::timeout(limit, send)
                .await
                .map_err(|_| anyhow!("Mail send timed out after {}s", limit.as_secs_f32()))??,
            None => send.await?,
        }
        info!("Booking {} confirmed for {}", ticket_id, request.email);

        Ok(BookingConfirmation {
            message: BOOKING_CONFIRMED.to_string(),
            ticket_id,
        })
    }
}
