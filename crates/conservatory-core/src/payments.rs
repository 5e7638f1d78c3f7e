//! Recording payments and uploading template images.

use anyhow::{bail, Result};
use chrono::NaiveDate;
use tracing::info;
use uuid::Uuid;

use crate::backend::Backend;
use crate::format::format_currency;
use crate::models::{ActivityKind, NewActivity, PaymentSchedule, PaymentStatus};
use crate::repo::{ActivityRepo, EmailTemplateRepo, PaymentScheduleRepo};

pub const TEMPLATE_IMAGE_BUCKET: &str = "template-images";

/// Largest accepted template image (5 MiB).
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Mark a schedule paid on `paid_on` and log it.
pub async fn record_payment(
    backend: &dyn Backend,
    schedule_id: &str,
    paid_on: NaiveDate,
) -> Result<PaymentSchedule> {
    let payments = PaymentScheduleRepo::new(backend);
    let schedule = payments.get(schedule_id).await?;
    if schedule.status == PaymentStatus::Paid {
        bail!(
            "{} was already recorded as paid{}",
            schedule.label(),
            schedule
                .paid_date
                .map(|d| format!(" on {}", d))
                .unwrap_or_default()
        );
    }

    let paid = payments.mark_paid(schedule_id, paid_on).await?;

    let mut activity = NewActivity::new(
        ActivityKind::PaymentRecorded,
        format!("{} received: {}", format_currency(paid.amount), paid.label()),
    )
    .meta("schedule_id", paid.id.as_str())
    .meta("paid_date", paid_on.to_string());
    if let Some(student_id) = paid.student_id.as_deref() {
        activity = activity.student(student_id);
    }
    if let Some(contract_id) = paid.contract_id.as_deref() {
        activity = activity.contract(contract_id);
    }
    ActivityRepo::new(backend).log(&activity).await?;

    info!(schedule_id = %paid.id, amount = paid.amount, "Payment recorded");
    Ok(paid)
}

fn content_type_for(file_name: &str) -> Option<&'static str> {
    let ext = file_name.rsplit_once('.')?.1.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "svg" => Some("image/svg+xml"),
        _ => None,
    }
}

/// Object path for an upload: a fresh uuid plus the file name reduced to
/// `[A-Za-z0-9._-]`.
pub fn object_path(file_name: &str) -> String {
    let clean: String = file_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '-'
            }
        })
        .collect();
    format!("{}-{}", Uuid::new_v4(), clean)
}

/// Upload an image for use in email templates and return its public URL.
/// When `email_template_id` is given the template's image is set too.
pub async fn upload_template_image(
    backend: &dyn Backend,
    bucket: &str,
    file_name: &str,
    bytes: Vec<u8>,
    email_template_id: Option<&str>,
) -> Result<String> {
    let Some(content_type) = content_type_for(file_name) else {
        bail!("'{}' is not a supported image type", file_name);
    };
    if bytes.is_empty() {
        bail!("'{}' is empty", file_name);
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        bail!(
            "'{}' is {} bytes; the limit is {} bytes",
            file_name,
            bytes.len(),
            MAX_IMAGE_BYTES
        );
    }

    let path = object_path(file_name);
    let size = bytes.len();
    let url = backend.upload(bucket, &path, bytes, content_type).await?;

    if let Some(template_id) = email_template_id {
        EmailTemplateRepo::new(backend)
            .set_image_url(template_id, &url)
            .await?;
    }

    ActivityRepo::new(backend)
        .log(
            &NewActivity::new(
                ActivityKind::TemplateImageUploaded,
                format!("Image {} uploaded", file_name),
            )
            .meta("url", url.as_str())
            .meta("size", size),
        )
        .await?;

    info!(bucket = bucket, path = %path, size = size, "Template image uploaded");
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{tables, InMemoryBackend};
    use crate::testing::schedule_row;
    use serde_json::json;

    #[tokio::test]
    async fn test_record_payment() {
        let backend = InMemoryBackend::new();
        backend.seed(
            tables::PAYMENT_SCHEDULES,
            [schedule_row("pay1", "s1", 450.0, "2026-10-01", "overdue")],
        );
        let paid_on = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();

        let paid = record_payment(&backend, "pay1", paid_on).await.unwrap();
        assert_eq!(paid.status, PaymentStatus::Paid);
        assert_eq!(paid.paid_date, Some(paid_on));

        let activities = backend.rows(tables::ACTIVITIES);
        assert_eq!(activities[0]["kind"], json!("payment_recorded"));
        assert_eq!(activities[0]["student_id"], json!("s1"));

        let again = record_payment(&backend, "pay1", paid_on).await.unwrap_err();
        assert!(again.to_string().contains("already recorded"));
    }

    #[test]
    fn test_object_path_sanitized() {
        let path = object_path("Spring Recital (final).PNG");
        assert!(path.ends_with("-Spring-Recital--final-.PNG"));
        assert_eq!(content_type_for("a.PNG"), Some("image/png"));
        assert_eq!(content_type_for("notes.txt"), None);
        assert_eq!(content_type_for("noext"), None);
    }

    #[tokio::test]
    async fn test_upload_template_image() {
        let backend = InMemoryBackend::new();
        backend.seed(
            tables::EMAIL_TEMPLATES,
            [json!({
                "id": "e1",
                "name": "Newsletter",
                "subject": "News",
                "body": "<p>Hi</p>",
                "category": null,
                "image_url": null,
                "created_at": "2026-01-01T00:00:00Z"
            })],
        );

        let url = upload_template_image(
            &backend,
            TEMPLATE_IMAGE_BUCKET,
            "logo.png",
            vec![0x89, b'P', b'N', b'G'],
            Some("e1"),
        )
        .await
        .unwrap();
        assert!(url.starts_with("memory://storage/template-images/"));
        assert!(url.ends_with("-logo.png"));
        assert_eq!(backend.rows(tables::EMAIL_TEMPLATES)[0]["image_url"], json!(url));
        assert_eq!(backend.rows(tables::ACTIVITIES).len(), 1);

        let err = upload_template_image(&backend, TEMPLATE_IMAGE_BUCKET, "doc.pdf", vec![1], None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not a supported image type"));
    }
}
