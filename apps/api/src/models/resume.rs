use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::extract::{MIME_DOCX, MIME_PDF, MIME_TEXT};

/// An uploaded candidate document. Either `text_content` holds the text
/// inline, or the bytes live in the blob store under `object_key`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResumeRow {
    pub id: Uuid,
    pub session_id: Uuid,
    pub file_name: String,
    pub object_key: Option<String>,
    pub text_content: Option<String>,
    pub mime_type: String,
    pub upload_status: String,
    pub created_at: DateTime<Utc>,
}

impl ResumeRow {
    /// Blob-store key for this resume: the stored key when present,
    /// otherwise `sessions/{session_id}/{file_name or "resume.{ext}"}`.
    pub fn storage_key(&self) -> String {
        if let Some(key) = self.object_key.as_deref().filter(|k| !k.is_empty()) {
            return key.to_string();
        }
        let file_name = if self.file_name.trim().is_empty() {
            format!("resume.{}", extension_for_mime(&self.mime_type))
        } else {
            self.file_name.clone()
        };
        format!("sessions/{}/{}", self.session_id, file_name)
    }
}

fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type {
        MIME_PDF => "pdf",
        MIME_DOCX => "docx",
        MIME_TEXT => "txt",
        _ => "bin",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resume(file_name: &str, object_key: Option<&str>, mime_type: &str) -> ResumeRow {
        ResumeRow {
            id: Uuid::new_v4(),
            session_id: Uuid::nil(),
            file_name: file_name.to_string(),
            object_key: object_key.map(String::from),
            text_content: None,
            mime_type: mime_type.to_string(),
            upload_status: "uploaded".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_storage_key_prefers_stored_key() {
        let r = resume("cv.pdf", Some("custom/key.pdf"), MIME_PDF);
        assert_eq!(r.storage_key(), "custom/key.pdf");
    }

    #[test]
    fn test_storage_key_uses_file_name() {
        let r = resume("jane-doe.pdf", None, MIME_PDF);
        assert_eq!(
            r.storage_key(),
            "sessions/00000000-0000-0000-0000-000000000000/jane-doe.pdf"
        );
    }

    #[test]
    fn test_storage_key_falls_back_to_mime_extension() {
        let r = resume("", None, MIME_DOCX);
        assert!(r.storage_key().ends_with("/resume.docx"));
        let r = resume(" ", Some(""), "image/png");
        assert!(r.storage_key().ends_with("/resume.bin"));
    }
}
