use std::collections::HashMap;

use axum::extract::Multipart;

use crate::{error::HttpError, service::verification_service::UploadedFile};

/// Text fields and files of a multipart upload.
#[derive(Debug, Default)]
pub struct MultipartForm {
    pub fields: HashMap<String, String>,
    pub files: HashMap<String, UploadedFile>,
}

impl MultipartForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, HttpError> {
        let mut form = MultipartForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| HttpError::new(e.body_text(), e.status()))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            match field.file_name().map(str::to_string) {
                Some(filename) => {
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| HttpError::new(e.body_text(), e.status()))?;
                    form.files.insert(
                        name,
                        UploadedFile {
                            filename,
                            bytes: bytes.to_vec(),
                        },
                    );
                }
                None => {
                    let value = field
                        .text()
                        .await
                        .map_err(|e| HttpError::new(e.body_text(), e.status()))?;
                    form.fields.insert(name, value);
                }
            }
        }

        Ok(form)
    }

    pub fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    pub fn required_text(&self, name: &str) -> Result<String, HttpError> {
        self.text(name)
            .ok_or_else(|| HttpError::bad_request(format!("{} is required", name)))
    }

    pub fn take_file(&mut self, name: &str) -> Result<UploadedFile, HttpError> {
        self.files
            .remove(name)
            .ok_or_else(|| HttpError::bad_request("No file selected."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_fields_are_trimmed() {
        let mut form = MultipartForm::default();
        form.fields.insert("document_type".into(), "  aadhaar ".into());
        form.fields.insert("document_number".into(), "   ".into());

        assert_eq!(form.text("document_type").as_deref(), Some("aadhaar"));
        assert!(form.text("document_number").is_none());
        assert!(form.required_text("document_number").is_err());
    }

    #[test]
    fn test_missing_file_is_bad_request() {
        let mut form = MultipartForm::default();
        let err = form.take_file("document").unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::BAD_REQUEST);
    }
}
