use std::collections::HashMap;

use axum::extract::Multipart;
use serde::de::DeserializeOwned;

use crate::error::ApiError;
use crate::uploads::{MAX_UPLOAD_BYTES, Storage, StoredFile};

/// A fully-read multipart form: text fields plus any files already
/// validated and written to disk. Handlers pull typed values out of it
/// field by field, so only explicitly-named fields can reach the database.
pub struct FormData {
    fields: HashMap<String, String>,
    files: Vec<StoredFile>,
}

/// Drain a multipart request. Parts carrying a filename are routed
/// through `Storage` (field-based destination, MIME allow-list, size
/// cap); everything else is kept as a text field.
pub async fn collect(mut multipart: Multipart, storage: &Storage) -> Result<FormData, ApiError> {
    let mut fields = HashMap::new();
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation(format!("Malformed multipart body: {e}")))?
    {
        let name = field
            .name()
            .ok_or_else(|| ApiError::validation("Multipart field without a name"))?
            .to_string();

        if let Some(file_name) = field.file_name().map(str::to_string) {
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::validation(format!("Failed to read file {name}: {e}")))?;
            if data.len() > MAX_UPLOAD_BYTES {
                return Err(ApiError::validation(format!(
                    "File too large for field {name} (limit 10MB)"
                )));
            }
            files.push(storage.store(&name, &file_name, &content_type, &data).await?);
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| ApiError::validation(format!("Failed to read field {name}: {e}")))?;
            fields.insert(name, value);
        }
    }

    Ok(FormData { fields, files })
}

impl FormData {
    /// Required text field; empty counts as missing.
    pub fn text(&self, name: &str) -> Result<&str, ApiError> {
        self.opt_text(name)
            .ok_or_else(|| ApiError::validation(format!("{name} is required")))
    }

    pub fn opt_text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn f64(&self, name: &str) -> Result<f64, ApiError> {
        self.opt_f64(name)?
            .ok_or_else(|| ApiError::validation(format!("{name} is required")))
    }

    pub fn opt_f64(&self, name: &str) -> Result<Option<f64>, ApiError> {
        self.opt_text(name)
            .map(|v| {
                v.parse()
                    .map_err(|_| ApiError::validation(format!("{name} must be a number")))
            })
            .transpose()
    }

    pub fn opt_u32(&self, name: &str) -> Result<Option<u32>, ApiError> {
        self.opt_text(name)
            .map(|v| {
                v.parse()
                    .map_err(|_| ApiError::validation(format!("{name} must be a whole number")))
            })
            .transpose()
    }

    /// Structured field submitted as a JSON string (arrays, locations).
    pub fn opt_json<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, ApiError> {
        self.opt_text(name)
            .map(|v| {
                serde_json::from_str(v)
                    .map_err(|e| ApiError::validation(format!("{name} is malformed: {e}")))
            })
            .transpose()
    }

    /// Typed enum field, parsed by the caller-supplied parser.
    pub fn opt_enum<T>(
        &self,
        name: &str,
        parse: impl Fn(&str) -> Option<T>,
    ) -> Result<Option<T>, ApiError> {
        self.opt_text(name)
            .map(|v| parse(v).ok_or_else(|| ApiError::validation(format!("{name} is not a valid value"))))
            .transpose()
    }

    pub fn required_enum<T>(
        &self,
        name: &str,
        parse: impl Fn(&str) -> Option<T>,
    ) -> Result<T, ApiError> {
        self.opt_enum(name, parse)?
            .ok_or_else(|| ApiError::validation(format!("{name} is required")))
    }

    /// First uploaded file for a form field, if any.
    pub fn file(&self, field_name: &str) -> Option<&StoredFile> {
        self.files.iter().find(|f| f.field == field_name)
    }

    /// All uploaded files for a form field (KYC document batches).
    pub fn files(&self, field_name: &str) -> Vec<&StoredFile> {
        self.files.iter().filter(|f| f.field == field_name).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(entries: &[(&str, &str)]) -> FormData {
        FormData {
            fields: entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            files: vec![],
        }
    }

    #[test]
    fn required_text_rejects_blank() {
        let f = form(&[("title", "  "), ("author", "Cormen")]);
        assert!(f.text("title").is_err());
        assert_eq!(f.text("author").unwrap(), "Cormen");
    }

    #[test]
    fn numbers_and_enums_parse() {
        use bookshare_types::models::Condition;

        let f = form(&[("price", "450"), ("condition", "like-new"), ("stock", "3")]);
        assert_eq!(f.f64("price").unwrap(), 450.0);
        assert_eq!(f.opt_u32("stock").unwrap(), Some(3));
        assert_eq!(
            f.required_enum("condition", Condition::parse).unwrap(),
            Condition::LikeNew
        );

        let bad = form(&[("price", "lots")]);
        assert!(bad.f64("price").is_err());
    }

    #[test]
    fn json_fields_deserialize() {
        let f = form(&[("tags", r#"["JEE","Physics"]"#)]);
        let tags: Vec<String> = f.opt_json("tags").unwrap().unwrap();
        assert_eq!(tags, vec!["JEE", "Physics"]);

        let broken = form(&[("tags", "not-json")]);
        assert!(broken.opt_json::<Vec<String>>("tags").is_err());
    }
}
