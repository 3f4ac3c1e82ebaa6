use std::collections::HashMap;

use anyhow::Context;
use axum::extract::Multipart;
use bytes::Bytes;
use futures::future::try_join_all;
use rand::Rng;
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::{
    error::{AppError, Result},
    state::AppState,
};

pub const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

pub struct UploadItem {
    pub file_name: String,
    pub content_type: String,
    pub body: Bytes,
}

/// A parsed multipart body: text fields plus files grouped by field name.
#[derive(Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: HashMap<String, Vec<UploadItem>>,
}

impl MultipartForm {
    /// Reads the whole body. `file_limits` lists the accepted file fields and
    /// how many files each may carry; files in other fields are dropped.
    pub async fn read(mut mp: Multipart, file_limits: &[(&str, usize)]) -> Result<Self> {
        let mut form = MultipartForm::default();
        while let Some(field) = mp.next_field().await? {
            let Some(name) = field.name().map(|s| s.trim_end_matches("[]").to_string()) else {
                continue;
            };

            if let Some(file_name) = field.file_name().map(|s| s.to_string()) {
                let Some(&(_, max)) = file_limits.iter().find(|(n, _)| *n == name) else {
                    warn!(field = %name, "ignoring unexpected file field");
                    continue;
                };
                let content_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "application/octet-stream".into());
                let body = field.bytes().await?;
                let slot = form.files.entry(name.clone()).or_default();
                if slot.len() >= max {
                    return Err(AppError::bad_request(format!(
                        "at most {} file(s) allowed in field {}",
                        max, name
                    )));
                }
                slot.push(UploadItem {
                    file_name,
                    content_type,
                    body,
                });
            } else {
                let value = field.text().await?;
                form.fields.insert(name, value);
            }
        }
        Ok(form)
    }

    /// Trimmed text value; blank counts as absent.
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    pub fn take_files(&mut self, name: &str) -> Vec<UploadItem> {
        self.files.remove(name).unwrap_or_default()
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadItem> {
        self.take_files(name).into_iter().next()
    }
}

/// Keeps `[A-Za-z0-9._-]`, everything else becomes `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim_matches('.').is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

pub fn object_key(prefix: &str, file_name: &str, at: OffsetDateTime) -> String {
    let millis = at.unix_timestamp_nanos() / 1_000_000;
    let nonce: u32 = rand::thread_rng().gen();
    format!(
        "{}/{}_{:08x}_{}",
        prefix.trim_end_matches('/'),
        millis,
        nonce,
        sanitize_file_name(file_name)
    )
}

pub fn public_url(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key)
}

/// Object key behind a public URL, if the URL points into our bucket.
pub fn key_from_url<'a>(base: &str, url: &'a str) -> Option<&'a str> {
    url.strip_prefix(base.trim_end_matches('/'))
        .and_then(|rest| rest.strip_prefix('/'))
        .filter(|key| !key.is_empty())
}

/// Uploads one file under `prefix` and returns its public URL.
pub async fn upload(st: &AppState, prefix: &str, item: UploadItem) -> anyhow::Result<String> {
    let key = object_key(prefix, &item.file_name, OffsetDateTime::now_utc());
    st.storage
        .put_object(&key, item.body, &item.content_type)
        .await
        .with_context(|| format!("upload {}", key))?;
    debug!(key = %key, "object uploaded");
    Ok(public_url(&st.config.storage.public_url, &key))
}

/// Uploads concurrently. URLs come back in input order. On the first failure
/// the whole batch fails; objects already written stay in the bucket.
pub async fn upload_all(
    st: &AppState,
    prefix: &str,
    items: Vec<UploadItem>,
) -> anyhow::Result<Vec<String>> {
    try_join_all(items.into_iter().map(|item| upload(st, prefix, item))).await
}

/// Deletes the object behind `url`. Failures are logged, never returned.
pub async fn remove_best_effort(st: &AppState, url: &str) {
    let Some(key) = key_from_url(&st.config.storage.public_url, url) else {
        warn!(url = %url, "url does not point into the bucket; skipping delete");
        return;
    };
    match st.storage.delete_object(key).await {
        Ok(()) => debug!(key = %key, "object deleted"),
        Err(e) => warn!(error = ?e, key = %key, "failed to delete object"),
    }
}

pub async fn remove_all_best_effort(st: &AppState, urls: &[String]) {
    futures::future::join_all(urls.iter().map(|url| remove_best_effort(st, url))).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn sanitizes_names() {
        assert_eq!(sanitize_file_name("front view (1).JPG"), "front_view__1_.JPG");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\pics\\a.png"), "a.png");
        assert_eq!(sanitize_file_name(".."), "file");
    }

    #[test]
    fn object_key_is_prefix_timestamp_and_name() {
        let at = datetime!(2024-05-01 12:00:00 UTC);
        let key = object_key("projects/thumbnails/", "roof.png", at);
        let millis = at.unix_timestamp() * 1000;
        assert!(key.starts_with(&format!("projects/thumbnails/{}_", millis)));
        assert!(key.ends_with("_roof.png"));

        let nonce = key
            .strip_prefix(&format!("projects/thumbnails/{}_", millis))
            .and_then(|rest| rest.strip_suffix("_roof.png"))
            .unwrap();
        assert_eq!(nonce.len(), 8);
        assert!(nonce.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn url_and_key_roundtrip() {
        let base = "https://cdn.example.com/bucket/";
        let url = public_url(base, "services/icons/1_a.svg");
        assert_eq!(url, "https://cdn.example.com/bucket/services/icons/1_a.svg");
        assert_eq!(key_from_url(base, &url), Some("services/icons/1_a.svg"));
        assert_eq!(key_from_url(base, "https://elsewhere.com/x.png"), None);
        assert_eq!(key_from_url(base, "https://cdn.example.com/bucket/"), None);
    }

    #[tokio::test]
    async fn upload_all_keeps_input_order() {
        let state = AppState::fake();
        let items = ["a.png", "b.png", "c.png"]
            .into_iter()
            .map(|n| UploadItem {
                file_name: n.into(),
                content_type: "image/png".into(),
                body: Bytes::from_static(b"x"),
            })
            .collect();
        let urls = upload_all(&state, "projects/gallery", items).await.unwrap();
        assert_eq!(urls.len(), 3);
        assert!(urls[0].ends_with("_a.png"));
        assert!(urls[1].ends_with("_b.png"));
        assert!(urls[2].ends_with("_c.png"));
        assert_eq!(state.fake_storage().stored_keys().len(), 3);
    }

    #[tokio::test]
    async fn remove_swallows_storage_errors() {
        let state = AppState::fake();
        state.fake_storage().fail_deletes();
        remove_best_effort(&state, "https://fake.local/bucket/projects/x.png").await;
        assert_eq!(state.fake_storage().deleted_keys(), vec!["projects/x.png".to_string()]);
    }
}
