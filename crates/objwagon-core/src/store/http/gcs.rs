//! Google Cloud Storage JSON API backend.

use super::{parse_endpoint, url_with_segments, Body, Exchange, HttpSettings, Method};
use crate::store::{
    BackendKind, ListEntry, MetadataField, ObjectMetadata, ObjectStore, ProviderError, StoreError,
};
use serde::Deserialize;
use std::io::{Read, Write};
use url::Url;

/// Public GCS endpoint.
pub const GCS_ENDPOINT: &str = "https://storage.googleapis.com";

#[derive(Debug, Deserialize)]
struct GcsObject {
    name: Option<String>,
    /// JSON API reports sizes as decimal strings.
    size: Option<String>,
    updated: Option<String>,
    #[serde(rename = "contentType")]
    content_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct GcsListPage {
    #[serde(default)]
    items: Vec<GcsObject>,
    #[serde(default)]
    prefixes: Vec<String>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GcsErrorBody {
    error: GcsErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GcsErrorDetail {
    message: Option<String>,
    #[serde(default)]
    errors: Vec<GcsErrorReason>,
}

#[derive(Debug, Deserialize)]
struct GcsErrorReason {
    reason: Option<String>,
}

/// Bucket on Google Cloud Storage, addressed through the JSON API.
#[derive(Debug, Clone)]
pub struct GcsStore {
    endpoint: Url,
    bucket: String,
    http: HttpSettings,
}

impl GcsStore {
    /// `endpoint` is usually [`GCS_ENDPOINT`]; `bearer_token` is an OAuth access token, if any.
    pub fn new(endpoint: &str, bucket: &str, bearer_token: Option<String>) -> anyhow::Result<Self> {
        Ok(Self {
            endpoint: parse_endpoint(endpoint)?,
            bucket: bucket.to_string(),
            http: HttpSettings::new(BackendKind::Gcs, bearer_token),
        })
    }

    fn object_url(&self, key: &str) -> Result<Url, StoreError> {
        url_with_segments(
            BackendKind::Gcs,
            &self.endpoint,
            ["storage", "v1", "b", self.bucket.as_str(), "o", key],
        )
    }

    fn objects_url(&self) -> Result<Url, StoreError> {
        url_with_segments(
            BackendKind::Gcs,
            &self.endpoint,
            ["storage", "v1", "b", self.bucket.as_str(), "o"],
        )
    }

    fn upload_url(&self, key: &str) -> Result<Url, StoreError> {
        let mut url = url_with_segments(
            BackendKind::Gcs,
            &self.endpoint,
            ["upload", "storage", "v1", "b", self.bucket.as_str(), "o"],
        )?;
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", key);
        Ok(url)
    }

    fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &Url) -> Result<(Exchange, Option<T>), StoreError> {
        let mut body = Vec::new();
        let ex = self.http.perform(Method::Get, url, &[], None, &mut body)?;
        if !ex.is_success() {
            return Ok((ex, None));
        }
        let parsed = serde_json::from_slice(&body).map_err(|e| {
            ProviderError::new(BackendKind::Gcs, Some(ex.status as u16), format!("malformed JSON response: {}", e))
        })?;
        Ok((ex, Some(parsed)))
    }
}

/// Provider error for a non-2xx exchange, with the JSON error message and reason when present.
fn status_error(ex: &Exchange) -> ProviderError {
    let status = u16::try_from(ex.status).ok();
    let parsed: Option<GcsErrorBody> = serde_json::from_slice(&ex.error_body).ok();
    let message = parsed
        .as_ref()
        .and_then(|b| b.error.message.clone())
        .unwrap_or_else(|| format!("HTTP {}", ex.status));
    let reason = parsed.and_then(|b| b.error.errors.into_iter().find_map(|r| r.reason));
    let err = ProviderError::new(BackendKind::Gcs, status, message);
    match reason {
        Some(r) => err.with_code(r),
        None => err,
    }
}

fn field_names(fields: &[MetadataField]) -> String {
    let mut names = vec!["name"];
    for f in fields {
        names.push(match f {
            MetadataField::Size => "size",
            MetadataField::Updated => "updated",
            MetadataField::ContentType => "contentType",
        });
    }
    names.join(",")
}

fn parse_rfc3339_ms(s: &str) -> Option<i64> {
    chrono::DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|t| t.timestamp_millis())
}

impl ObjectStore for GcsStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Gcs
    }

    fn metadata(
        &self,
        key: &str,
        fields: &[MetadataField],
    ) -> Result<Option<ObjectMetadata>, StoreError> {
        let mut url = self.object_url(key)?;
        url.query_pairs_mut().append_pair("fields", &field_names(fields));
        let (ex, obj) = self.get_json::<GcsObject>(&url)?;
        if ex.status == 404 {
            return Ok(None);
        }
        let Some(obj) = obj else {
            return Err(status_error(&ex).into());
        };
        Ok(Some(ObjectMetadata {
            size: obj.size.and_then(|s| s.parse().ok()),
            updated_ms: obj.updated.as_deref().and_then(parse_rfc3339_ms),
            content_type: obj.content_type,
        }))
    }

    fn list(&self, prefix: &str) -> Result<Vec<ListEntry>, StoreError> {
        let mut entries = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut url = self.objects_url()?;
            {
                let mut q = url.query_pairs_mut();
                q.append_pair("prefix", prefix).append_pair("delimiter", "/");
                if let Some(token) = &page_token {
                    q.append_pair("pageToken", token);
                }
            }
            let (ex, page) = self.get_json::<GcsListPage>(&url)?;
            let Some(page) = page else {
                return Err(status_error(&ex).into());
            };
            entries.extend(
                page.items
                    .into_iter()
                    .filter_map(|o| o.name)
                    .filter(|n| n != prefix)
                    .map(ListEntry::Object),
            );
            entries.extend(page.prefixes.into_iter().map(ListEntry::Prefix));
            match page.next_page_token {
                Some(t) if !t.is_empty() => page_token = Some(t),
                _ => break,
            }
        }
        Ok(entries)
    }

    fn download(&self, key: &str, sink: &mut dyn Write) -> Result<(), StoreError> {
        let mut url = self.object_url(key)?;
        url.query_pairs_mut().append_pair("alt", "media");
        let ex = self.http.perform(Method::Get, &url, &[], None, sink)?;
        if !ex.is_success() {
            return Err(status_error(&ex).into());
        }
        Ok(())
    }

    fn upload(
        &self,
        key: &str,
        content_type: &str,
        source: &mut dyn Read,
        size: u64,
    ) -> Result<(), StoreError> {
        let url = self.upload_url(key)?;
        let body = Body {
            source,
            size,
            content_type,
        };
        // The response is the new object's metadata; it is not needed.
        let ex = self
            .http
            .perform(Method::Post, &url, &[], Some(body), &mut std::io::sink())?;
        if !ex.is_success() {
            return Err(status_error(&ex).into());
        }
        Ok(())
    }
}
