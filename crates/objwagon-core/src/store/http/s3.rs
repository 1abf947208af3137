//! Amazon S3 REST backend (path-style addressing).
//!
//! Requests carry an optional static bearer token only; signing is left to a
//! fronting proxy or a public/pre-authorized bucket.

use super::{parse_endpoint, url_with_segments, Body, Exchange, HttpSettings, Method};
use crate::store::{
    BackendKind, ListEntry, MetadataField, ObjectMetadata, ObjectStore, ProviderError, StoreError,
};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Read, Write};
use url::Url;

/// Public S3 endpoint.
pub const S3_ENDPOINT: &str = "https://s3.amazonaws.com";

/// Bucket on S3 (or an S3-compatible service).
#[derive(Debug, Clone)]
pub struct S3Store {
    endpoint: Url,
    bucket: String,
    http: HttpSettings,
}

/// One page of a ListObjectsV2 response.
#[derive(Debug, Default, PartialEq, Eq)]
struct ListPage {
    keys: Vec<String>,
    prefixes: Vec<String>,
    next_token: Option<String>,
}

impl S3Store {
    pub fn new(endpoint: &str, bucket: &str, bearer_token: Option<String>) -> anyhow::Result<Self> {
        Ok(Self {
            endpoint: parse_endpoint(endpoint)?,
            bucket: bucket.to_string(),
            http: HttpSettings::new(BackendKind::S3, bearer_token),
        })
    }

    fn object_url(&self, key: &str) -> Result<Url, StoreError> {
        let segments = std::iter::once(self.bucket.as_str()).chain(key.split('/'));
        url_with_segments(BackendKind::S3, &self.endpoint, segments)
    }

    fn bucket_url(&self) -> Result<Url, StoreError> {
        url_with_segments(BackendKind::S3, &self.endpoint, [self.bucket.as_str(), ""])
    }
}

/// Provider error for a non-2xx exchange, using `<Code>`/`<Message>` from the XML body.
fn status_error(ex: &Exchange) -> ProviderError {
    let status = u16::try_from(ex.status).ok();
    let code = xml_text(&ex.error_body, "Code");
    let message = xml_text(&ex.error_body, "Message").unwrap_or_else(|| format!("HTTP {}", ex.status));
    let err = ProviderError::new(BackendKind::S3, status, message);
    match code {
        Some(c) => err.with_code(c),
        None => err,
    }
}

/// Text of the first element named `tag`, if the body is XML containing one.
fn xml_text(body: &[u8], tag: &str) -> Option<String> {
    let mut reader = Reader::from_reader(body);
    let mut buf = Vec::new();
    let mut inside = false;
    loop {
        match reader.read_event_into(&mut buf).ok()? {
            Event::Start(e) if e.local_name().as_ref() == tag.as_bytes() => inside = true,
            Event::Text(t) if inside => return t.unescape().ok().map(|s| s.into_owned()),
            Event::End(_) if inside => return Some(String::new()),
            Event::Eof => return None,
            _ => {}
        }
        buf.clear();
    }
}

fn parse_list_page(body: &[u8]) -> Result<ListPage, quick_xml::Error> {
    #[derive(Clone, Copy, PartialEq)]
    enum Field {
        None,
        Key,
        Prefix,
        Truncated,
        Token,
    }

    let mut reader = Reader::from_reader(body);
    let mut buf = Vec::new();
    let mut page = ListPage::default();
    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut field = Field::None;
    let mut truncated = false;
    let mut token = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let name = e.local_name().as_ref().to_vec();
                let parent = path.last().map(Vec::as_slice);
                field = match (parent, name.as_slice()) {
                    (Some(b"Contents"), b"Key") => Field::Key,
                    (Some(b"CommonPrefixes"), b"Prefix") => Field::Prefix,
                    (Some(b"ListBucketResult"), b"IsTruncated") => Field::Truncated,
                    (Some(b"ListBucketResult"), b"NextContinuationToken") => Field::Token,
                    _ => Field::None,
                };
                path.push(name);
            }
            Event::Text(t) if field != Field::None => {
                let text = t.unescape()?.into_owned();
                match field {
                    Field::Key => page.keys.push(text),
                    Field::Prefix => page.prefixes.push(text),
                    Field::Truncated => truncated = text.trim() == "true",
                    Field::Token => token = Some(text),
                    Field::None => {}
                }
            }
            Event::End(_) => {
                path.pop();
                field = Field::None;
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    if truncated {
        page.next_token = token;
    }
    Ok(page)
}

fn parse_http_date_ms(s: &str) -> Option<i64> {
    chrono::DateTime::parse_from_rfc2822(s)
        .ok()
        .map(|t| t.timestamp_millis())
}

impl ObjectStore for S3Store {
    fn kind(&self) -> BackendKind {
        BackendKind::S3
    }

    fn metadata(
        &self,
        key: &str,
        _fields: &[MetadataField],
    ) -> Result<Option<ObjectMetadata>, StoreError> {
        let url = self.object_url(key)?;
        let ex = self
            .http
            .perform(Method::Head, &url, &[], None, &mut std::io::sink())?;
        if ex.status == 404 {
            return Ok(None);
        }
        if !ex.is_success() {
            return Err(status_error(&ex).into());
        }
        Ok(Some(ObjectMetadata {
            size: ex.header("Content-Length").and_then(|v| v.parse().ok()),
            updated_ms: ex.header("Last-Modified").and_then(parse_http_date_ms),
            content_type: ex.header("Content-Type").map(str::to_string),
        }))
    }

    fn list(&self, prefix: &str) -> Result<Vec<ListEntry>, StoreError> {
        let mut entries = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let mut url = self.bucket_url()?;
            {
                let mut q = url.query_pairs_mut();
                q.append_pair("list-type", "2")
                    .append_pair("prefix", prefix)
                    .append_pair("delimiter", "/");
                if let Some(t) = &token {
                    q.append_pair("continuation-token", t);
                }
            }
            let mut body = Vec::new();
            let ex = self.http.perform(Method::Get, &url, &[], None, &mut body)?;
            if !ex.is_success() {
                return Err(status_error(&ex).into());
            }
            let page = parse_list_page(&body).map_err(|e| {
                ProviderError::new(BackendKind::S3, Some(ex.status as u16), format!("malformed listing: {}", e))
            })?;
            entries.extend(
                page.keys
                    .into_iter()
                    .filter(|k| k != prefix)
                    .map(ListEntry::Object),
            );
            entries.extend(page.prefixes.into_iter().map(ListEntry::Prefix));
            match page.next_token {
                Some(t) => token = Some(t),
                None => break,
            }
        }
        Ok(entries)
    }

    fn download(&self, key: &str, sink: &mut dyn Write) -> Result<(), StoreError> {
        let url = self.object_url(key)?;
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
        let url = self.object_url(key)?;
        let body = Body {
            source,
            size,
            content_type,
        };
        let ex = self
            .http
            .perform(Method::Put, &url, &[], Some(body), &mut std::io::sink())?;
        if !ex.is_success() {
            return Err(status_error(&ex).into());
        }
        Ok(())
    }
}
