//! Parsing of the blob service's XML listing responses.
//!
//! The listing endpoint returns an `EnumerationResults` document. Only
//! the fields the portal surfaces are pulled out; everything else is
//! skipped without error so new service fields cannot break us.

use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::storage::types::BlobItem;

/// One page of a container listing.
#[derive(Debug, Default)]
pub struct ListingPage {
    pub blobs: Vec<BlobItem>,
    /// Continuation marker; present when the listing was truncated.
    pub next_marker: Option<String>,
}

/// Parse one `EnumerationResults` document.
pub(crate) fn parse_list_response(xml: &str) -> Result<ListingPage, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut page = ListingPage::default();
    let mut current: Option<BlobItem> = None;
    // Element path as local names, so text events know where they are.
    let mut path: Vec<String> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
                if name == "Blob" {
                    current = Some(BlobItem {
                        name: String::new(),
                        size: 0,
                        content_type: None,
                        last_modified: None,
                        etag: None,
                    });
                }
                path.push(name);
            }
            Event::End(end) => {
                let name = String::from_utf8_lossy(end.local_name().as_ref()).into_owned();
                if name == "Blob" {
                    if let Some(blob) = current.take() {
                        if !blob.name.is_empty() {
                            page.blobs.push(blob);
                        }
                    }
                }
                path.pop();
            }
            Event::Text(text) => {
                let value = text.unescape()?.into_owned();
                let element = path.last().map(String::as_str).unwrap_or("");
                match &mut current {
                    Some(blob) => apply_blob_field(blob, element, value),
                    None => {
                        if element == "NextMarker" && !value.is_empty() {
                            page.next_marker = Some(value);
                        }
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(page)
}

fn apply_blob_field(blob: &mut BlobItem, element: &str, value: String) {
    match element {
        "Name" => blob.name = value,
        "Content-Length" => blob.size = value.parse().unwrap_or(0),
        "Content-Type" => {
            if !value.is_empty() {
                blob.content_type = Some(value);
            }
        }
        "Last-Modified" => {
            blob.last_modified = DateTime::parse_from_rfc2822(&value)
                .ok()
                .map(|t| t.with_timezone(&Utc));
        }
        "Etag" => blob.etag = Some(value),
        _ => {}
    }
}
