use std::fs;
use std::time::Duration;

use reqwest::blocking::Client;
use tracing::{debug, info};

use crate::document::ApiDocument;
use crate::error::SourceError;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

pub fn is_url(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

pub fn read(location: &str) -> Result<String, SourceError> {
    if is_url(location) {
        fetch(location)
    } else {
        debug!(path = location, "reading document");
        fs::read_to_string(location).map_err(|source| SourceError::Read {
            path: location.to_string(),
            source,
        })
    }
}

fn fetch(url: &str) -> Result<String, SourceError> {
    info!(url, "fetching document");
    let fetch_err = |source| SourceError::Fetch {
        url: url.to_string(),
        source,
    };

    let client = Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .map_err(fetch_err)?;
    let res = client.get(url).send().map_err(fetch_err)?;
    let status = res.status();
    if !status.is_success() {
        return Err(SourceError::HttpStatus {
            url: url.to_string(),
            status,
        });
    }
    res.text().map_err(fetch_err)
}

pub fn load(location: &str) -> Result<ApiDocument, SourceError> {
    let text = read(location)?;
    ApiDocument::parse(&text).map_err(|source| SourceError::Invalid {
        location: location.to_string(),
        source,
    })
}
