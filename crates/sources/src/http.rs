//! Generic HTTP source adapter.
//!
//! Issues `GET {endpoint}?q={keywords}` and maps whatever comes back into
//! [`RawJob`]s. Providers disagree wildly on envelope and field names, so
//! parsing is deliberately lenient: records it cannot salvage a URL from
//! are skipped, not fatal.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use jobscout_core::RawJob;

use crate::adapter::SourceAdapter;
use crate::error::SourceError;

/// Envelope keys under which providers nest their result arrays.
const ENVELOPE_KEYS: &[&str] = &["jobs", "results", "data", "items"];

const TITLE_KEYS: &[&str] = &["title", "job_title", "position", "name"];
const COMPANY_KEYS: &[&str] = &["company", "company_name", "employer"];
const URL_KEYS: &[&str] = &["url", "link", "job_url", "redirect_url"];
const LOCATION_KEYS: &[&str] = &["location", "job_location", "place"];
const DESCRIPTION_KEYS: &[&str] = &["description", "snippet", "summary"];

/// Source adapter backed by a JSON-over-HTTP search endpoint.
pub struct HttpSource {
    name: String,
    client: Client,
    endpoint: String,
}

impl HttpSource {
    pub fn new(name: String, endpoint: String) -> Self {
        Self {
            name,
            client: Client::new(),
            endpoint,
        }
    }
}

#[async_trait]
impl SourceAdapter for HttpSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, keywords: &str) -> Result<Vec<RawJob>, SourceError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", keywords)])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Status { status, body });
        }

        let payload: Value = response.json().await?;
        let jobs = parse_jobs(&payload)?;
        debug!(source = %self.name, count = jobs.len(), "source search returned");
        Ok(jobs)
    }
}

/// Extract the result array from a provider payload: either a bare array or
/// an object nesting one under a well-known envelope key.
fn result_array(payload: &Value) -> Option<&Vec<Value>> {
    if let Some(array) = payload.as_array() {
        return Some(array);
    }
    ENVELOPE_KEYS
        .iter()
        .find_map(|key| payload.get(key).and_then(Value::as_array))
}

fn first_string(record: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| record.get(key).and_then(Value::as_str))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Map a provider payload into raw jobs.
///
/// Records without a usable URL are dropped (they cannot be deduplicated
/// downstream); missing titles and companies degrade to placeholders.
pub fn parse_jobs(payload: &Value) -> Result<Vec<RawJob>, SourceError> {
    let array = result_array(payload)
        .ok_or_else(|| SourceError::Decode("no result array in payload".to_string()))?;

    let mut jobs = Vec::with_capacity(array.len());
    let mut skipped = 0usize;

    for record in array {
        let Some(url) = first_string(record, URL_KEYS) else {
            skipped += 1;
            continue;
        };
        jobs.push(RawJob {
            title: first_string(record, TITLE_KEYS).unwrap_or_else(|| "(untitled)".to_string()),
            company: first_string(record, COMPANY_KEYS).unwrap_or_else(|| "(unknown)".to_string()),
            location: first_string(record, LOCATION_KEYS),
            url,
            description: first_string(record, DESCRIPTION_KEYS),
        });
    }

    if skipped > 0 {
        debug!(skipped, "records without a URL dropped");
    }
    Ok(jobs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_bare_array() {
        let payload = json!([
            {"title": "Backend Engineer", "company": "Acme", "url": "https://a/1"},
            {"title": "Data Engineer", "company": "Globex", "url": "https://a/2", "location": "Berlin"}
        ]);
        let jobs = parse_jobs(&payload).unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].title, "Backend Engineer");
        assert_eq!(jobs[1].location.as_deref(), Some("Berlin"));
    }

    #[test]
    fn parses_enveloped_array() {
        let payload = json!({"results": [
            {"job_title": "SRE", "employer": "Initech", "link": "https://b/1", "snippet": "on-call"}
        ]});
        let jobs = parse_jobs(&payload).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].title, "SRE");
        assert_eq!(jobs[0].company, "Initech");
        assert_eq!(jobs[0].url, "https://b/1");
        assert_eq!(jobs[0].description.as_deref(), Some("on-call"));
    }

    #[test]
    fn drops_records_without_url() {
        let payload = json!({"jobs": [
            {"title": "No URL", "company": "Acme"},
            {"title": "Has URL", "company": "Acme", "url": "https://c/1"}
        ]});
        let jobs = parse_jobs(&payload).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].title, "Has URL");
    }

    #[test]
    fn missing_title_and_company_degrade_to_placeholders() {
        let payload = json!([{"url": "https://d/1"}]);
        let jobs = parse_jobs(&payload).unwrap();
        assert_eq!(jobs[0].title, "(untitled)");
        assert_eq!(jobs[0].company, "(unknown)");
    }

    #[test]
    fn non_array_payload_is_a_decode_error() {
        let payload = json!({"error": "rate limited"});
        assert!(matches!(
            parse_jobs(&payload),
            Err(SourceError::Decode(_))
        ));
    }

    #[test]
    fn blank_strings_are_treated_as_missing() {
        let payload = json!([{"title": "  ", "company": "Acme", "url": "https://e/1"}]);
        let jobs = parse_jobs(&payload).unwrap();
        assert_eq!(jobs[0].title, "(untitled)");
    }
}
