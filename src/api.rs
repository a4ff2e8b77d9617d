use std::path::Path;

use anyhow::Context as _;

use crate::fetch::CachedFetcher;

/// One article as returned by the content API. Every field except the
/// section name comes from the record's flat field list; absent fields are
/// simply not present.
#[derive(Debug, Clone, Default)]
pub struct ArticleRecord {
    pub section_name: Option<String>,
    pub headline: Option<String>,
    pub byline: Option<String>,
    pub standfirst: Option<String>,
    pub trail_text: Option<String>,
    pub body: Option<String>,
    pub thumbnail: Option<String>,
    pub short_url: Option<String>,
    pub publication: Option<String>,
}

/// Per-item result of an article lookup. Denied and missing articles are
/// ordinary values so one bad article never aborts the run; anything the
/// API does that is not classified here surfaces as a fatal error instead.
#[derive(Debug)]
pub enum FetchOutcome {
    Fetched(ArticleRecord),
    Denied { message: String },
    Missing { message: String },
    NotOk { status: String },
}

/// The field names this tool knows how to map into an [`ArticleRecord`].
/// Anything else in the field list is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Headline,
    Byline,
    Standfirst,
    TrailText,
    Body,
    Thumbnail,
    ShortUrl,
    Publication,
}

impl Field {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "headline" => Some(Self::Headline),
            "byline" => Some(Self::Byline),
            "standfirst" => Some(Self::Standfirst),
            "trailText" => Some(Self::TrailText),
            "body" => Some(Self::Body),
            "thumbnail" => Some(Self::Thumbnail),
            "shortUrl" => Some(Self::ShortUrl),
            "publication" => Some(Self::Publication),
            _ => None,
        }
    }
}

pub struct ApiClient<'a> {
    fetcher: &'a CachedFetcher,
    api_base: String,
    api_key: String,
}

impl<'a> ApiClient<'a> {
    pub fn new(fetcher: &'a CachedFetcher, api_base: &str, api_key: &str) -> Self {
        Self {
            fetcher,
            api_base: api_base.trim_end_matches('/').to_owned(),
            api_key: api_key.to_owned(),
        }
    }

    pub fn item_url(&self, item_id: &str) -> String {
        format!(
            "{}/{}?format=json&show-fields=all&api-key={}",
            self.api_base, item_id, self.api_key
        )
    }

    /// Look up one article by its item identifier (the path of its
    /// canonical URL).
    pub fn fetch_article(&self, item_id: &str) -> anyhow::Result<FetchOutcome> {
        let url = self.item_url(item_id);
        let response = self
            .fetcher
            .fetch(&url)
            .with_context(|| format!("fetch article record: {item_id}"))?;

        match response.status {
            status if (200..300).contains(&status) => parse_outcome(&response.body)
                .with_context(|| format!("parse article record: {item_id}")),
            403 => {
                let message = error_message_from_body(&response.body);
                if message.contains("not permitted to access this content") {
                    Ok(FetchOutcome::Denied { message })
                } else {
                    anyhow::bail!("403 returned from the API: {message}");
                }
            }
            404 => Ok(FetchOutcome::Missing {
                message: error_message_from_body(&response.body),
            }),
            status => anyhow::bail!("unexpected HTTP status {status} from the API for {item_id}"),
        }
    }
}

/// Parse a successful API body into a per-item outcome. The envelope must
/// be an object with a top-level `response`; anything else is fatal.
fn parse_outcome(body: &[u8]) -> anyhow::Result<FetchOutcome> {
    let value: serde_json::Value =
        serde_json::from_slice(body).context("deserialize API response")?;
    let response = value
        .get("response")
        .ok_or_else(|| anyhow::anyhow!("unexpected envelope: no top-level \"response\""))?;

    let status = response
        .get("status")
        .and_then(|s| s.as_str())
        .unwrap_or("");
    if status != "ok" {
        return Ok(FetchOutcome::NotOk {
            status: status.to_owned(),
        });
    }

    let mut record = ArticleRecord::default();

    let content = response
        .get("content")
        .ok_or_else(|| anyhow::anyhow!("unexpected envelope: no \"content\" in ok response"))?;
    record.section_name = content
        .get("sectionName")
        .and_then(|s| s.as_str())
        .map(str::to_owned);

    if let Some(fields) = content.get("fields").and_then(|f| f.as_object()) {
        for (name, value) in fields {
            let Some(field) = Field::from_name(name) else {
                continue;
            };
            let Some(text) = value.as_str() else {
                continue;
            };
            let text = text.to_owned();
            match field {
                Field::Headline => record.headline = Some(text),
                Field::Byline => record.byline = Some(text),
                Field::Standfirst => record.standfirst = Some(text),
                Field::TrailText => record.trail_text = Some(text),
                Field::Body => record.body = Some(text),
                Field::Thumbnail => record.thumbnail = Some(text),
                Field::ShortUrl => record.short_url = Some(text),
                Field::Publication => record.publication = Some(text),
            }
        }
    }

    Ok(FetchOutcome::Fetched(record))
}

/// Upstream error bodies carry a human-readable `response.message`.
fn error_message_from_body(body: &[u8]) -> String {
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("response")?
                .get("message")?
                .as_str()
                .map(str::to_owned)
        })
        .unwrap_or_default()
}

pub fn load_api_key(path: &Path) -> anyhow::Result<String> {
    let key = std::fs::read_to_string(path)
        .with_context(|| format!("read API key file: {}", path.display()))?;
    let key = key.trim().to_owned();
    if key.is_empty() {
        anyhow::bail!("API key file is empty: {}", path.display());
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_fields_are_mapped_and_unknown_ignored() -> anyhow::Result<()> {
        let body = br#"{
            "response": {
                "status": "ok",
                "content": {
                    "id": "world/2026/aug/07/alpha",
                    "sectionName": "World news",
                    "fields": {
                        "headline": "Alpha headline",
                        "byline": "Jane Writer",
                        "standfirst": "<strong>Lead</strong> paragraph",
                        "trailText": "Trail",
                        "body": "<p>Body</p>",
                        "thumbnail": "https://media.example/alpha.jpg",
                        "shortUrl": "https://gu.com/p/alpha",
                        "publication": "The Guardian",
                        "starRating": "4",
                        "someFutureField": "ignored"
                    }
                }
            }
        }"#;

        let outcome = parse_outcome(body)?;
        let FetchOutcome::Fetched(record) = outcome else {
            panic!("expected a fetched record, got {outcome:?}");
        };
        assert_eq!(record.section_name.as_deref(), Some("World news"));
        assert_eq!(record.headline.as_deref(), Some("Alpha headline"));
        assert_eq!(record.byline.as_deref(), Some("Jane Writer"));
        assert_eq!(record.trail_text.as_deref(), Some("Trail"));
        assert_eq!(record.body.as_deref(), Some("<p>Body</p>"));
        assert_eq!(record.short_url.as_deref(), Some("https://gu.com/p/alpha"));
        assert_eq!(record.publication.as_deref(), Some("The Guardian"));
        Ok(())
    }

    #[test]
    fn missing_fields_stay_absent() -> anyhow::Result<()> {
        let body = br#"{"response":{"status":"ok","content":{"sectionName":"UK news","fields":{}}}}"#;
        let FetchOutcome::Fetched(record) = parse_outcome(body)? else {
            panic!("expected a fetched record");
        };
        assert!(record.headline.is_none());
        assert!(record.body.is_none());
        assert_eq!(record.section_name.as_deref(), Some("UK news"));
        Ok(())
    }

    #[test]
    fn non_ok_status_is_reported_not_fatal() -> anyhow::Result<()> {
        let body = br#"{"response":{"status":"error","message":"nope"}}"#;
        let outcome = parse_outcome(body)?;
        let FetchOutcome::NotOk { status } = outcome else {
            panic!("expected NotOk, got {outcome:?}");
        };
        assert_eq!(status, "error");
        Ok(())
    }

    #[test]
    fn missing_envelope_is_fatal() {
        let err = parse_outcome(br#"{"results":[]}"#).unwrap_err();
        assert!(err.to_string().contains("no top-level \"response\""));
    }

    #[test]
    fn error_message_is_read_from_body() {
        let body = br#"{"response":{"status":"error","message":"The requested resource could not be found."}}"#;
        assert_eq!(
            error_message_from_body(body),
            "The requested resource could not be found."
        );
        assert_eq!(error_message_from_body(b"not json"), "");
    }

    #[test]
    fn item_url_carries_key_and_format() {
        let temp = tempfile::TempDir::new().expect("tempdir");
        let fetcher = CachedFetcher::new(temp.path(), std::time::Duration::ZERO).expect("fetcher");
        let client = ApiClient::new(&fetcher, "https://content.example/", "k3y");
        assert_eq!(
            client.item_url("world/2026/aug/07/alpha"),
            "https://content.example/world/2026/aug/07/alpha?format=json&show-fields=all&api-key=k3y"
        );
    }
}
