//! Telegram text for Splunk alerts.
//!
//! One bold-labelled line per configured key. A key that fails to render is
//! replaced with a placeholder and the remaining keys are still rendered.

use serde_json::Value;
use tracing::error;
use url::Url;
use url::form_urlencoded;

use crate::domain::{SplunkEvent, display_value};
use crate::error::RenderError;

const NO_LINK: &str = "No link provided!";
const NO_RESULT: &str = "No result in response!";
const KEY_NOT_FOUND: &str = "this key not found in body!";
const FIELD_ERROR: &str = "(error building field)";

/// Query prefix Splunk uses when a link points at a finished job.
const JOB_REFERENCE_MARKER: &str = "|loadjob";

/// Payload fields that may carry the original search, in priority order.
const SEARCH_CANDIDATES: [&str; 8] = [
    "search",
    "saved_search",
    "savedsearch",
    "search_name",
    "saved_search_name",
    "query",
    "raw_search",
    "q",
];

const RESULT_FIELD_LIMIT: usize = 2;

pub(crate) fn render(keys: &[String], event: &SplunkEvent, public_host: &str) -> String {
    let mut message = String::new();

    for key in keys {
        message.push_str("<b>");
        message.push_str(key);
        message.push_str(": </b>");

        match render_field(key, event, public_host) {
            Ok(value) => message.push_str(&value),
            Err(e) => {
                error!(key = %key, error = %e, "Error while building splunk message field");
                message.push_str(FIELD_ERROR);
            }
        }

        message.push('\n');
    }

    message
}

fn render_field(key: &str, event: &SplunkEvent, public_host: &str) -> Result<String, RenderError> {
    match key {
        "results_link" => results_link(event, public_host),
        "result" => Ok(result_lines(event.get("result"))),
        _ => Ok(event
            .get(key)
            .map(display_value)
            .unwrap_or_else(|| KEY_NOT_FOUND.to_string())),
    }
}

fn results_link(event: &SplunkEvent, public_host: &str) -> Result<String, RenderError> {
    let raw = match event.get("results_link") {
        None | Some(Value::Null) | Some(Value::Bool(false)) => return Ok(NO_LINK.to_string()),
        Some(Value::String(s)) if s.is_empty() => return Ok(NO_LINK.to_string()),
        Some(Value::String(s)) => s.as_str(),
        Some(other) => {
            return Err(RenderError::UnsupportedValue {
                field: "results_link".to_string(),
                reason: format!("expected a string, got {other}"),
            });
        }
    };

    let cleaned = clean_link(raw);
    let Some(parsed) = parse_link(&cleaned, public_host) else {
        return Ok(cleaned);
    };

    // Collapse double-encoding left behind by some alert actions.
    let query = parsed.query().unwrap_or("").replace("%25", "%");
    let params: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    let param = |name: &str| {
        params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    };

    let rebuilt_query = param("q")
        .filter(|q| q.trim_start().starts_with(JOB_REFERENCE_MARKER))
        .and_then(|_| original_search(event))
        .map(|search| {
            let encoded = if search.contains('%') {
                search.to_string()
            } else {
                urlencoding::encode(search).into_owned()
            };
            let mut pieces = vec![format!("q={encoded}")];
            for name in ["earliest", "latest"] {
                if let Some(value) = param(name).filter(|v| !v.is_empty()) {
                    pieces.push(format!("{name}={}", urlencoding::encode(value)));
                }
            }
            pieces.join("&")
        });

    let path = match &rebuilt_query {
        Some(_) if parsed.path().starts_with("/app/") => format!("/en-US{}", parsed.path()),
        _ => parsed.path().to_string(),
    };
    let query = rebuilt_query.unwrap_or(query);

    let mut link = format!("https://{public_host}{path}");
    if !query.is_empty() {
        link.push('?');
        link.push_str(&query);
    }
    if let Some(fragment) = parsed.fragment().filter(|f| !f.is_empty()) {
        link.push('#');
        link.push_str(fragment);
    }
    let link = link.trim().trim_matches(|c| c == '"' || c == '\'');

    Ok(format!("<a href=\"{link}\">results_link</a>"))
}

/// Strips whitespace, quotes, a `<...>` wrapper and one trailing comma,
/// which may sit on either side of the wrapper.
fn clean_link(raw: &str) -> String {
    let mut link = raw.trim().trim_matches('"').trim_matches('\'');
    let mut comma_stripped = false;
    if let Some(stripped) = link.strip_suffix(',') {
        link = stripped.trim();
        comma_stripped = true;
    }
    if let Some(inner) = link.strip_prefix('<').and_then(|l| l.strip_suffix('>')) {
        link = inner.trim();
    }
    if !comma_stripped && let Some(stripped) = link.strip_suffix(',') {
        link = stripped.trim();
    }
    link.to_string()
}

/// Relative links are resolved against the public host.
fn parse_link(link: &str, public_host: &str) -> Option<Url> {
    match Url::parse(link) {
        Ok(url) => Some(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(&format!("https://{public_host}"))
            .ok()?
            .join(link)
            .ok(),
        Err(_) => None,
    }
}

/// First non-empty candidate field, if it looks like a search expression
/// rather than a saved-search name.
fn original_search(event: &SplunkEvent) -> Option<&str> {
    let search = SEARCH_CANDIDATES
        .iter()
        .find_map(|name| event.get_text(name))?;

    let lower = search.to_lowercase();
    let looks_like_query = lower.contains("index=")
        || search.contains('|')
        || ["stats ", "where ", "search ", "eval "]
            .iter()
            .any(|keyword| lower.contains(keyword));

    looks_like_query.then_some(search)
}

fn result_lines(result: Option<&Value>) -> String {
    let result = match result {
        None | Some(Value::Null) => return NO_RESULT.to_string(),
        Some(result) => result,
    };

    let mut out = String::from("\n");
    match result {
        Value::Object(fields) if fields.is_empty() => out.push_str("   (no fields)\n"),
        Value::Object(fields) => {
            for (key, value) in fields.iter().take(RESULT_FIELD_LIMIT) {
                out.push_str(&format!("   {key}: {}\n", display_value(value)));
            }
        }
        other => out.push_str(&format!("   {}\n", display_value(other))),
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOST: &str = "fsplunk.company.com";

    fn payload(raw: &str) -> SplunkEvent {
        SplunkEvent::from_body(raw.as_bytes())
    }

    fn keys(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn test_plain_keys_and_missing_keys() {
        let event = payload(r#"{"search_name": "Failed logins", "count": 12}"#);
        let text = render(&keys(&["search_name", "count", "owner"]), &event, HOST);
        assert_eq!(
            text,
            "<b>search_name: </b>Failed logins\n<b>count: </b>12\n<b>owner: </b>this key not found in body!\n"
        );
    }

    #[test]
    fn test_loadjob_link_is_rewritten_with_original_search() {
        let event = payload(
            r#"{
                "results_link": " <http://splunk-internal:8000/app/search/search?q=%7Cloadjob%20scheduler__admin&earliest=-15m&latest=now>, ",
                "search": "index=auth action=failure | stats count by user"
            }"#,
        );
        let text = render(&keys(&["results_link"]), &event, HOST);
        assert_eq!(
            text,
            "<b>results_link: </b><a href=\"https://fsplunk.company.com/en-US/app/search/search?\
             q=index%3Dauth%20action%3Dfailure%20%7C%20stats%20count%20by%20user&earliest=-15m&latest=now\">results_link</a>\n"
        );
    }

    #[test]
    fn test_saved_search_name_is_not_used_as_query() {
        let event = payload(
            r#"{"results_link": "https://splunk:8000/app/search/search?q=|loadjob abc", "search_name": "Failed logins"}"#,
        );
        let text = render(&keys(&["results_link"]), &event, HOST);
        assert!(text.contains("href=\"https://fsplunk.company.com/app/search/search?q=|loadjob%20abc\""));
    }

    #[test]
    fn test_link_without_job_reference_keeps_query() {
        let event = payload(r#"{"results_link": "'http://splunk/app/x?sid=1%2525#frag'"}"#);
        let text = render(&keys(&["results_link"]), &event, HOST);
        assert_eq!(
            text,
            "<b>results_link: </b><a href=\"https://fsplunk.company.com/app/x?sid=1%25#frag\">results_link</a>\n"
        );
    }

    #[test]
    fn test_missing_and_invalid_links() {
        let event = payload(r#"{"results_link": 42, "other": 1}"#);
        let text = render(&keys(&["results_link", "other"]), &event, HOST);
        assert_eq!(
            text,
            "<b>results_link: </b>(error building field)\n<b>other: </b>1\n"
        );

        let empty = payload(r#"{"results_link": ""}"#);
        let text = render(&keys(&["results_link"]), &empty, HOST);
        assert_eq!(text, "<b>results_link: </b>No link provided!\n");
    }

    #[test]
    fn test_result_rendering() {
        let event = payload(r#"{"result": {"user": "bob", "count": "7", "host": "h1"}}"#);
        let text = render(&keys(&["result"]), &event, HOST);
        assert_eq!(text, "<b>result: </b>\n   user: bob\n   count: 7\n\n");

        let empty = payload(r#"{"result": {}}"#);
        assert_eq!(
            render(&keys(&["result"]), &empty, HOST),
            "<b>result: </b>\n   (no fields)\n\n"
        );

        let scalar = payload(r#"{"result": "plain"}"#);
        assert_eq!(
            render(&keys(&["result"]), &scalar, HOST),
            "<b>result: </b>\n   plain\n\n"
        );

        let missing = payload("{}");
        assert_eq!(
            render(&keys(&["result"]), &missing, HOST),
            "<b>result: </b>No result in response!\n"
        );
    }
}
