//! Loading captured pages and responses from disk.

use anyhow::{Context, Result};
use squigscan::{CapturedResponse, PageSnapshot};
use std::path::Path;

/// Load a page from a snapshot JSON file or a raw HTML file. `url`
/// overrides the URL recorded in a snapshot.
pub fn load_page(path: &Path, url: Option<&str>) -> Result<PageSnapshot> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    let mut page = if is_json {
        serde_json::from_str::<PageSnapshot>(&contents)
            .with_context(|| format!("{} is not a page snapshot", path.display()))?
    } else {
        PageSnapshot::from_html(None, contents)
    };
    if let Some(url) = url {
        page.url = Some(url.to_string());
    }
    Ok(page)
}

/// Load captured responses: a JSON array of `{url, contentType, body}`.
pub fn load_responses(path: &Path) -> Result<Vec<CapturedResponse>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("{} is not a list of captured responses", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_file(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_snapshot_json() {
        let file = temp_file(
            ".json",
            r#"{"url": "https://crin.squig.link/", "html": "<p>x</p>", "globals": {"phoneObjs": []}}"#,
        );
        let page = load_page(file.path(), None).unwrap();
        assert_eq!(page.url.as_deref(), Some("https://crin.squig.link/"));
        assert!(page.globals.contains_key("phoneObjs"));
    }

    #[test]
    fn test_load_html_with_url_override() {
        let file = temp_file(".html", "<html><body>HD650</body></html>");
        let page = load_page(file.path(), Some("https://graph.headphones.com/")).unwrap();
        assert!(page.html.contains("HD650"));
        assert_eq!(page.url.as_deref(), Some("https://graph.headphones.com/"));
    }

    #[test]
    fn test_bad_inputs_have_context() {
        let file = temp_file(".json", "[1, 2]");
        let err = load_page(file.path(), None).unwrap_err();
        assert!(err.to_string().contains("not a page snapshot"));
        assert!(load_page(Path::new("/nonexistent/page.html"), None).is_err());
    }

    #[test]
    fn test_load_responses() {
        let file = temp_file(
            ".json",
            r#"[{"url": "/data/HD650.csv", "contentType": "text/csv", "body": "20,1"}]"#,
        );
        let responses = load_responses(file.path()).unwrap();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].content_type.as_deref(), Some("text/csv"));
    }
}
