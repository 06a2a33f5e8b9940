//! Streaming sitemap.xml decoding: extracts every `<loc>` element.

use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::error::Result;

/// Decodes a sitemap document, returning every `<loc>` text value in order.
pub fn decode_sitemap(body: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(body);
    reader.trim_text(true);

    let mut urls = Vec::new();
    let mut in_loc = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if e.local_name().as_ref() == b"loc" {
                    in_loc = true;
                }
            }
            Ok(Event::End(e)) => {
                if e.local_name().as_ref() == b"loc" {
                    in_loc = false;
                }
            }
            Ok(Event::Text(t)) => {
                if in_loc {
                    if let Ok(text) = t.unescape() {
                        urls.push(text.trim().to_string());
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(urls)
}

/// Builds the sitemap URL for a page: `<url>` itself if it already mentions
/// "sitemap", else `<url>/sitemap.xml`.
pub fn sitemap_url_for(page_url: &str) -> String {
    if page_url.contains("sitemap") {
        page_url.to_string()
    } else {
        format!("{}/sitemap.xml", page_url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_loc_elements() {
        let xml = r#"<?xml version="1.0"?>
            <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
                <url><loc>https://example.com/a</loc></url>
                <url><loc>https://example.com/b</loc></url>
            </urlset>"#;
        let urls = decode_sitemap(xml).unwrap();
        assert_eq!(urls, vec!["https://example.com/a", "https://example.com/b"]);
    }

    #[test]
    fn sitemap_url_appends_when_not_present() {
        assert_eq!(
            sitemap_url_for("https://example.com"),
            "https://example.com/sitemap.xml"
        );
        assert_eq!(
            sitemap_url_for("https://example.com/sitemap_index.xml"),
            "https://example.com/sitemap_index.xml"
        );
    }
}
