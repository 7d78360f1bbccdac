//! Listing output: JSON rows for programs, an HTML table for browsers.

use std::fmt::Write as _;

use bkt_namespace::{Entry, Listing};
use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::Serialize;

/// Characters escaped when a key is placed in a URL path. `/` is kept.
pub const PATH_ESCAPE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Click-to-sort for the listing table. The header, separator and parent
/// rows stay on top; size cells sort by their byte count.
const SORT_SCRIPT: &str = r#"<script>
function sortTable(col) {
  var table = document.getElementById("entries");
  var rows = Array.prototype.filter.call(table.rows, function (r) {
    return r.cells[0].tagName === "TD" && !r.hasAttribute("data-parent");
  });
  var asc = table.dataset.sortCol !== String(col) || table.dataset.sortDir !== "asc";
  table.dataset.sortCol = col;
  table.dataset.sortDir = asc ? "asc" : "desc";
  function key(r) {
    var c = r.cells[col];
    return c.hasAttribute("data-value") ? Number(c.getAttribute("data-value")) : c.textContent;
  }
  rows.sort(function (a, b) {
    var x = key(a), y = key(b);
    var ord = typeof x === "number" && typeof y === "number"
      ? x - y
      : String(x).localeCompare(String(y), undefined, { numeric: true, sensitivity: "base" });
    return asc ? ord : -ord;
  });
  rows.forEach(function (r) { r.parentNode.appendChild(r); });
}
</script>
"#;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryDoc<'a> {
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<&'a str>,
}

impl<'a> From<&'a Entry> for EntryDoc<'a> {
    fn from(e: &'a Entry) -> Self {
        Self {
            name: e.name(),
            last_modified: e.modified(),
            size: e.size(),
            count: e.count(),
            checksum: e.checksum(),
            storage_class: e.storage_class(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListingDoc<'a> {
    pub path: &'a str,
    pub entries: Vec<EntryDoc<'a>>,
}

impl<'a> From<&'a Listing> for ListingDoc<'a> {
    fn from(l: &'a Listing) -> Self {
        Self {
            path: &l.path,
            entries: entry_docs(&l.entries),
        }
    }
}

pub fn entry_docs(entries: &[Entry]) -> Vec<EntryDoc<'_>> {
    entries.iter().map(EntryDoc::from).collect()
}

/// Byte count with a binary-scaled suffix once it reaches four digits:
/// `999`, `1.50k`, `1.00M`.
pub fn human_size(bytes: u64) -> String {
    if bytes < 1000 {
        return bytes.to_string();
    }
    let mut size = bytes as f64;
    let mut suffix = "";
    for unit in ["k", "M", "G", "T", "P"] {
        if size < 1000.0 {
            break;
        }
        size /= 1024.0;
        suffix = unit;
    }
    format!("{size:.2}{suffix}")
}

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Bucket object spliced into an HTML listing above or below the table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Fragment {
    pub body: String,
    /// An `.htm`/`.html` fragment carries its own document head or tail, so
    /// the generated one is left out.
    pub full_document: bool,
}

impl Fragment {
    pub fn new(key: &str, body: String) -> Self {
        let lower = key.to_ascii_lowercase();
        Self {
            body,
            full_document: lower.ends_with(".htm") || lower.ends_with(".html"),
        }
    }
}

/// Browser listing. Names starting with `.` are hidden.
pub fn html_listing(listing: &Listing, header: Option<&Fragment>, footer: Option<&Fragment>) -> String {
    let title = escape_html(&format!("/{}", listing.path));
    let mut html = String::with_capacity(1024 + listing.entries.len() * 160);
    if !header.is_some_and(|h| h.full_document) {
        let _ = write!(
            html,
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
             <title>Index of {title}</title>\n\
             <style>body{{font-family:monospace}}td{{padding:0 1em}}</style>\n\
             </head>\n<body>\n"
        );
    }
    match header {
        Some(h) => html.push_str(&h.body),
        None => {
            let _ = writeln!(html, "<h1>Index of {title}</h1>");
        }
    }
    html.push_str(
        "<table id=\"entries\">\n<tr><th onclick=\"sortTable(0)\">Name</th>\
         <th onclick=\"sortTable(1)\">Last modified</th>\
         <th onclick=\"sortTable(2)\">Size</th>\
         <th onclick=\"sortTable(3)\">Checksum</th></tr>\n\
         <tr><th colspan=\"4\"><hr></th></tr>\n",
    );
    if !listing.path.is_empty() {
        html.push_str(
            "<tr data-parent><td><a href=\"../\">../</a></td><td></td><td align=\"right\">-</td><td></td></tr>\n",
        );
    }
    for entry in &listing.entries {
        let name = entry.name();
        if name.starts_with('.') {
            continue;
        }
        let modified = entry
            .modified()
            .map(|t| t.format(TIME_FORMAT).to_string())
            .unwrap_or_default();
        let _ = writeln!(
            html,
            "<tr><td><a href=\"./{href}\">{label}</a></td><td>{modified}</td>\
             <td align=\"right\" data-value=\"{bytes}\">{size}</td><td>{checksum}</td></tr>",
            href = utf8_percent_encode(name, PATH_ESCAPE),
            label = escape_html(name),
            bytes = entry.size(),
            size = human_size(entry.size()),
            checksum = escape_html(entry.checksum().unwrap_or("")),
        );
    }
    html.push_str("</table>\n");
    html.push_str(SORT_SCRIPT);
    if let Some(f) = footer {
        html.push_str(&f.body);
    }
    if !footer.is_some_and(|f| f.full_document) {
        html.push_str("</body>\n</html>\n");
    }
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use bkt_namespace::{DirEntry, FileEntry};
    use chrono::TimeZone;

    fn listing() -> Listing {
        let t = Utc.with_ymd_and_hms(2024, 3, 9, 8, 30, 0).unwrap();
        Listing {
            path: "docs/".into(),
            entries: vec![
                Entry::File(FileEntry {
                    name: ".hidden".into(),
                    size: 1,
                    modified: Some(t),
                    observed_modified: Some(t),
                    etag: "h".into(),
                    storage_class: None,
                    checksum: None,
                }),
                Entry::File(FileEntry {
                    name: "a <b>.txt".into(),
                    size: 1536,
                    modified: Some(t),
                    observed_modified: Some(t),
                    etag: "e".into(),
                    storage_class: Some("STANDARD".into()),
                    checksum: Some("{SHA256}abcd".into()),
                }),
                Entry::Directory(DirEntry {
                    name: "img/".into(),
                    size: 42,
                    count: 3,
                    marker: None,
                }),
            ],
        }
    }

    #[test]
    fn human_sizes() {
        assert_eq!(human_size(0), "0");
        assert_eq!(human_size(999), "999");
        assert_eq!(human_size(1000), "0.98k");
        assert_eq!(human_size(1536), "1.50k");
        assert_eq!(human_size(1 << 20), "1.00M");
        assert_eq!(human_size(5 << 30), "5.00G");
    }

    #[test]
    fn html_escapes() {
        assert_eq!(escape_html("<a href=\"x\">&'"), "&lt;a href=&#34;x&#34;&gt;&amp;&#39;");
    }

    #[test]
    fn json_rows_skip_absent_fields() {
        let l = listing();
        let rows = serde_json::to_value(entry_docs(&l.entries)).unwrap();
        assert_eq!(rows[1]["name"], "a <b>.txt");
        assert_eq!(rows[1]["size"], 1536);
        assert_eq!(rows[1]["checksum"], "{SHA256}abcd");
        assert_eq!(rows[1]["storageClass"], "STANDARD");
        assert_eq!(rows[1]["lastModified"], "2024-03-09T08:30:00Z");
        assert!(rows[1].get("count").is_none());

        assert_eq!(rows[2]["count"], 3);
        assert!(rows[2].get("lastModified").is_none());
        assert!(rows[2].get("checksum").is_none());
    }

    #[test]
    fn html_hides_dot_files_and_links_parent() {
        let html = html_listing(&listing(), None, None);
        assert!(html.contains("<title>Index of /docs/</title>"));
        assert!(html.contains("<a href=\"../\">../</a>"));
        assert!(!html.contains(".hidden"));
        assert!(html.contains("<a href=\"./a%20%3Cb%3E.txt\">a &lt;b&gt;.txt</a>"));
        assert!(html.contains("2024-03-09 08:30:00"));
        assert!(html.contains("1.50k"));
        assert!(html.contains("<a href=\"./img/\">img/</a>"));
    }

    #[test]
    fn colon_names_link_relative_to_the_directory() {
        let l = Listing {
            path: "notes/".into(),
            entries: vec![Entry::File(FileEntry {
                name: "a:b".into(),
                size: 2,
                modified: None,
                observed_modified: None,
                etag: "c".into(),
                storage_class: None,
                checksum: None,
            })],
        };
        let html = html_listing(&l, None, None);
        assert!(html.contains("<a href=\"./a:b\">a:b</a>"));
        assert!(!html.contains("href=\"a:b\""));
    }

    #[test]
    fn table_sorts_by_column_below_a_separator() {
        let html = html_listing(&listing(), None, None);
        assert!(html.contains("<table id=\"entries\">"));
        for col in 0..4 {
            assert!(html.contains(&format!("onclick=\"sortTable({col})\"")));
        }
        assert!(html.contains("<tr><th colspan=\"4\"><hr></th></tr>"));
        assert!(html.contains("<tr data-parent><td><a href=\"../\">"));
        assert!(html.contains("data-value=\"1536\">1.50k</td>"));
        assert!(html.contains("function sortTable(col)"));

        let separator = html.find("<hr>").unwrap();
        let first_row = html.find("./a%20").unwrap();
        assert!(separator < first_row);
    }

    #[test]
    fn root_listing_has_no_parent_row() {
        let root = Listing {
            path: String::new(),
            entries: Vec::new(),
        };
        let html = html_listing(&root, None, None);
        assert!(html.contains("Index of /<"));
        assert!(!html.contains("../"));
    }

    #[test]
    fn fragments_replace_heading_and_document_shell() {
        let header = Fragment::new("_header.txt", "<p>welcome</p>".into());
        assert!(!header.full_document);
        let html = html_listing(&listing(), Some(&header), None);
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<p>welcome</p>"));
        assert!(!html.contains("<h1>"));
        assert!(html.ends_with("</html>\n"));

        let header = Fragment::new("/theme/HEAD.html", "<html><body>".into());
        let footer = Fragment::new("/theme/foot.htm", "</body></html>".into());
        assert!(header.full_document && footer.full_document);
        let html = html_listing(&listing(), Some(&header), Some(&footer));
        assert!(html.starts_with("<html><body><table id=\"entries\">"));
        assert!(html.ends_with("</script>\n</body></html>"));
    }
}
