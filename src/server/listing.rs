use std::fs;
use std::io;
use std::path::Path;

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// HTML index of `dir`, titled with the decoded request path.
pub fn render(dir: &Path, url_path: &str) -> io::Result<String> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let is_dir = entry.path().is_dir();
        entries.push((name, is_dir));
    }
    entries.sort_by_key(|(name, _)| name.to_lowercase());

    let title = escape_html(&format!("Directory listing for {url_path}"));
    let mut page = format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n</head>\n<body>\n<h1>{title}</h1>\n<hr>\n<ul>\n"
    );
    for (name, is_dir) in entries {
        let suffix = if is_dir { "/" } else { "" };
        page.push_str(&format!(
            "<li><a href=\"{}{suffix}\">{}{suffix}</a></li>\n",
            urlencoding::encode(&name),
            escape_html(&name),
        ));
    }
    page.push_str("</ul>\n<hr>\n</body>\n</html>\n");
    Ok(page)
}
