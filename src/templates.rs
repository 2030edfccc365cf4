use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::AppError;

pub const INDEX_VIEW: &str = "index.html";
pub const LIST_VIEW: &str = "uploadSuccess.html";

lazy_static! {
    static ref AUDIO_LIST_PLACEHOLDER: Regex = Regex::new(r"\{\{\s*audioList\s*\}\}").unwrap();
}

/// Read a view from the views directory.
pub async fn load_template(views_dir: &Path, name: &str) -> Result<String, AppError> {
    let path = views_dir.join(name);
    tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| AppError::TemplateLoadFailure(format!("{}: {}", path.display(), e)))
}

/// Substitute every `{{audioList}}` placeholder with one `<li>` per file.
pub fn render_audio_list(template: &str, files: &[String]) -> String {
    let items: String = files
        .iter()
        .map(|f| format!("<li>{}</li>", escape_html(f)))
        .collect();

    AUDIO_LIST_PLACEHOLDER
        .replace_all(template, regex::NoExpand(&items))
        .into_owned()
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
