// src/services/report.rs
use chrono::NaiveDate;
use regex::Regex;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::REQUIRED_METRIC_KEYS;
use crate::services::artifacts::write_atomic;
use crate::services::numeric::value_to_f64;
use crate::BoxError;

const NA: &str = "N/A";
const ASSET_DIR: &str = "report_assets";
const ARCH_FILES: [&str; 4] = [
    "architecture.svg",
    "architecture.png",
    "architecture.jpg",
    "architecture.jpeg",
];

pub fn missing_keys(metrics: &Map<String, Value>) -> Vec<&'static str> {
    REQUIRED_METRIC_KEYS
        .iter()
        .copied()
        .filter(|k| !metrics.contains_key(*k))
        .collect()
}

fn fmt_pct(v: Option<f64>) -> String {
    v.map(|x| format!("{:.1}%", x * 100.0))
        .unwrap_or_else(|| NA.to_string())
}

fn fmt_num(v: Option<f64>, digits: usize) -> String {
    v.map(|x| format!("{:.*}", digits, x))
        .unwrap_or_else(|| NA.to_string())
}

fn fmt_raw(v: Option<&Value>) -> String {
    match v {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        _ => NA.to_string(),
    }
}

pub fn render_markdown(
    title: &str,
    as_of: NaiveDate,
    metrics: &Map<String, Value>,
    heat: &Map<String, Value>,
    arch_image: Option<&str>,
) -> String {
    let num = |key: &str| metrics.get(key).and_then(value_to_f64);
    let stance = metrics
        .get("stance")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or(NA);

    let mut md = String::new();
    md.push_str(&format!("# {}\n\n", title));
    md.push_str(&format!("As of {} | Bias: {}\n\n", as_of.format("%Y-%m-%d"), stance));
    md.push_str("## Executive Summary\n\n");
    md.push_str(&format!("- **Rate-cut odds:** {}\n", fmt_pct(num("rate_cut_odds"))));
    md.push_str(&format!("- **VIX percentile:** {}\n", fmt_num(num("vix_pctile"), 2)));
    md.push_str(&format!("- **Corr(SPX, DXY):** {}\n", fmt_num(num("corr_spx_dxy"), 3)));
    md.push_str(&format!("- **Corr(SPX, 10Y):** {}\n", fmt_num(num("corr_spx_10y"), 3)));
    md.push_str(&format!(
        "- **Trade events last7/prev7/delta%:** {}/{}/{}\n",
        fmt_raw(heat.get("last7")),
        fmt_raw(heat.get("prev7")),
        fmt_raw(heat.get("delta_pct"))
    ));
    md.push_str(&format!("- **Overall stance:** {}\n\n", stance));
    md.push_str("*Educational demo, not investment advice.*\n");
    if let Some(src) = arch_image {
        md.push_str(&format!("\n## Architecture\n\n![architecture]({})\n", src));
    }
    md
}

/// Looks for an architecture diagram (SVG first, then PNG/JPG) in
/// `<outdir>/report_assets`, `<root>/report_assets` and `<root>`, copies it
/// to `<outdir>/report_assets` and returns its path relative to `outdir`.
pub fn resolve_arch_asset(root: &Path, outdir: &Path) -> Result<Option<String>, BoxError> {
    let dirs = [outdir.join(ASSET_DIR), root.join(ASSET_DIR), root.to_path_buf()];
    let found = dirs
        .iter()
        .flat_map(|dir| ARCH_FILES.iter().map(move |name| (dir.join(name), *name)))
        .find(|(path, _)| path.is_file());

    let (source, name) = match found {
        Some(found) => found,
        None => return Ok(None),
    };
    let target = outdir.join(ASSET_DIR).join(name);
    if source != target {
        write_atomic(&target, &fs::read(&source)?)?;
    }
    Ok(Some(format!("{}/{}", ASSET_DIR, name)))
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Small Markdown subset: headings, bullet lists, links, images, bold,
/// italics and paragraphs.
pub fn markdown_to_html(md: &str) -> Result<String, BoxError> {
    let image = Regex::new(r"!\[(.*?)\]\((.*?)\)")?;
    let link = Regex::new(r"\[(.*?)\]\((.*?)\)")?;
    let bold = Regex::new(r"\*\*(.+?)\*\*")?;
    let italic = Regex::new(r"\*(.+?)\*")?;
    let h2 = Regex::new(r"(?m)^## (.*)$")?;
    let h1 = Regex::new(r"(?m)^# (.*)$")?;
    let item = Regex::new(r"(?m)^- (.*)$")?;

    let mut t = escape_html(md);
    t = image.replace_all(&t, r#"<img alt="$1" src="$2"/>"#).into_owned();
    t = link.replace_all(&t, r#"<a href="$2">$1</a>"#).into_owned();
    t = bold.replace_all(&t, "<b>$1</b>").into_owned();
    t = italic.replace_all(&t, "<i>$1</i>").into_owned();
    t = h2.replace_all(&t, "<h2>$1</h2>").into_owned();
    t = h1.replace_all(&t, "<h1>$1</h1>").into_owned();
    t = item.replace_all(&t, "<li>$1</li>").into_owned();

    let blocks: Vec<String> = t
        .split("\n\n")
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(|block| {
            if block.starts_with("<h") {
                block.to_string()
            } else if block.lines().all(|l| l.starts_with("<li>")) {
                format!("<ul>\n{}\n</ul>", block)
            } else {
                format!("<p>{}</p>", block)
            }
        })
        .collect();
    Ok(blocks.join("\n"))
}

pub fn wrap_html(title: &str, body: &str) -> String {
    format!(
        "<!doctype html>\n<html><head>\n<meta charset=\"utf-8\"/>\n<title>{}</title>\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\"/>\n\
         <style>body{{font-family:ui-sans-serif,system-ui;max-width:900px;margin:32px auto;line-height:1.6}}</style>\n\
         </head><body>\n{}\n</body></html>\n",
        escape_html(title),
        body
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportPaths {
    pub markdown: PathBuf,
    pub html: PathBuf,
}

pub fn write_report(outdir: &Path, as_of: NaiveDate, markdown: &str, html: &str) -> Result<ReportPaths, BoxError> {
    let stem = format!("weekly_{}", as_of.format("%Y-%m-%d"));
    let paths = ReportPaths {
        markdown: outdir.join(format!("{}.md", stem)),
        html: outdir.join(format!("{}.html", stem)),
    };
    write_atomic(&paths.markdown, markdown.as_bytes())?;
    write_atomic(&paths.html, html.as_bytes())?;
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn as_map(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 7).unwrap()
    }

    #[test]
    fn reports_missing_keys_in_order() {
        let m = as_map(json!({"vix_pctile": 0.5, "stance": "Neutral"}));
        assert_eq!(missing_keys(&m), vec!["rate_cut_odds", "corr_spx_dxy", "corr_spx_10y"]);
        let full = as_map(json!({
            "rate_cut_odds": null, "vix_pctile": null, "corr_spx_dxy": null,
            "corr_spx_10y": null, "stance": "Neutral"
        }));
        assert!(missing_keys(&full).is_empty());
    }

    #[test]
    fn markdown_formats_and_marks_missing_values() {
        let m = as_map(json!({
            "rate_cut_odds": 0.55, "vix_pctile": 0.8123, "corr_spx_dxy": -0.41,
            "corr_spx_10y": null, "stance": "Risk-on"
        }));
        let heat = as_map(json!({"last7": 3, "prev7": 0, "delta_pct": 100.0}));
        let md = render_markdown("Weekly", day(), &m, &heat, None);
        assert!(md.starts_with("# Weekly\n"));
        assert!(md.contains("As of 2024-06-07 | Bias: Risk-on"));
        assert!(md.contains("**Rate-cut odds:** 55.0%"));
        assert!(md.contains("**VIX percentile:** 0.81"));
        assert!(md.contains("**Corr(SPX, DXY):** -0.410"));
        assert!(md.contains("**Corr(SPX, 10Y):** N/A"));
        assert!(md.contains("3/0/100.0"));
    }

    #[test]
    fn absent_heat_renders_na() {
        let md = render_markdown("T", day(), &Map::new(), &Map::new(), None);
        assert!(md.contains("N/A/N/A/N/A"));
        assert!(md.contains("Bias: N/A"));
    }

    #[test]
    fn architecture_diagram_is_copied_and_embedded() {
        let root = tempfile::TempDir::new().unwrap();
        let outdir = root.path().join("report");
        assert_eq!(resolve_arch_asset(root.path(), &outdir).unwrap(), None);

        fs::write(root.path().join("architecture.png"), b"png").unwrap();
        fs::create_dir_all(root.path().join("report_assets")).unwrap();
        fs::write(root.path().join("report_assets/architecture.svg"), b"<svg/>").unwrap();

        let src = resolve_arch_asset(root.path(), &outdir).unwrap();
        assert_eq!(src.as_deref(), Some("report_assets/architecture.svg"));
        assert_eq!(fs::read(outdir.join("report_assets/architecture.svg")).unwrap(), b"<svg/>");
        assert!(!outdir.join("report_assets/architecture.png").exists());

        let md = render_markdown("T", day(), &Map::new(), &Map::new(), src.as_deref());
        assert!(md.contains("## Architecture\n\n![architecture](report_assets/architecture.svg)"));
        let html = markdown_to_html(&md).unwrap();
        assert!(html.contains("<h2>Architecture</h2>"));
        assert!(html.contains(r#"<img alt="architecture" src="report_assets/architecture.svg"/>"#));
    }

    #[test]
    fn html_conversion() {
        let html = markdown_to_html("# Title\n\nSome *note* & [link](http://x)\n\n- **a:** 1\n- b\n").unwrap();
        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<p>Some <i>note</i> &amp; <a href=\"http://x\">link</a></p>"));
        assert!(html.contains("<ul>\n<li><b>a:</b> 1</li>\n<li>b</li>\n</ul>"));
    }
}
