use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, bail};
use regex::Regex;

use crate::model::{Page, PageLink};

#[derive(Debug, Default)]
pub struct ExtractedDocument {
    pub pages: Vec<Page>,
    pub warnings: Vec<String>,
}

pub fn ensure_tools_available() -> Result<()> {
    for program in ["pdftotext", "pdftohtml"] {
        if !command_available(program) {
            bail!("required poppler tool '{program}' is not installed or not on PATH");
        }
    }
    Ok(())
}

fn command_available(program: &str) -> bool {
    Command::new(program).arg("-v").output().is_ok()
}

pub fn extract_document(pdf_path: &Path) -> Result<ExtractedDocument> {
    let texts = extract_page_texts(pdf_path)?;
    let xml = extract_link_xml(pdf_path)?;
    let links = parse_links_xml(&xml)?;
    Ok(assemble_pages(texts, links))
}

fn extract_page_texts(pdf_path: &Path) -> Result<Vec<String>> {
    let output = Command::new("pdftotext")
        .arg("-enc")
        .arg("UTF-8")
        .arg(pdf_path)
        .arg("-")
        .output()
        .with_context(|| format!("failed to execute pdftotext for {}", pdf_path.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "pdftotext returned non-zero exit status for {}: {}",
            pdf_path.display(),
            stderr.trim()
        );
    }

    Ok(split_form_feed_pages(&String::from_utf8_lossy(&output.stdout)))
}

fn extract_link_xml(pdf_path: &Path) -> Result<String> {
    let output = Command::new("pdftohtml")
        .arg("-xml")
        .arg("-i")
        .arg("-q")
        .arg("-stdout")
        .arg(pdf_path)
        .output()
        .with_context(|| format!("failed to execute pdftohtml for {}", pdf_path.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "pdftohtml returned non-zero exit status for {}: {}",
            pdf_path.display(),
            stderr.trim()
        );
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn split_form_feed_pages(raw: &str) -> Vec<String> {
    let mut pages: Vec<String> = raw
        .split('\u{000C}')
        .map(|chunk| chunk.replace('\u{0000}', ""))
        .collect();

    // pdftotext ends every page with a form feed; only the chunk after the last one is not
    // a page. Blank pages inside the document, trailing ones included, are kept.
    if pages.last().is_some_and(|page| page.trim().is_empty()) {
        pages.pop();
    }

    pages
}

/// Internal hyperlinks per page, keyed by 0-based page index.
///
/// `pdftohtml` numbers pages from 1 and writes GoTo links as `<a href="...#N">`. A title
/// wrapped over several lines comes out as consecutive anchors with the same href; besides
/// the individual anchors, such a run also yields one link with the joined title text.
fn parse_links_xml(xml: &str) -> Result<Vec<(usize, Vec<PageLink>)>> {
    let page_regex = Regex::new(r#"(?s)<page number="(\d+)"[^>]*>(.*?)</page>"#)
        .context("failed to compile page element regex")?;
    let anchor_regex = Regex::new(r#"(?s)<a href="([^"]*)"[^>]*>(.*?)</a>"#)
        .context("failed to compile anchor regex")?;
    let target_regex = Regex::new(r"#(\d+)$").context("failed to compile link target regex")?;
    let tag_regex = Regex::new(r"<[^>]+>").context("failed to compile tag regex")?;
    let page_label_regex = Regex::new(r"(?i)^(?:[a-z]-)?\d+$|^[ivxlcdm]+$")
        .context("failed to compile page label regex")?;

    let mut pages = Vec::<(usize, Vec<PageLink>)>::new();

    for page_captures in page_regex.captures_iter(xml) {
        let Some(page_number) = page_captures
            .get(1)
            .and_then(|value| value.as_str().parse::<usize>().ok())
            .filter(|number| *number > 0)
        else {
            continue;
        };
        let body = page_captures.get(2).map(|value| value.as_str()).unwrap_or("");

        let mut runs = Vec::<Vec<PageLink>>::new();
        let mut current_href: Option<&str> = None;

        for anchor in anchor_regex.captures_iter(body) {
            let href = anchor.get(1).map(|value| value.as_str()).unwrap_or("");
            let Some(target_page) = target_regex
                .captures(href)
                .and_then(|captures| captures.get(1))
                .and_then(|value| value.as_str().parse::<usize>().ok())
                .filter(|number| *number > 0)
            else {
                current_href = None;
                continue;
            };

            let raw_text = anchor.get(2).map(|value| value.as_str()).unwrap_or("");
            let anchor_text = unescape_xml(&tag_regex.replace_all(raw_text, ""))
                .trim()
                .to_string();
            if anchor_text.is_empty() {
                continue;
            }

            let link = PageLink {
                anchor_text,
                target: target_page - 1,
            };
            match runs.last_mut() {
                Some(run) if current_href == Some(href) => run.push(link),
                _ => {
                    runs.push(vec![link]);
                    current_href = Some(href);
                }
            }
        }

        let links = runs
            .into_iter()
            .flat_map(|run| expand_link_run(run, &page_label_regex))
            .collect();
        pages.push((page_number - 1, links));
    }

    Ok(pages)
}

fn expand_link_run(run: Vec<PageLink>, page_label_regex: &Regex) -> Vec<PageLink> {
    let title_parts = run
        .iter()
        .map(|link| link.anchor_text.as_str())
        .filter(|text| !page_label_regex.is_match(text))
        .collect::<Vec<&str>>();
    let joined = match (title_parts.len() > 1, run.first()) {
        (true, Some(first)) => Some(PageLink {
            anchor_text: title_parts.join(" "),
            target: first.target,
        }),
        _ => None,
    };

    let mut links = run;
    links.extend(joined);
    links
}

fn unescape_xml(input: &str) -> String {
    input
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace("&#160;", " ")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

fn assemble_pages(texts: Vec<String>, links: Vec<(usize, Vec<PageLink>)>) -> ExtractedDocument {
    let page_count = texts.len();
    let mut document = ExtractedDocument {
        pages: texts
            .into_iter()
            .enumerate()
            .map(|(true_index, text)| Page {
                true_index,
                text,
                links: Vec::new(),
            })
            .collect(),
        warnings: Vec::new(),
    };

    for (page_index, page_links) in links {
        let Some(page) = document.pages.get_mut(page_index) else {
            if !page_links.is_empty() {
                document.warnings.push(format!(
                    "dropped {} links on page {} beyond the {} text pages",
                    page_links.len(),
                    page_index,
                    page_count
                ));
            }
            continue;
        };

        for link in page_links {
            if link.target >= page_count {
                document.warnings.push(format!(
                    "dropped link '{}' on page {} targeting missing page {}",
                    link.anchor_text, page_index, link.target
                ));
                continue;
            }
            page.links.push(link);
        }
    }

    document
}

/// Text of pages carrying more than `threshold` links, the likely ToC pages.
pub fn link_dense_text(pages: &[Page], threshold: usize) -> String {
    pages
        .iter()
        .filter(|page| page.links.len() > threshold)
        .map(|page| page.text.as_str())
        .collect()
}
