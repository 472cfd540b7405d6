//! `read_office_file`: text extraction from docx / xlsx / pptx archives.
//!
//! Office documents are zip archives of XML parts. Extraction pulls the
//! character data out of the text-run elements of the relevant parts:
//! `w:t` in `word/document.xml`, `t` in `xl/sharedStrings.xml`, `a:t` in
//! the `ppt/slides/slideN.xml` parts.

use std::io::Read;
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::json;

use crate::config::RuntimeConfig;

use super::policy::{self, LocalFilePolicy};
use super::read_file::truncate_chars;
use super::{clamped_limit, require_str, Args, ErrorCode, ToolError, ToolOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OfficeFormat {
    Docx,
    Xlsx,
    Pptx,
}

impl OfficeFormat {
    fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_string_lossy().to_lowercase();
        match ext.as_str() {
            "docx" => Some(Self::Docx),
            "xlsx" => Some(Self::Xlsx),
            "pptx" => Some(Self::Pptx),
            _ => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Docx => "docx",
            Self::Xlsx => "xlsx",
            Self::Pptx => "pptx",
        }
    }
}

fn unsupported(path: &Path, why: impl std::fmt::Display) -> ToolError {
    ToolError::new(
        ErrorCode::UnsupportedContent,
        format!("could not read {}: {why}", path.display()),
    )
}

/// Collect the text content of every `<text_tag>` element, inserting a
/// newline at each closing `<break_tag>`.
fn collect_text(xml: &str, text_tag: &[u8], break_tag: Option<&[u8]>) -> Result<String, quick_xml::Error> {
    let mut reader = Reader::from_reader(xml.as_bytes());
    let mut out = String::new();
    let mut in_text = false;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.name().as_ref() == text_tag => {
                in_text = true;
            }
            Event::End(e) => {
                if e.name().as_ref() == text_tag {
                    in_text = false;
                } else if break_tag == Some(e.name().as_ref()) {
                    out.push('\n');
                }
            }
            Event::Text(t) if in_text => {
                out.push_str(&t.unescape()?);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

fn read_archive_part(
    archive: &mut zip::ZipArchive<std::fs::File>,
    name: &str,
) -> Result<Option<String>, ToolError> {
    match archive.by_name(name) {
        Ok(mut part) => {
            let mut xml = String::new();
            part.read_to_string(&mut xml)
                .map_err(|e| ToolError::internal(format!("reading archive part {name}: {e}")))?;
            Ok(Some(xml))
        }
        Err(zip::result::ZipError::FileNotFound) => Ok(None),
        Err(e) => Err(ToolError::internal(format!(
            "reading archive part {name}: {e}"
        ))),
    }
}

fn extract_office_text(path: &Path, format: OfficeFormat) -> Result<String, ToolError> {
    let file = std::fs::File::open(path)?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| unsupported(path, e))?;

    let text = match format {
        OfficeFormat::Docx => {
            let xml = read_archive_part(&mut archive, "word/document.xml")?
                .ok_or_else(|| unsupported(path, "word/document.xml is missing"))?;
            collect_text(&xml, b"w:t", Some(b"w:p")).map_err(|e| unsupported(path, e))?
        }
        OfficeFormat::Xlsx => {
            let xml = read_archive_part(&mut archive, "xl/sharedStrings.xml")?
                .ok_or_else(|| unsupported(path, "xl/sharedStrings.xml is missing"))?;
            collect_text(&xml, b"t", Some(b"si")).map_err(|e| unsupported(path, e))?
        }
        OfficeFormat::Pptx => {
            let mut slide_names: Vec<String> = (0..archive.len())
                .filter_map(|i| archive.by_index(i).ok().map(|f| f.name().to_string()))
                .filter(|n| n.starts_with("ppt/slides/slide") && n.ends_with(".xml"))
                .collect();
            if slide_names.is_empty() {
                return Err(unsupported(path, "no slide parts found"));
            }
            slide_names.sort();
            let mut slides = Vec::new();
            for name in slide_names {
                if let Some(xml) = read_archive_part(&mut archive, &name)? {
                    let slide_text =
                        collect_text(&xml, b"a:t", Some(b"a:p")).map_err(|e| unsupported(path, e))?;
                    slides.push(slide_text.trim().to_string());
                }
            }
            slides.join("\n\n")
        }
    };

    let trimmed = text.trim().to_string();
    if trimmed.is_empty() {
        return Err(unsupported(path, "no extractable text"));
    }
    Ok(trimmed)
}

pub async fn read_office_file(args: &Args, config: &RuntimeConfig) -> Result<ToolOutcome, ToolError> {
    let input = require_str(args, "path")?;

    let policy = LocalFilePolicy::from_config(config);
    let max_chars = clamped_limit(args, "max_chars", policy.max_read_chars, policy.max_read_chars);

    let resolved = policy::resolve_existing_path(&input, &policy)?;
    let target = &resolved.absolute_path;
    let format = OfficeFormat::from_path(target).ok_or_else(|| {
        ToolError::bad_request(format!(
            "expected a .docx, .xlsx or .pptx file: {}",
            target.display()
        ))
    })?;

    let content = extract_office_text(target, format)?;
    let total_chars = content.chars().count();
    let (returned, truncated) = truncate_chars(&content, max_chars);
    let returned_chars = returned.chars().count();

    Ok(ToolOutcome::new(
        format!(
            "Extracted {returned_chars} of {total_chars} chars from {} ({})",
            target.display(),
            format.label()
        ),
        json!({
            "path": target.display().to_string(),
            "format": format.label(),
            "truncated": truncated,
            "totalChars": total_chars,
            "returnedChars": returned_chars,
            "content": returned,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn config_for(root: &Path) -> RuntimeConfig {
        RuntimeConfig::from_pairs([(
            "LOCAL_FILE_ALLOWED_ROOTS",
            root.display().to_string(),
        )])
    }

    fn args(value: Value) -> Args {
        value.as_object().cloned().unwrap()
    }

    fn write_archive(path: &Path, parts: &[(&str, &str)]) {
        let file = std::fs::File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        for (name, body) in parts {
            writer.start_file(*name, options).unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    #[tokio::test]
    async fn test_docx_paragraph_text() {
        let dir = tempfile::tempdir().unwrap();
        write_archive(
            &dir.path().join("doc.docx"),
            &[(
                "word/document.xml",
                r#"<w:document><w:body>
                    <w:p><w:r><w:t>first line</w:t></w:r></w:p>
                    <w:p><w:r><w:t>second &amp; third</w:t></w:r></w:p>
                </w:body></w:document>"#,
            )],
        );

        let config = config_for(dir.path());
        let outcome = read_office_file(&args(json!({ "path": "doc.docx" })), &config)
            .await
            .unwrap();
        assert_eq!(outcome.data["format"], "docx");
        let content = outcome.data["content"].as_str().unwrap();
        assert!(content.contains("first line"));
        assert!(content.contains("second & third"));
    }

    #[tokio::test]
    async fn test_xlsx_shared_strings() {
        let dir = tempfile::tempdir().unwrap();
        write_archive(
            &dir.path().join("book.xlsx"),
            &[(
                "xl/sharedStrings.xml",
                r#"<sst><si><t>revenue</t></si><si><t>cost</t></si></sst>"#,
            )],
        );

        let config = config_for(dir.path());
        let outcome = read_office_file(&args(json!({ "path": "book.xlsx" })), &config)
            .await
            .unwrap();
        assert_eq!(outcome.data["format"], "xlsx");
        let content = outcome.data["content"].as_str().unwrap();
        assert!(content.contains("revenue"));
        assert!(content.contains("cost"));
    }

    #[tokio::test]
    async fn test_pptx_slides_in_order() {
        let dir = tempfile::tempdir().unwrap();
        write_archive(
            &dir.path().join("deck.pptx"),
            &[
                (
                    "ppt/slides/slide1.xml",
                    r#"<p:sld><a:p><a:r><a:t>intro</a:t></a:r></a:p></p:sld>"#,
                ),
                (
                    "ppt/slides/slide2.xml",
                    r#"<p:sld><a:p><a:r><a:t>conclusion</a:t></a:r></a:p></p:sld>"#,
                ),
            ],
        );

        let config = config_for(dir.path());
        let outcome = read_office_file(&args(json!({ "path": "deck.pptx" })), &config)
            .await
            .unwrap();
        assert_eq!(outcome.data["format"], "pptx");
        let content = outcome.data["content"].as_str().unwrap();
        let intro = content.find("intro").unwrap();
        let conclusion = content.find("conclusion").unwrap();
        assert!(intro < conclusion);
    }

    #[tokio::test]
    async fn test_unknown_extension_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("doc.odt"), "x").unwrap();

        let config = config_for(dir.path());
        let err = read_office_file(&args(json!({ "path": "doc.odt" })), &config)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::BadRequest);
    }

    #[tokio::test]
    async fn test_not_a_zip_is_unsupported_content() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("doc.docx"), "plain text, not a zip").unwrap();

        let config = config_for(dir.path());
        let err = read_office_file(&args(json!({ "path": "doc.docx" })), &config)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::UnsupportedContent);
    }

    #[tokio::test]
    async fn test_truncates_long_content() {
        let dir = tempfile::tempdir().unwrap();
        let body = "x".repeat(2000);
        write_archive(
            &dir.path().join("doc.docx"),
            &[(
                "word/document.xml",
                &format!("<w:document><w:body><w:p><w:r><w:t>{body}</w:t></w:r></w:p></w:body></w:document>"),
            )],
        );

        let config = config_for(dir.path());
        let outcome = read_office_file(
            &args(json!({ "path": "doc.docx", "max_chars": 500 })),
            &config,
        )
        .await
        .unwrap();
        assert_eq!(outcome.data["truncated"], true);
        assert_eq!(outcome.data["returnedChars"], 500);
    }
}
