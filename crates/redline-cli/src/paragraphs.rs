//! Plain-text and Markdown paragraph reader.
//!
//! Paragraphs are runs of non-blank lines. Wrapped lines are joined with a
//! single space. Offsets are character positions in the original file.

use std::path::Path;

use anyhow::Context;
use redline_core::Paragraph;

pub fn read_paragraphs(path: &Path) -> anyhow::Result<Vec<Paragraph>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    Ok(split_paragraphs(&text))
}

pub fn split_paragraphs(text: &str) -> Vec<Paragraph> {
    let mut out = Vec::new();
    let mut lines: Vec<&str> = Vec::new();
    let mut start = 0;
    let mut end = 0;
    let mut offset = 0;

    for raw in text.split_inclusive('\n') {
        let line = raw.trim_end_matches(['\n', '\r']);
        let content = strip_heading_marker(line.trim());
        if content.is_empty() {
            flush(&mut out, &mut lines, start, end);
        } else {
            if lines.is_empty() {
                start = offset + line.chars().take_while(|c| c.is_whitespace()).count();
            }
            end = offset + line.trim_end().chars().count();
            lines.push(content);
        }
        offset += raw.chars().count();
    }
    flush(&mut out, &mut lines, start, end);
    out
}

fn flush(out: &mut Vec<Paragraph>, lines: &mut Vec<&str>, start: usize, end: usize) {
    if !lines.is_empty() {
        out.push(Paragraph::new(lines.join(" "), start, end));
        lines.clear();
    }
}

/// `## 5. Audit` reads as `5. Audit`.
fn strip_heading_marker(line: &str) -> &str {
    if line.starts_with('#') {
        line.trim_start_matches('#').trim_start()
    } else {
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_lines_separate_paragraphs() {
        let text = "Alpha one\nalpha two\n\n  Beta\n";
        let paras = split_paragraphs(text);
        assert_eq!(paras.len(), 2);
        assert_eq!(paras[0], Paragraph::new("Alpha one alpha two", 0, 19));
        assert_eq!(paras[1], Paragraph::new("Beta", 23, 27));
    }

    #[test]
    fn offsets_index_characters() {
        let text = "Überblick\n\nZweck";
        let paras = split_paragraphs(text);
        let chars: Vec<char> = text.chars().collect();
        for p in &paras {
            let span: String = chars[p.start_offset..p.end_offset].iter().collect();
            assert_eq!(span, p.text);
        }
    }

    #[test]
    fn crlf_and_trailing_blank_lines() {
        let paras = split_paragraphs("First\r\n\r\n\r\nSecond\r\n\r\n");
        assert_eq!(paras.len(), 2);
        assert_eq!(paras[0].text, "First");
        assert_eq!(paras[1].text, "Second");
        assert_eq!(paras[1].start_offset, 11);
    }

    #[test]
    fn markdown_headings_lose_their_markers() {
        let paras = split_paragraphs("## 5. Audit Rights\n\nThe processor shall permit audits.");
        assert_eq!(paras[0].text, "5. Audit Rights");
        assert_eq!(paras[1].text, "The processor shall permit audits.");
    }

    #[test]
    fn empty_input() {
        assert!(split_paragraphs("").is_empty());
        assert!(split_paragraphs("\n\n  \n").is_empty());
    }
}
