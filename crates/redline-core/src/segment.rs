//! Clause segmentation: turns an ordered paragraph list into substantive clauses.
//!
//! # Pipeline per paragraph
//!
//! 1. Appendix boundary: latches the segmenter into discard mode for the
//!    rest of the document.
//! 2. Boilerplate (signature blocks, recitals, underscores): dropped.
//! 3. Section header: updates the running section; an inline remainder of
//!    40+ chars continues as clause text.
//! 4. Definitions section, definition line, preamble, under 35 chars: dropped.
//! 5. Continuation merge: short following paragraphs (< 40 chars) are
//!    absorbed into the clause.
//! 6. Emit when the merged text is at least 40 chars.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::{Clause, ClauseSource, Paragraph};

/// Paragraphs shorter than this are dropped before merging.
pub const MIN_PARAGRAPH_CHARS: usize = 35;
/// Minimum clause length; also the continuation-merge cutoff.
pub const MIN_CLAUSE_CHARS: usize = 40;

const MAX_HEADER_CHARS: usize = 100;
const MAX_HEADER_WORDS: usize = 15;

/// Verbs that mark a line as an operative sentence rather than a header label.
const CLAUSE_VERBS: &[&str] = &[
    "shall",
    "will",
    "must",
    "may",
    "agrees",
    "acknowledges",
    "warrants",
    "represents",
    "confirms",
    "ensures",
    "undertakes",
];

const DEFINITION_SECTIONS: &[&str] = &["definition", "defined term", "interpretation"];

const PREAMBLE_PHRASES: &[&str] = &[
    "this data processing agreement",
    "the dpa shall form",
    "entering into this dpa",
    "in the event of inconsistencies",
    "the parties have agreed",
    "order of priority shall be",
    "hereinafter referred to",
    "referred to individually as",
    "seek to implement a data processing",
    "wish to lay down their rights",
    "in consideration of the mutual covenants",
];

/// Exhibit labels that look like attachments but precede operative text.
const NON_BOUNDARY_EXHIBITS: &[&str] = &["EXHIBIT A", "EXHIBIT B", "EXHIBIT C"];

static BOILERPLATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(^IN WITNESS WHEREOF|^WHEREAS\b|^NOW,?\s*THEREFORE|^Sign\s*:|^Signed?\s*:|_{5,})",
    )
    .expect("boilerplate pattern")
});

static DEFINITION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)^\s*["\x{201C}\x{2018}][^"\x{201D}\x{2019}]+["\x{201D}\x{2019}]\s*(,\s*["\x{201C}\x{2018}][^"\x{201D}\x{2019}]+["\x{201D}\x{2019}]\s*)*(means|shall\s+mean|shall\s+have)"#,
    )
    .expect("definition pattern")
});

static NUMBERED_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^(\d{1,3}\.?\s+)?([A-Z][A-Za-z,;/&\s()'-]+?)\.\s*(.*)")
        .expect("numbered header pattern")
});

static APPENDIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(APPENDIX|ANNEX|ATTACHMENT)\s").expect("appendix pattern"));

static SCHEDULE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(STANDARD CONTRACTUAL|LIST OF SUB-?PROCESSORS|TECHNICAL AND ORGANI[SZ]ATIONAL|DESCRIPTION OF TECHNICAL)",
    )
    .expect("schedule pattern")
});

/// A recognised section header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    /// Text following the header label on the same line (may be empty).
    pub remainder: String,
}

/// Segment a document's paragraphs into clauses.
///
/// Never fails: a document without recognisable structure degrades to flat
/// clause extraction, and an empty paragraph list yields no clauses.
pub fn segment(paragraphs: &[Paragraph], source: ClauseSource) -> Vec<Clause> {
    let mut clauses = Vec::new();
    let mut section = String::new();
    let mut in_appendix = false;
    let mut in_definitions = false;
    let mut i = 0;

    while i < paragraphs.len() {
        let para = &paragraphs[i];
        i += 1;

        if is_appendix_boundary(&para.text) {
            in_appendix = true;
            continue;
        }
        if in_appendix || is_boilerplate(&para.text) {
            continue;
        }

        let mut text = para.text.clone();
        if let Some(header) = parse_section_header(&text) {
            in_definitions = is_definitions_section(&header.name);
            section = header.name;
            if char_len(&header.remainder) < MIN_CLAUSE_CHARS {
                continue;
            }
            text = header.remainder;
        }

        if in_definitions
            || is_definition(&text)
            || is_preamble(&text)
            || char_len(&text) < MIN_PARAGRAPH_CHARS
        {
            continue;
        }

        let mut merged = text;
        let mut end_offset = para.end_offset;
        while let Some(next) = paragraphs.get(i) {
            if !is_continuation(&next.text) {
                break;
            }
            merged.push(' ');
            merged.push_str(&next.text);
            end_offset = next.end_offset;
            i += 1;
        }

        if char_len(&merged) >= MIN_CLAUSE_CHARS {
            clauses.push(Clause {
                id: format!("{}_{}", source.as_str(), clauses.len() + 1),
                text: merged,
                section: section.clone(),
                source,
                start_offset: para.start_offset,
                end_offset,
                raw_text: para.text.clone(),
            });
        }
    }

    tracing::debug!(
        source = source.as_str(),
        paragraphs = paragraphs.len(),
        clauses = clauses.len(),
        "segmented document"
    );
    clauses
}

/// A short paragraph that continues the preceding clause.
fn is_continuation(text: &str) -> bool {
    char_len(text) < MIN_CLAUSE_CHARS
        && !is_boilerplate(text)
        && !is_appendix_boundary(text)
        && !is_definition(text)
        && parse_section_header(text).is_none()
}

/// Detect a section header.
///
/// Two shapes are recognised:
/// - short all-caps ASCII lines (`"DATA PROTECTION OBLIGATIONS"`), and
/// - `[<n>.] <Label>. <remainder>` where the label reads like a title rather
///   than a sentence (no clause verbs, at most 15 words).
pub fn parse_section_header(text: &str) -> Option<Header> {
    let stripped = text.trim();

    if char_len(stripped) < MAX_HEADER_CHARS
        && stripped.is_ascii()
        && !stripped.bytes().any(|b| b.is_ascii_lowercase())
        && stripped.bytes().any(|b| b.is_ascii_alphabetic())
    {
        return Some(Header {
            name: stripped
                .trim_end_matches(['.', ':', ';', ',', ' '])
                .to_string(),
            remainder: String::new(),
        });
    }

    let caps = NUMBERED_HEADER_RE.captures(stripped)?;
    let label = caps.get(2).map_or("", |m| m.as_str()).trim();
    let remainder = caps.get(3).map_or("", |m| m.as_str()).trim();

    if char_len(label) > MAX_HEADER_CHARS {
        return None;
    }
    let lower = label.to_lowercase();
    let words: Vec<&str> = lower.split_whitespace().collect();
    if words.iter().any(|w| CLAUSE_VERBS.contains(w)) {
        return None;
    }
    if words.len() > MAX_HEADER_WORDS {
        return None;
    }
    Some(Header {
        name: label.to_string(),
        remainder: remainder.to_string(),
    })
}

fn is_definitions_section(name: &str) -> bool {
    let lower = name.to_lowercase();
    DEFINITION_SECTIONS.iter().any(|kw| lower.contains(kw))
}

/// A definition line: `"Term" means ...`, or any text using `shall mean`.
pub fn is_definition(text: &str) -> bool {
    let lower = text.to_lowercase();
    if lower.contains("shall mean") || lower.contains("shall have the meaning") {
        return true;
    }
    DEFINITION_RE.is_match(text)
}

pub fn is_boilerplate(text: &str) -> bool {
    BOILERPLATE_RE.is_match(text)
}

/// Start of appendices, annexes, or attached schedules.
pub fn is_appendix_boundary(text: &str) -> bool {
    let stripped = text.trim();
    if NON_BOUNDARY_EXHIBITS.contains(&stripped.to_uppercase().as_str()) {
        return false;
    }
    APPENDIX_RE.is_match(stripped) || SCHEDULE_RE.is_match(stripped)
}

pub fn is_preamble(text: &str) -> bool {
    let lower = text.to_lowercase();
    PREAMBLE_PHRASES.iter().any(|p| lower.contains(p))
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build paragraphs with contiguous offsets (one separator char between).
    fn paras(texts: &[&str]) -> Vec<Paragraph> {
        let mut offset = 0;
        texts
            .iter()
            .map(|t| {
                let len = t.chars().count();
                let p = Paragraph::new(*t, offset, offset + len);
                offset += len + 1;
                p
            })
            .collect()
    }

    const AUDIT: &str =
        "The Processor shall make available all information necessary to demonstrate compliance.";
    const DELETION: &str =
        "Upon termination the Processor shall delete all Personal Data within thirty days.";

    #[test]
    fn empty_input_yields_no_clauses() {
        assert!(segment(&[], ClauseSource::Input).is_empty());
    }

    #[test]
    fn flat_document_keeps_empty_section() {
        let clauses = segment(&paras(&[AUDIT, DELETION]), ClauseSource::Input);
        assert_eq!(clauses.len(), 2);
        assert_eq!(clauses[0].id, "input_1");
        assert_eq!(clauses[1].id, "input_2");
        assert!(clauses.iter().all(|c| c.section.is_empty()));
    }

    #[test]
    fn all_caps_header_sets_section() {
        let clauses = segment(
            &paras(&["AUDIT RIGHTS", AUDIT, "TERMINATION:", DELETION]),
            ClauseSource::Reference,
        );
        assert_eq!(clauses.len(), 2);
        assert_eq!(clauses[0].section, "AUDIT RIGHTS");
        assert_eq!(clauses[0].id, "reference_1");
        assert_eq!(clauses[1].section, "TERMINATION");
    }

    #[test]
    fn header_with_inline_remainder_emits_clause() {
        let text = "Audit Rights. The processor shall permit audits annually by a qualified auditor engaged by the controller.";
        let clauses = segment(&paras(&[text]), ClauseSource::Input);
        assert_eq!(clauses.len(), 1);
        assert_eq!(clauses[0].section, "Audit Rights");
        assert_eq!(
            clauses[0].text,
            "The processor shall permit audits annually by a qualified auditor engaged by the controller."
        );
        assert_eq!(clauses[0].raw_text, text);
    }

    #[test]
    fn numbered_header_with_short_remainder_is_pure_header() {
        let clauses = segment(
            &paras(&["7. Sub-processors. See below.", AUDIT]),
            ClauseSource::Input,
        );
        assert_eq!(clauses.len(), 1);
        assert_eq!(clauses[0].section, "Sub-processors");
        assert_eq!(clauses[0].text, AUDIT);
    }

    #[test]
    fn sentence_with_clause_verb_is_not_header() {
        assert!(parse_section_header(AUDIT).is_none());
        let h = parse_section_header("12. Governing Law. This agreement is governed by English law.")
            .unwrap();
        assert_eq!(h.name, "Governing Law");
        assert_eq!(h.remainder, "This agreement is governed by English law.");
    }

    #[test]
    fn definitions_section_suppressed_until_next_header() {
        let clauses = segment(
            &paras(&[
                "1. DEFINITIONS AND INTERPRETATION",
                "Personal Data covers any information relating to an individual under Article 4(1).",
                "Processing covers any operation performed on personal data under Article 4(2).",
                "2. OBLIGATIONS",
                AUDIT,
            ]),
            ClauseSource::Input,
        );
        assert_eq!(clauses.len(), 1);
        assert_eq!(clauses[0].section, "2. OBLIGATIONS");
    }

    #[test]
    fn definition_lines_dropped_outside_definitions_section() {
        assert!(is_definition(
            "\u{201C}Sub-processor\u{201D} means any processor engaged by the Processor."
        ));
        assert!(is_definition(
            "\"Controller\", \"Processor\" shall have the meanings given in the GDPR."
        ));
        assert!(is_definition("Data shall mean all data supplied by the customer."));
        let clauses = segment(
            &paras(&[
                "\"Services\" means the payroll services provided under the main agreement.",
                AUDIT,
            ]),
            ClauseSource::Input,
        );
        assert_eq!(clauses.len(), 1);
        assert_eq!(clauses[0].text, AUDIT);
    }

    #[test]
    fn boilerplate_and_preamble_dropped() {
        let clauses = segment(
            &paras(&[
                "WHEREAS the Controller wishes to engage the Processor for payroll services;",
                "This Data Processing Agreement forms part of the Master Services Agreement.",
                "IN WITNESS WHEREOF the parties have signed this agreement on the date below.",
                "Signed: ______________________ for and on behalf of the Controller",
                AUDIT,
            ]),
            ClauseSource::Input,
        );
        assert_eq!(clauses.len(), 1);
        assert_eq!(clauses[0].text, AUDIT);
    }

    #[test]
    fn short_paragraphs_dropped() {
        let clauses = segment(
            &paras(&["Too short to be a clause at all.", AUDIT]),
            ClauseSource::Input,
        );
        assert_eq!(clauses.len(), 1);
    }

    #[test]
    fn appendix_latches_discard_mode() {
        let clauses = segment(
            &paras(&[
                AUDIT,
                "APPENDIX 1 - Details of Processing",
                DELETION,
                "5. GENERAL",
                "The Processor shall notify the Controller of any breach without undue delay.",
            ]),
            ClauseSource::Input,
        );
        assert_eq!(clauses.len(), 1);
        assert_eq!(clauses[0].text, AUDIT);
    }

    #[test]
    fn exhibit_labels_are_not_boundaries() {
        assert!(!is_appendix_boundary("Exhibit A"));
        assert!(is_appendix_boundary("Annex II Technical measures"));
        assert!(is_appendix_boundary(
            "Technical and Organizational Measures adopted by the processor"
        ));
        assert!(is_appendix_boundary("List of Subprocessors"));
        let clauses = segment(&paras(&["EXHIBIT A", AUDIT]), ClauseSource::Input);
        assert_eq!(clauses.len(), 1);
        assert_eq!(clauses[0].section, "EXHIBIT A");
    }

    #[test]
    fn continuation_paragraphs_merge() {
        let input = paras(&[
            "The Processor shall implement the following security measures:",
            "(a) encryption at rest;",
            "(b) access logging; and",
            DELETION,
        ]);
        let clauses = segment(&input, ClauseSource::Input);
        assert_eq!(clauses.len(), 2);
        assert_eq!(
            clauses[0].text,
            "The Processor shall implement the following security measures: (a) encryption at rest; (b) access logging; and"
        );
        assert_eq!(clauses[0].start_offset, input[0].start_offset);
        assert_eq!(clauses[0].end_offset, input[2].end_offset);
        assert_eq!(
            clauses[0].raw_text,
            "The Processor shall implement the following security measures:"
        );
        assert_eq!(clauses[1].id, "input_2");
    }

    #[test]
    fn merge_stops_at_header() {
        let clauses = segment(
            &paras(&[
                "The Processor shall implement appropriate security measures.",
                "SECURITY",
                DELETION,
            ]),
            ClauseSource::Input,
        );
        assert_eq!(clauses.len(), 2);
        assert_eq!(
            clauses[0].text,
            "The Processor shall implement appropriate security measures."
        );
        assert_eq!(clauses[1].section, "SECURITY");
    }

    #[test]
    fn below_minimum_after_merge_not_emitted() {
        // Passes the paragraph floor but not the clause floor.
        let text = "Processor keeps logs for 12 months now";
        assert_eq!(text.chars().count(), 38);
        assert!(segment(&paras(&[text]), ClauseSource::Input).is_empty());
    }

    #[test]
    fn segmentation_is_idempotent() {
        let input = paras(&[
            "1. Audit. The Processor shall allow the Controller to audit once per year on notice.",
            "(a) on thirty days notice;",
            "APPENDIX A Processing details",
            DELETION,
        ]);
        let first = segment(&input, ClauseSource::Input);
        let second = segment(&input, ClauseSource::Input);
        assert_eq!(first, second);
        assert_eq!(first.len(), 1);
    }
}
