//! Resume segmentation: headings split the text into sections, and each section is split
//! into entries (jobs, degrees, projects, paragraphs) that become the retrieval chunks.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Summary,
    Experience,
    Education,
    Projects,
    Skills,
    Certifications,
    Achievements,
    Publications,
}

impl Section {
    const HEADINGS: [(Section, &'static [&'static str]); 8] = [
        (Section::Summary, &["summary", "profile", "objective", "about"]),
        (
            Section::Experience,
            &["work experience", "experience", "employment", "work history", "career"],
        ),
        (
            Section::Education,
            &["education", "academic", "qualifications", "degrees"],
        ),
        (Section::Projects, &["projects", "project", "portfolio"]),
        (
            Section::Skills,
            &["technical skills", "skills", "competencies", "expertise"],
        ),
        (
            Section::Certifications,
            &["certifications", "certificates", "certification"],
        ),
        (
            Section::Achievements,
            &["achievements", "awards", "honors", "accomplishments"],
        ),
        (Section::Publications, &["publications", "papers", "research"]),
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Section::Summary => "summary",
            Section::Experience => "experience",
            Section::Education => "education",
            Section::Projects => "projects",
            Section::Skills => "skills",
            Section::Certifications => "certifications",
            Section::Achievements => "achievements",
            Section::Publications => "publications",
        }
    }

    /// A heading is a short line that starts with one of the section keywords,
    /// e.g. `EXPERIENCE`, `Technical Skills:`, `Projects -`.
    fn from_heading(line: &str) -> Option<Section> {
        let trimmed = line
            .trim()
            .trim_end_matches([':', '-', '|'])
            .trim()
            .to_lowercase();
        if trimmed.is_empty() || trimmed.len() > 40 {
            return None;
        }
        Self::HEADINGS.iter().find_map(|(section, keywords)| {
            keywords
                .iter()
                .any(|k| {
                    trimmed == *k
                        || (trimmed.starts_with(k) && trimmed.len() <= k.len() + 20)
                })
                .then_some(*section)
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResumeSection {
    pub section: Section,
    pub content: String,
}

/// Splits resume text into sections in document order. Text before the first heading is
/// treated as the summary. A repeated heading appends to the earlier section.
pub fn identify_sections(text: &str) -> Vec<ResumeSection> {
    let mut sections: Vec<ResumeSection> = Vec::new();
    let mut current: Option<Section> = None;
    let mut buffer: Vec<&str> = Vec::new();

    for line in text.lines() {
        if let Some(section) = Section::from_heading(line) {
            flush(&mut sections, current, &buffer);
            buffer.clear();
            current = Some(section);
            continue;
        }
        if current.is_none() && !line.trim().is_empty() {
            current = Some(Section::Summary);
        }
        if current.is_some() {
            buffer.push(line.trim());
        }
    }
    flush(&mut sections, current, &buffer);
    sections
}

fn flush(sections: &mut Vec<ResumeSection>, current: Option<Section>, lines: &[&str]) {
    let Some(section) = current else { return };
    let content = lines.join("\n").trim().to_string();
    if content.is_empty() {
        return;
    }
    match sections.iter_mut().find(|s| s.section == section) {
        Some(existing) => {
            existing.content.push_str("\n\n");
            existing.content.push_str(&content);
        }
        None => sections.push(ResumeSection { section, content }),
    }
}

fn date_pattern() -> &'static Regex {
    static DATE_RE: OnceLock<Regex> = OnceLock::new();
    DATE_RE.get_or_init(|| {
        Regex::new(r"\b(19|20)\d{2}\b|\b\d{1,2}[/-]\d{4}\b").expect("date pattern is valid")
    })
}

const BULLETS: [char; 4] = ['-', '*', '•', '●'];

fn is_bullet(line: &str) -> bool {
    line.starts_with(BULLETS)
}

/// Splits a section body into independent entries.
pub fn split_entries(section: Section, content: &str) -> Vec<String> {
    let entries = match section {
        Section::Experience => split_on(content, |line| {
            date_pattern().is_match(line) && line.len() < 60 && !is_bullet(line)
        }),
        Section::Education => split_on(content, |line| {
            let lower = line.to_lowercase();
            lower.starts_with("bachelor")
                || lower.starts_with("master")
                || lower.starts_with("phd")
                || lower.starts_with("doctorate")
                || ["university", "college", "institute"]
                    .iter()
                    .any(|w| lower.contains(w))
        }),
        _ => split_paragraphs(content),
    };

    if entries.is_empty() && !content.trim().is_empty() {
        return vec![content.trim().to_string()];
    }
    entries
}

/// Starts a new entry at each blank line and at every line `starts_entry` accepts.
fn split_on(content: &str, starts_entry: impl Fn(&str) -> bool) -> Vec<String> {
    let mut entries = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in content.lines().map(str::trim) {
        if line.is_empty() {
            push_entry(&mut entries, &mut current);
            continue;
        }
        if !current.is_empty() && starts_entry(line) {
            push_entry(&mut entries, &mut current);
        }
        current.push(line);
    }
    push_entry(&mut entries, &mut current);
    entries
}

fn push_entry(entries: &mut Vec<String>, current: &mut Vec<&str>) {
    if !current.is_empty() {
        entries.push(current.join("\n"));
        current.clear();
    }
}

/// Paragraphs first; a single paragraph is split into its bullet or long lines instead.
fn split_paragraphs(content: &str) -> Vec<String> {
    let paragraphs: Vec<String> = content
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();
    if paragraphs.len() != 1 {
        return paragraphs;
    }

    let lines: Vec<String> = paragraphs[0]
        .lines()
        .map(str::trim)
        .filter(|l| is_bullet(l) || l.len() > 20)
        .map(|l| l.trim_start_matches(BULLETS).trim().to_string())
        .filter(|l| !l.is_empty())
        .collect();
    if lines.len() > 1 {
        lines
    } else {
        paragraphs
    }
}
