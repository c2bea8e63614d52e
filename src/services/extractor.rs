// src/services/extractor.rs

//! Group page extractor.
//!
//! Turns a portal search page into a [`GroupRecord`]. Each field is resolved
//! through an ordered chain of lookups where the first non-empty result wins;
//! missing markup degrades to defaults instead of failing.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::error::{AppError, Result};
use crate::models::{DEFAULT_FORM_TRAINING, DEFAULT_INSTITUTION, GroupRecord, Student};
use crate::utils::{first_number, last_path_segment, leading_int, normalize_whitespace};

/// Header fragments marking a roster table (compared lowercase).
const ROSTER_HEADER_MARKERS: [&str; 4] = ["№", "п/п", "фио", "фам"];

/// Status assigned to students recovered from free text.
const FREE_TEXT_STATUS: &str = "СТ";

/// Metadata values as found on the page, before defaults are applied.
#[derive(Debug, Default)]
struct GroupMetadata {
    year_receipt: Option<String>,
    course: Option<String>,
    direction: Option<String>,
    profile: Option<String>,
    institution: Option<String>,
    form_training: Option<String>,
}

/// Extracts group metadata and rosters from portal HTML.
pub struct GroupExtractor {
    group_heading: Selector,
    any_heading: Selector,
    main_content: Selector,
    alt_content: Selector,
    body: Selector,
    metadata_items: Selector,
    table: Selector,
    header_cell: Selector,
    row: Selector,
    cell: Selector,
    anchor: Selector,
    text_blocks: Selector,
    year_re: Regex,
    course_re: Regex,
    direction_full_re: Regex,
    direction_re: Regex,
    profile_re: Regex,
    institution_re: Regex,
    form_re: Regex,
    specialty_code_re: Regex,
    free_text_student_re: Regex,
}

impl GroupExtractor {
    /// Compile the selectors and patterns used for extraction.
    pub fn new() -> Result<Self> {
        Ok(Self {
            group_heading: Self::parse_selector("h3")?,
            any_heading: Self::parse_selector("h3, h2, h1")?,
            main_content: Self::parse_selector("#npe_instance_2500_npe_content")?,
            alt_content: Self::parse_selector(".block_content.content, .block2, .col_element")?,
            body: Self::parse_selector("body")?,
            metadata_items: Self::parse_selector("ul li, ol li, div")?,
            table: Self::parse_selector("table")?,
            header_cell: Self::parse_selector("th")?,
            row: Self::parse_selector("tr")?,
            cell: Self::parse_selector("td")?,
            anchor: Self::parse_selector("a")?,
            text_blocks: Self::parse_selector("div, span")?,
            year_re: Regex::new(r"Год поступления[:\s]*(\d{4})")?,
            course_re: Regex::new(r"Курс[:\s]*(\d+)")?,
            direction_full_re: Regex::new(r"Направление\s*\(специальность\)[:\s]*")?,
            direction_re: Regex::new(r"Направление[:\s]*")?,
            profile_re: Regex::new(r"Профиль[:\s]*")?,
            institution_re: Regex::new(r"Институт[:\s]*")?,
            form_re: Regex::new(r"Форма обучения[:\s]*")?,
            specialty_code_re: Regex::new(r"\d{2}\.\d{2}\.\d{2}")?,
            free_text_student_re: Regex::new(
                r"^(\d+)\.\s+([А-ЯЁ][а-яё]+\s+[А-ЯЁ][а-яё]+(?:\s+[А-ЯЁ][а-яё]+)?)",
            )?,
        })
    }

    /// Extract the group identified by `group_id` from `html`.
    ///
    /// Returns `None` when the page does not show that group.
    pub fn extract(&self, html: &str, group_id: &str) -> Option<GroupRecord> {
        let document = Html::parse_document(html);

        if !self.has_group_heading(&document, group_id) {
            log::warn!("Group {} not found on page", group_id);
            return None;
        }

        let block = self.content_block(&document);
        let metadata = self.metadata(block);
        let students = self
            .roster_from_tables(block)
            .or_else(|| self.roster_from_text(block))
            .unwrap_or_default();

        let course = match first_number(metadata.course.as_deref().unwrap_or("")) {
            0 => course_from_group_id(group_id),
            course => course,
        };

        let direction = metadata
            .direction
            .filter(|d| !d.is_empty())
            .or_else(|| self.specialty_code(block))
            .unwrap_or_default();

        Some(GroupRecord {
            number: group_id
                .trim()
                .parse()
                .ok()
                .or_else(|| leading_int(group_id))
                .unwrap_or(0),
            count_student: students.len(),
            year_receipt: first_number(metadata.year_receipt.as_deref().unwrap_or("")),
            course,
            direction,
            profile: metadata.profile.unwrap_or_default(),
            institution: non_empty_or(metadata.institution, DEFAULT_INSTITUTION),
            form_training: non_empty_or(metadata.form_training, DEFAULT_FORM_TRAINING),
            students,
        })
    }

    fn has_group_heading(&self, document: &Html, group_id: &str) -> bool {
        document
            .select(&self.group_heading)
            .any(|h| element_text(h).contains("Группа:"))
            || document
                .select(&self.any_heading)
                .any(|h| element_text(h).contains(group_id))
    }

    fn content_block<'a>(&self, document: &'a Html) -> ElementRef<'a> {
        document
            .select(&self.main_content)
            .next()
            .or_else(|| document.select(&self.alt_content).next())
            .or_else(|| document.select(&self.body).next())
            .unwrap_or_else(|| document.root_element())
    }

    /// Scan list items and label-bearing divs; later matches win.
    fn metadata(&self, block: ElementRef<'_>) -> GroupMetadata {
        let mut metadata = GroupMetadata::default();

        for element in block.select(&self.metadata_items) {
            let text = element_text(element);
            if element.value().name() == "div"
                && !(text.contains("Год поступления") || text.contains("Курс:"))
            {
                continue;
            }
            self.apply_metadata_line(&text, &mut metadata);
        }

        metadata
    }

    fn apply_metadata_line(&self, text: &str, metadata: &mut GroupMetadata) {
        if text.contains("Год поступления") {
            metadata.year_receipt = Some(capture(&self.year_re, text));
        } else if text.contains("Курс") {
            metadata.course = Some(capture(&self.course_re, text));
        } else if text.contains("Направление") || text.contains("специальность") {
            let stripped = self.direction_full_re.replace(text, "");
            let stripped = self.direction_re.replace(&stripped, "");
            metadata.direction = Some(stripped.trim().to_string());
        } else if text.contains("Профиль") {
            metadata.profile = Some(strip_label(&self.profile_re, text));
        } else if text.contains("Институт") {
            metadata.institution = Some(strip_label(&self.institution_re, text));
        } else if text.contains("Форма обучения") {
            metadata.form_training = Some(strip_label(&self.form_re, text));
        }
    }

    fn specialty_code(&self, block: ElementRef<'_>) -> Option<String> {
        let text: String = block.text().collect();
        self.specialty_code_re
            .find(&text)
            .map(|m| m.as_str().to_string())
    }

    /// Students from the first roster table that yields any.
    fn roster_from_tables(&self, block: ElementRef<'_>) -> Option<Vec<Student>> {
        block
            .select(&self.table)
            .filter(|table| self.is_roster_table(*table))
            .map(|table| self.roster_from_table(table))
            .find(|students| !students.is_empty())
    }

    fn is_roster_table(&self, table: ElementRef<'_>) -> bool {
        table.select(&self.header_cell).any(|th| {
            let header = element_text(th).to_lowercase();
            ROSTER_HEADER_MARKERS.iter().any(|m| header.contains(m))
        })
    }

    fn roster_from_table(&self, table: ElementRef<'_>) -> Vec<Student> {
        let mut students = Vec::new();

        for (row_index, row) in table.select(&self.row).enumerate().skip(1) {
            let cells: Vec<ElementRef<'_>> = row.select(&self.cell).collect();
            if cells.len() < 3 {
                continue;
            }

            let number = leading_int(&element_text(cells[0]))
                .filter(|n| *n != 0)
                .unwrap_or(row_index as u32);

            let (name, person_id) = match cells[1].select(&self.anchor).next() {
                Some(link) => (
                    normalize_whitespace(&element_text(link)),
                    last_path_segment(link.value().attr("href").unwrap_or("")),
                ),
                None => (normalize_whitespace(&element_text(cells[1])), String::new()),
            };

            if name.chars().count() <= 2 {
                continue;
            }

            push_unique(
                &mut students,
                Student {
                    number,
                    name,
                    status: element_text(cells[2]),
                    person_id,
                },
            );
        }

        students
    }

    /// Students listed as `"<n>. <Surname Name [Patronymic]>"` text.
    fn roster_from_text(&self, block: ElementRef<'_>) -> Option<Vec<Student>> {
        let mut students = Vec::new();

        for element in block.select(&self.text_blocks) {
            let text = element_text(element);
            let Some(caps) = self.free_text_student_re.captures(&text) else {
                continue;
            };
            let number = caps[1].parse().unwrap_or(0);
            push_unique(
                &mut students,
                Student {
                    number,
                    name: caps[2].to_string(),
                    status: FREE_TEXT_STATUS.to_string(),
                    person_id: String::new(),
                },
            );
        }

        (!students.is_empty()).then_some(students)
    }

    fn parse_selector(s: &str) -> Result<Selector> {
        Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
    }
}

/// Derive the course from a 4-digit group number's leading digit.
///
/// Group numbers count down with the year of study: `5xxx` is first year,
/// `1xxx` fifth. Anything else is 0.
pub fn course_from_group_id(group_id: &str) -> u32 {
    if group_id.chars().count() != 4 {
        return 0;
    }
    match group_id.chars().next() {
        Some('5') => 1,
        Some('4') => 2,
        Some('3') => 3,
        Some('2') => 4,
        Some('1') => 5,
        _ => 0,
    }
}

/// Append unless a student with the same name or non-empty id is present.
///
/// Linear scan; rosters hold a few dozen rows.
fn push_unique(students: &mut Vec<Student>, student: Student) {
    let duplicate = students.iter().any(|s| {
        s.name == student.name || (!student.person_id.is_empty() && s.person_id == student.person_id)
    });
    if !duplicate {
        students.push(student);
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn capture(re: &Regex, text: &str) -> String {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

fn strip_label(re: &Regex, text: &str) -> String {
    re.replace(text, "").trim().to_string()
}

fn non_empty_or(value: Option<String>, default: &str) -> String {
    value
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}
