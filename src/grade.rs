//! Extraction of a structured grade token from free-text feedback.
//!
//! A grade line is any line whose first text, ignoring markdown bold markers,
//! is `Final Grade:` or `Grade:` (case-insensitive). Only the first such line
//! with a non-empty value counts. The value runs to the end of the line and is
//! cut right after its first `)`; words between the leading grade token and
//! that `)` which are not part of a parenthesised qualifier are dropped.
//!
//! | line                          | grade          |
//! |-------------------------------|----------------|
//! | `Final Grade: B+ (87/100)`    | `B+ (87/100)`  |
//! | `Grade: 92/100 extra)`        | `92/100)`      |
//! | `**Final Grade:** A`          | `A`            |
//! | `**Final Grade**: B+`         | `B+`           |

use std::sync::LazyLock;

use regex::Regex;

static GRADE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[ \t]*(?:\*\*)?(?:final[ \t]+)?grade(?:\*\*)?[ \t]*:(?:\*\*)?(.*)$")
        .expect("grade line pattern is valid")
});

/// Returns the normalized grade of the first grade line, or `None` when the
/// feedback carries no grade. A miss is not an error.
pub fn extract_grade(feedback: &str) -> Option<String> {
    feedback.lines().find_map(grade_on_line)
}

/// Removes the first grade line so the grade is not shown twice to a reviewer.
pub fn strip_grade_line(feedback: &str) -> String {
    let mut removed = false;
    let kept: Vec<&str> = feedback
        .lines()
        .filter(|line| {
            if !removed && grade_on_line(line).is_some() {
                removed = true;
                return false;
            }
            true
        })
        .collect();
    kept.join("\n").trim().to_string()
}

fn grade_on_line(line: &str) -> Option<String> {
    let caps = GRADE_LINE.captures(line)?;
    normalize(caps.get(1)?.as_str())
}

fn normalize(raw: &str) -> Option<String> {
    let value = raw.trim().trim_matches('*').trim();
    if value.is_empty() {
        return None;
    }

    let Some(close) = value.find(')') else {
        return Some(value.to_string());
    };
    let head = &value[..=close];

    let (lead, rest) = match head.split_once(char::is_whitespace) {
        Some((lead, rest)) => (lead, rest.trim_start()),
        None => return Some(head.to_string()),
    };
    if lead.contains('(') {
        return Some(head.to_string());
    }
    match rest.find('(') {
        Some(open) => Some(format!("{lead} {}", &rest[open..])),
        None => Some(format!("{lead})")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn final_grade_with_qualifier() {
        let feedback = "Clear argument.\nFinal Grade: B+ (87/100)\nnotes: cite sources";
        assert_eq!(extract_grade(feedback).as_deref(), Some("B+ (87/100)"));
    }

    #[test]
    fn trailing_annotation_is_dropped_before_paren() {
        assert_eq!(
            extract_grade("Grade: 92/100 extra)").as_deref(),
            Some("92/100)")
        );
    }

    #[test]
    fn text_after_first_paren_is_cut() {
        assert_eq!(
            extract_grade("Final Grade: A (95/100) - outstanding (really)").as_deref(),
            Some("A (95/100)")
        );
    }

    #[test]
    fn plain_token_is_kept_whole() {
        assert_eq!(extract_grade("Grade: 85/100").as_deref(), Some("85/100"));
        assert_eq!(extract_grade("grade:   C  ").as_deref(), Some("C"));
    }

    #[test]
    fn markdown_bold_label() {
        assert_eq!(
            extract_grade("**Final Grade:** A-\nThanks").as_deref(),
            Some("A-")
        );
        assert_eq!(extract_grade("**Grade: B**").as_deref(), Some("B"));
    }

    #[test]
    fn bold_label_closed_before_colon() {
        assert_eq!(
            extract_grade("Nice work.\n**Final Grade**: B+ (87/100)").as_deref(),
            Some("B+ (87/100)")
        );
        assert_eq!(
            strip_grade_line("Nice work.\n**Final Grade**: B+ (87/100)"),
            "Nice work."
        );
    }

    #[test]
    fn only_first_match_is_used() {
        let feedback = "Grade: A\nFinal Grade: F";
        assert_eq!(extract_grade(feedback).as_deref(), Some("A"));
    }

    #[test]
    fn empty_value_is_skipped() {
        let feedback = "Final Grade:\nGrade: B";
        assert_eq!(extract_grade(feedback).as_deref(), Some("B"));
    }

    #[test]
    fn label_must_start_the_line() {
        assert_eq!(extract_grade("Your grade: A is tentative"), None);
        assert_eq!(extract_grade("**Grade Recommendation:** 85/100"), None);
    }

    #[test]
    fn no_grade_line_is_none() {
        assert_eq!(extract_grade("Great work overall.\nKeep going."), None);
        assert_eq!(extract_grade(""), None);
    }

    #[test]
    fn crlf_lines() {
        assert_eq!(
            extract_grade("Intro\r\nFinal Grade: A (93/100)\r\n").as_deref(),
            Some("A (93/100)")
        );
    }

    #[test]
    fn strip_removes_only_first_grade_line() {
        let feedback = "Strengths: tidy code\nFinal Grade: B+ (87/100)\nGrade: ignored\n";
        assert_eq!(
            strip_grade_line(feedback),
            "Strengths: tidy code\nGrade: ignored"
        );
    }

    #[test]
    fn strip_without_grade_line_only_trims() {
        assert_eq!(strip_grade_line("\n  Good job.\n"), "Good job.");
    }

    #[test]
    fn strip_then_extract_finds_nothing_for_single_grade() {
        let feedback = "Solid.\nFinal Grade: A";
        let stripped = strip_grade_line(feedback);
        assert_eq!(stripped, "Solid.");
        assert_eq!(extract_grade(&stripped), None);
    }
}
