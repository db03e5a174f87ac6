use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;

/// Parses sale dates written in the shapes seen in store exports.
///
/// Each shape is matched by a regex before the chrono format is applied, so
/// an ambiguous string never falls through to a looser format.
pub struct DateParser {
    patterns: Vec<(Regex, DateShape)>,
}

#[derive(Debug, Clone, Copy)]
enum DateShape {
    Format(&'static str),
    DateTime(&'static str),
    Rfc3339,
}

impl DateParser {
    pub fn new() -> Self {
        let shapes = [
            (r"^\d{4}-\d{1,2}-\d{1,2}$", DateShape::Format("%Y-%m-%d")),
            (r"^\d{4}/\d{1,2}/\d{1,2}$", DateShape::Format("%Y/%m/%d")),
            // Day-first: the source systems are Brazilian.
            (r"^\d{1,2}/\d{1,2}/\d{4}$", DateShape::Format("%d/%m/%Y")),
            (r"^\d{1,2}-\d{1,2}-\d{4}$", DateShape::Format("%d-%m-%Y")),
            (r"^\d{8}$", DateShape::Format("%Y%m%d")),
            (
                r"^\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(\.\d+)?$",
                DateShape::DateTime("%Y-%m-%dT%H:%M:%S%.f"),
            ),
            (
                r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:\d{2})$",
                DateShape::Rfc3339,
            ),
        ];

        let patterns = shapes
            .into_iter()
            .map(|(pattern, shape)| {
                // Patterns are literals above; a failure here is a programming error.
                (Regex::new(pattern).expect("valid date pattern"), shape)
            })
            .collect();

        Self { patterns }
    }

    pub fn parse(&self, value: &str) -> Option<NaiveDate> {
        let value = value.trim();
        let (_, shape) = self.patterns.iter().find(|(re, _)| re.is_match(value))?;

        match shape {
            DateShape::Format(fmt) => NaiveDate::parse_from_str(value, fmt).ok(),
            DateShape::DateTime(fmt) => {
                NaiveDateTime::parse_from_str(&value.replacen(' ', "T", 1), fmt)
                    .ok()
                    .map(|dt| dt.date())
            }
            DateShape::Rfc3339 => DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.date_naive()),
        }
    }
}

impl Default for DateParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Formats the calendar month bucket, always seven characters.
pub fn year_month(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}
