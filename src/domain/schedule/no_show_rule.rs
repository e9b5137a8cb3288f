use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};

use crate::errors::CoreError;

/// A daily time range during which an entity is expected to show some activity.
///
/// Days are counted from Monday = 0 and name the day an occurrence starts; a range
/// whose end is before its start runs past midnight into the next day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoShowRule {
    pub entity_key: String,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub days: Vec<u32>,
    pub expected_phrases: Vec<String>,
}

/// One concrete occurrence of a rule, in reference-local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Occurrence {
    pub date: NaiveDate,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl NoShowRule {
    pub fn wraps_midnight(&self) -> bool {
        self.start > self.end
    }

    pub fn runs_on(&self, date: NaiveDate) -> bool {
        self.days.contains(&date.weekday().num_days_from_monday())
    }

    pub fn occurrence_on(&self, date: NaiveDate) -> Option<Occurrence> {
        if !self.runs_on(date) {
            return None;
        }
        let end_date = if self.wraps_midnight() {
            date.succ_opt()?
        } else {
            date
        };
        Some(Occurrence {
            date,
            start: date.and_time(self.start),
            end: end_date.and_time(self.end),
        })
    }

    /// The latest occurrence that has started at or before `local`.
    pub fn latest_occurrence(&self, local: NaiveDateTime) -> Option<Occurrence> {
        let today = local.date();
        [Some(today), today.pred_opt()]
            .into_iter()
            .flatten()
            .filter_map(|d| self.occurrence_on(d))
            .find(|occ| occ.start <= local)
    }

    pub fn is_active(&self, local: NaiveDateTime) -> bool {
        self.latest_occurrence(local)
            .is_some_and(|occ| local <= occ.end)
    }

    pub fn check_time(&self) -> String {
        format!("{}-{}", self.start.format("%H:%M"), self.end.format("%H:%M"))
    }

    pub fn matches(&self, label: &str) -> bool {
        let label = label.to_lowercase();
        self.expected_phrases.iter().any(|p| label.contains(p.as_str()))
    }

    /// Parses `entity | HH:MM | HH:MM | days | phrase, phrase`.
    pub fn parse(line: &str) -> Result<Self, CoreError> {
        let parts: Vec<&str> = line.split('|').map(str::trim).collect();
        let [entity_key, start, end, days, phrases] = parts.as_slice() else {
            return Err(CoreError::InvalidConfig(format!(
                "no-show rule needs 5 '|' separated fields: '{line}'"
            )));
        };

        if entity_key.is_empty() {
            return Err(CoreError::InvalidConfig(format!("no-show rule without entity: '{line}'")));
        }

        let expected_phrases: Vec<String> = phrases
            .split(',')
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        if expected_phrases.is_empty() {
            return Err(CoreError::InvalidConfig(format!(
                "no-show rule without expected phrases: '{line}'"
            )));
        }

        Ok(Self {
            entity_key: entity_key.to_string(),
            start: parse_time(start)?,
            end: parse_time(end)?,
            days: parse_days(days)?,
            expected_phrases,
        })
    }
}

fn parse_time(value: &str) -> Result<NaiveTime, CoreError> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|e| CoreError::InvalidConfig(format!("time '{value}': {e}")))
}

/// `*`, `0-6`, `0-5`, `0,2,4` or any mix of ranges and single days.
fn parse_days(value: &str) -> Result<Vec<u32>, CoreError> {
    let invalid = || CoreError::InvalidConfig(format!("days '{value}'"));
    if value == "*" {
        return Ok((0..7).collect());
    }

    let mut days = Vec::new();
    for part in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (lo, hi) = match part.split_once('-') {
            Some((lo, hi)) => (lo.trim(), hi.trim()),
            None => (part, part),
        };
        let lo: u32 = lo.parse().map_err(|_| invalid())?;
        let hi: u32 = hi.parse().map_err(|_| invalid())?;
        if lo > hi || hi > 6 {
            return Err(invalid());
        }
        for d in lo..=hi {
            if !days.contains(&d) {
                days.push(d);
            }
        }
    }

    if days.is_empty() {
        return Err(invalid());
    }
    days.sort_unstable();
    Ok(days)
}

/// How long after an occurrence ends it may still be reported.
pub fn report_grace() -> Duration {
    Duration::minutes(10)
}
