//! Year-long activity calendar.
//!
//! The grid always covers January through December of today's year. Each
//! day cell carries its completion count and a colour bucket; days after
//! today are `NotYet`, days further back than the history window are
//! `Expired`. Aggregation is a pure function of its inputs.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::ledger::CompletedCount;

/// Default number of days before today still rendered with activity colour.
pub const DEFAULT_HISTORY_DAYS: u32 = 365;

const MONTH_LABELS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    None,
    Lightest,
    Light,
    Medium,
    Strong,
    Stronger,
    Strongest,
    NotYet,
    Expired,
}

impl Bucket {
    /// Monotonic step function over a day's completed count.
    pub fn for_count(count: u32) -> Self {
        match count {
            0 => Bucket::None,
            1 => Bucket::Lightest,
            2 => Bucket::Light,
            3 => Bucket::Medium,
            4 => Bucket::Strong,
            5 => Bucket::Stronger,
            _ => Bucket::Strongest,
        }
    }

    pub fn glyph(self) -> char {
        match self {
            Bucket::None => '·',
            Bucket::Lightest => '▁',
            Bucket::Light => '▂',
            Bucket::Medium => '▃',
            Bucket::Strong => '▅',
            Bucket::Stronger => '▆',
            Bucket::Strongest => '█',
            Bucket::NotYet => ' ',
            Bucket::Expired => '-',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayCell {
    pub date: NaiveDate,
    pub completed: u32,
    pub bucket: Bucket,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthGrid {
    pub month: u32,
    pub label: &'static str,
    pub days: Vec<DayCell>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarGrid {
    pub year: i32,
    pub today: NaiveDate,
    pub months: Vec<MonthGrid>,
}

/// Build the calendar for the year containing `today`.
pub fn aggregate(completed: &CompletedCount, today: NaiveDate, history_days: u32) -> CalendarGrid {
    let year = today.year();
    let oldest = today
        .checked_sub_days(chrono::Days::new(u64::from(history_days)))
        .unwrap_or(NaiveDate::MIN);

    let months = (1..=12u32)
        .map(|month| {
            let days = month_days(year, month)
                .map(|date| {
                    let count = completed.get(&date).copied().unwrap_or(0);
                    let bucket = if date > today {
                        Bucket::NotYet
                    } else if date < oldest {
                        Bucket::Expired
                    } else {
                        Bucket::for_count(count)
                    };
                    DayCell {
                        date,
                        completed: count,
                        bucket,
                    }
                })
                .collect();
            MonthGrid {
                month,
                label: MONTH_LABELS[(month - 1) as usize],
                days,
            }
        })
        .collect();

    CalendarGrid {
        year,
        today,
        months,
    }
}

fn month_days(year: i32, month: u32) -> impl Iterator<Item = NaiveDate> {
    let first = NaiveDate::from_ymd_opt(year, month, 1);
    std::iter::successors(first, |date| date.succ_opt()).take_while(move |date| date.month() == month)
}

impl CalendarGrid {
    pub fn cell(&self, date: NaiveDate) -> Option<&DayCell> {
        self.months
            .get(date.month0() as usize)
            .and_then(|month| month.days.get(date.day0() as usize))
            .filter(|cell| cell.date == date)
    }

    /// One line per month: label followed by a glyph per day.
    pub fn render_text(&self) -> String {
        let mut lines = Vec::with_capacity(self.months.len() + 1);
        lines.push(format!("{}", self.year));
        for month in &self.months {
            let glyphs: String = month.days.iter().map(|cell| cell.bucket.glyph()).collect();
            lines.push(format!("{} {}", month.label, glyphs).trim_end().to_string());
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::day::parse_day;

    fn day(raw: &str) -> NaiveDate {
        parse_day(raw).expect("date")
    }

    #[test]
    fn buckets_step_with_count() {
        let expected = [
            Bucket::None,
            Bucket::Lightest,
            Bucket::Light,
            Bucket::Medium,
            Bucket::Strong,
            Bucket::Stronger,
            Bucket::Strongest,
            Bucket::Strongest,
        ];
        for (count, bucket) in expected.iter().enumerate() {
            assert_eq!(Bucket::for_count(count as u32), *bucket);
        }
        assert_eq!(Bucket::for_count(40), Bucket::Strongest);
    }

    #[test]
    fn grid_covers_whole_year() {
        let grid = aggregate(&CompletedCount::new(), day("2024-06-15"), DEFAULT_HISTORY_DAYS);
        assert_eq!(grid.year, 2024);
        assert_eq!(grid.months.len(), 12);
        let lengths: Vec<usize> = grid.months.iter().map(|m| m.days.len()).collect();
        assert_eq!(lengths, vec![31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]);
        assert_eq!(grid.months[11].label, "Dec");

        let grid = aggregate(&CompletedCount::new(), day("2023-06-15"), DEFAULT_HISTORY_DAYS);
        assert_eq!(grid.months[1].days.len(), 28);
    }

    #[test]
    fn future_days_are_not_yet() {
        let today = day("2024-06-15");
        let mut completed = CompletedCount::new();
        completed.insert(today, 3);
        completed.insert(day("2024-06-14"), 7);
        let grid = aggregate(&completed, today, DEFAULT_HISTORY_DAYS);

        let cell = grid.cell(today).expect("today");
        assert_eq!(cell.completed, 3);
        assert_eq!(cell.bucket, Bucket::Medium);
        assert_eq!(grid.cell(day("2024-06-14")).expect("cell").bucket, Bucket::Strongest);
        assert_eq!(grid.cell(day("2024-06-13")).expect("cell").bucket, Bucket::None);
        assert_eq!(grid.cell(day("2024-06-16")).expect("cell").bucket, Bucket::NotYet);
        assert_eq!(grid.cell(day("2024-12-31")).expect("cell").bucket, Bucket::NotYet);
    }

    #[test]
    fn short_history_expires_old_days() {
        let today = day("2024-06-15");
        let grid = aggregate(&CompletedCount::new(), today, 10);
        assert_eq!(grid.cell(day("2024-06-05")).expect("cell").bucket, Bucket::None);
        assert_eq!(grid.cell(day("2024-06-04")).expect("cell").bucket, Bucket::Expired);
    }

    #[test]
    fn aggregation_is_idempotent() {
        let today = day("2024-03-03");
        let completed: CompletedCount = [(day("2024-03-01"), 2), (day("2024-03-03"), 9)]
            .into_iter()
            .collect();
        assert_eq!(
            aggregate(&completed, today, DEFAULT_HISTORY_DAYS),
            aggregate(&completed, today, DEFAULT_HISTORY_DAYS)
        );
    }

    #[test]
    fn render_text_has_a_line_per_month() {
        let today = day("2024-01-02");
        let completed: CompletedCount = [(day("2024-01-01"), 1)].into_iter().collect();
        let text = aggregate(&completed, today, DEFAULT_HISTORY_DAYS).render_text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 13);
        assert_eq!(lines[1], "Jan ▁·");
        assert_eq!(lines[12], "Dec");
    }
}
