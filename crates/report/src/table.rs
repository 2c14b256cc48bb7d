use chrono::{DateTime, Utc};
use fleet_pipeline::GroupSummary;

const HEADER: [&str; 5] = ["Key", "Power State", "Allocated", "Created", "Changed"];
const MISSING: &str = "-";
const TIME_FORMAT: &str = "%d %b %y %H:%M %Z";

/// One rendered line of the report. Every field is pre-formatted.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReportRow {
    /// Group key.
    pub key: String,

    /// Power label.
    pub power_state: String,

    /// Number of running members.
    pub allocated: String,

    /// Creation time.
    pub created: String,

    /// Last change time.
    pub changed: String,
}

impl ReportRow {
    /// Formats a group summary.
    #[must_use]
    pub fn from_summary(summary: &GroupSummary) -> Self {
        Self {
            key: summary.key.clone(),
            power_state: summary.power_state.clone(),
            allocated: summary.allocated.to_string(),
            created: format_time(summary.created_at),
            changed: format_time(summary.last_changed_at),
        }
    }

    fn cells(&self) -> [&str; 5] {
        [
            &self.key,
            &self.power_state,
            &self.allocated,
            &self.created,
            &self.changed,
        ]
    }
}

/// Formats a timestamp as `02 Jan 06 15:04 UTC`, or `-` if absent.
#[must_use]
pub fn format_time(time: Option<DateTime<Utc>>) -> String {
    time.map_or_else(
        || MISSING.to_string(),
        |time| time.format(TIME_FORMAT).to_string(),
    )
}

/// Renders rows as an ASCII table with a header.
#[must_use]
pub fn render_table(rows: &[ReportRow]) -> String {
    let mut widths = HEADER.map(str::len);
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row.cells()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let border = widths
        .iter()
        .map(|width| "-".repeat(width + 2))
        .collect::<Vec<_>>()
        .join("+");
    let border = format!("+{border}+\n");

    let line = |cells: [&str; 5]| {
        let cells = cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!(" {cell:<width$} "))
            .collect::<Vec<_>>()
            .join("|");
        format!("|{cells}|\n")
    };

    let mut table = String::new();
    table.push_str(&border);
    table.push_str(&line(HEADER));
    table.push_str(&border);
    for row in rows {
        table.push_str(&line(row.cells()));
    }
    table.push_str(&border);

    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_time() {
        let time = Utc.with_ymd_and_hms(2006, 1, 2, 15, 4, 5).single();

        assert_eq!(format_time(time), "02 Jan 06 15:04 UTC");
        assert_eq!(format_time(None), "-");
    }

    #[test]
    fn test_from_summary() {
        let summary = GroupSummary {
            key: "search".to_string(),
            power_state: "running".to_string(),
            allocated: 3,
            created_at: Utc.with_ymd_and_hms(2017, 6, 2, 14, 4, 0).single(),
            last_changed_at: None,
            members: Vec::new(),
        };

        let row = ReportRow::from_summary(&summary);

        assert_eq!(row.allocated, "3");
        assert_eq!(row.created, "02 Jun 17 14:04 UTC");
        assert_eq!(row.changed, "-");
    }

    #[test]
    fn test_render_table() {
        let rows = [ReportRow {
            key: "search-team".to_string(),
            power_state: "running".to_string(),
            allocated: "2".to_string(),
            created: "-".to_string(),
            changed: "-".to_string(),
        }];

        let table = render_table(&rows);
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 5);
        assert_eq!(
            lines[1],
            "| Key         | Power State | Allocated | Created | Changed |"
        );
        assert_eq!(
            lines[3],
            "| search-team | running     | 2         | -       | -       |"
        );
        assert!(lines.iter().all(|line| line.len() == lines[0].len()));
    }
}
