use std::io::{self, IsTerminal, Write};

use unicode_width::UnicodeWidthStr;

use crate::calendar::{GridCell, LevelThresholds, MAX_LEVEL, Orientation, YearGrid};
use crate::config::Config;
use crate::markdown::TocEntry;
use crate::site::{Article, Project};
use crate::stats::{ProfileSummary, RatingPoint, TagCount, Trend};

const CELL_WIDTH: usize = 2;
const WEEKDAY_LABEL_WIDTH: usize = 4;
const WEEKDAY_LABELS: [&str; 7] = ["Mon", "", "Wed", "", "Fri", "", "Sun"];
const WEEKDAY_HEADERS: [&str; 7] = ["Mo", "Tu", "We", "Th", "Fr", "Sa", "Su"];
const LEVEL_GLYPHS: [&str; MAX_LEVEL as usize + 1] = ["·", "░", "▒", "▓", "█"];
const LEVEL_COLORS: [&str; MAX_LEVEL as usize + 1] = [
    "38;2;208;219;236",
    "38;2;153;201;255",
    "38;2;115;181;255",
    "38;2;77;161;255",
    "38;2;39;141;255",
];
const TAG_PALETTE: [&str; 8] = [
    "38;2;153;201;255",
    "38;2;77;161;255",
    "38;2;0;121;242",
    "38;2;0;82;179",
    "38;2;0;128;179",
    "38;2;77;95;255",
    "38;2;38;51;153",
    "38;2;115;181;255",
];
const TAG_BAR_WIDTH: usize = 24;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> Self {
        let color = cfg.get_bool("color").unwrap_or(true);
        Self {
            color: color && io::stdout().is_terminal(),
        }
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip(self, out, summary), fields(handle = %summary.handle))]
    pub fn write_profile<W: Write>(
        &self,
        out: &mut W,
        summary: &ProfileSummary,
    ) -> anyhow::Result<()> {
        writeln!(out, "{}", self.paint(&format!("Codeforces · {}", summary.handle), "1"))?;
        writeln!(out, "rating        {}", summary.current_rating)?;
        writeln!(out, "max rating    {}", summary.max_rating)?;
        writeln!(out, "contribution  {}", summary.contribution)?;
        writeln!(out, "rank          {}", summary.rank)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, out, points), fields(points = points.len()))]
    pub fn write_ratings<W: Write>(&self, out: &mut W, points: &[RatingPoint]) -> anyhow::Result<()> {
        writeln!(out, "{}", self.paint("Rating history", "1"))?;
        if points.is_empty() {
            writeln!(out, "no rated contests yet")?;
            return Ok(());
        }

        let headers = vec![
            "#".to_string(),
            "Contest".to_string(),
            "Date".to_string(),
            "Rating".to_string(),
            "Change".to_string(),
        ];
        let rows = points
            .iter()
            .enumerate()
            .map(|(idx, point)| {
                let change = format!("{:+}", point.change);
                let change = match point.trend {
                    Trend::Up => self.paint(&change, "32"),
                    Trend::Down => self.paint(&change, "31"),
                };
                vec![
                    (idx + 1).to_string(),
                    point.label.clone(),
                    point
                        .date
                        .map(|date| date.format("%Y-%m-%d").to_string())
                        .unwrap_or_default(),
                    point.rating.to_string(),
                    change,
                ]
            })
            .collect();
        write_table(&mut *out, headers, rows)?;

        if let (Some(low), Some(high)) = (
            points.iter().map(|p| p.rating).min(),
            points.iter().map(|p| p.rating).max(),
        ) {
            writeln!(out, "range {low}..{high} over {} contests", points.len())?;
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, out, tags), fields(tags = tags.len()))]
    pub fn write_tags<W: Write>(&self, out: &mut W, tags: &[TagCount]) -> anyhow::Result<()> {
        writeln!(out, "{}", self.paint("Submissions by tag", "1"))?;
        let total: u64 = tags.iter().map(|t| t.count).sum();
        if total == 0 {
            writeln!(out, "no tagged submissions")?;
            return Ok(());
        }

        let top = tags.first().map(|t| t.count).unwrap_or(1).max(1);
        let headers = vec![
            "Tag".to_string(),
            "Count".to_string(),
            "Share".to_string(),
            String::new(),
        ];
        let rows = tags
            .iter()
            .enumerate()
            .map(|(idx, tag)| {
                let share = tag.count as f64 * 100.0 / total as f64;
                let bar_len = ((tag.count * TAG_BAR_WIDTH as u64).div_ceil(top)) as usize;
                let bar = self.paint(&"█".repeat(bar_len), TAG_PALETTE[idx % TAG_PALETTE.len()]);
                vec![
                    tag.tag.clone(),
                    tag.count.to_string(),
                    format!("{share:.1}%"),
                    bar,
                ]
            })
            .collect();
        write_table(&mut *out, headers, rows)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, out, grid, years), fields(year = grid.year))]
    pub fn write_grid<W: Write>(
        &self,
        out: &mut W,
        title: &str,
        grid: &YearGrid,
        years: &[i32],
    ) -> anyhow::Result<()> {
        writeln!(out, "{}", self.paint(title, "1"))?;
        if !years.is_empty() {
            let choices = years
                .iter()
                .map(|year| {
                    if *year == grid.year {
                        format!("[{year}]")
                    } else {
                        year.to_string()
                    }
                })
                .collect::<Vec<_>>()
                .join(" ");
            writeln!(out, "years: {choices}")?;
        }

        match grid.orientation {
            Orientation::Columns => self.write_grid_columns(out, grid)?,
            Orientation::Rows => self.write_grid_rows(out, grid)?,
        }

        let mut summary = format!(
            "{}: {} contributions on {} days",
            grid.year, grid.stats.total, grid.stats.active_days
        );
        if let Some(busiest) = grid.stats.busiest {
            summary.push_str(&format!(
                " · busiest {} ({})",
                busiest.date.format("%Y-%m-%d"),
                busiest.count
            ));
        }
        if let Some(previous) = grid.stats.previous_month {
            summary.push_str(&format!(" · previous month {previous}"));
        }
        writeln!(out, "{summary}")?;
        writeln!(out, "{}", self.legend(&grid.thresholds))?;
        Ok(())
    }

    pub fn write_grid_json<W: Write>(&self, out: &mut W, grid: &YearGrid) -> anyhow::Result<()> {
        serde_json::to_writer_pretty(&mut *out, grid)?;
        writeln!(out)?;
        Ok(())
    }

    fn write_grid_columns<W: Write>(&self, out: &mut W, grid: &YearGrid) -> anyhow::Result<()> {
        let line_width = grid.week_count() * CELL_WIDTH;
        let mut month_line: Vec<char> = vec![' '; line_width];
        let mut cursor = 0;
        for label in &grid.month_labels {
            let start = (label.week as usize * CELL_WIDTH).max(cursor);
            for (offset, ch) in label.name.chars().enumerate() {
                let pos = start + offset;
                if pos >= month_line.len() {
                    month_line.resize(pos + 1, ' ');
                }
                month_line[pos] = ch;
            }
            cursor = start + label.name.chars().count() + 1;
        }
        let month_line: String = month_line.into_iter().collect();
        writeln!(
            out,
            "{:width$}{}",
            "",
            month_line.trim_end(),
            width = WEEKDAY_LABEL_WIDTH
        )?;

        for (weekday, row) in grid.weekday_rows().into_iter().enumerate() {
            let mut line = format!("{:<width$}", WEEKDAY_LABELS[weekday], width = WEEKDAY_LABEL_WIDTH);
            for cell in row {
                line.push_str(&self.cell(cell));
            }
            writeln!(out, "{}", line.trim_end())?;
        }
        Ok(())
    }

    fn write_grid_rows<W: Write>(&self, out: &mut W, grid: &YearGrid) -> anyhow::Result<()> {
        writeln!(
            out,
            "{:width$}{}",
            "",
            WEEKDAY_HEADERS
                .iter()
                .map(|h| format!("{h:<width$}", width = CELL_WIDTH))
                .collect::<Vec<_>>()
                .join(" "),
            width = WEEKDAY_LABEL_WIDTH
        )?;

        for (week_idx, week) in grid.weeks.iter().enumerate() {
            let label = grid
                .month_labels
                .iter()
                .find(|label| label.week as usize == week_idx)
                .map(|label| label.name)
                .unwrap_or("");
            let mut line = format!("{label:<width$}", width = WEEKDAY_LABEL_WIDTH);
            for cell in week {
                line.push_str(&self.cell(cell));
                line.push(' ');
            }
            writeln!(out, "{}", line.trim_end())?;
        }
        Ok(())
    }

    fn cell(&self, cell: &GridCell) -> String {
        if cell.is_empty() {
            return " ".repeat(CELL_WIDTH);
        }
        let level = (cell.level as usize).min(MAX_LEVEL as usize);
        format!(
            "{} ",
            self.paint(LEVEL_GLYPHS[level], LEVEL_COLORS[level])
        )
    }

    fn legend(&self, thresholds: &LevelThresholds) -> String {
        let bounds = thresholds.bounds();
        let mut parts = vec![format!("{} 0", self.paint(LEVEL_GLYPHS[0], LEVEL_COLORS[0]))];
        for (idx, low) in bounds.iter().enumerate() {
            let level = idx + 1;
            let range = match bounds.get(idx + 1) {
                Some(next) if *next == low + 1 => low.to_string(),
                Some(next) => format!("{low}-{}", next - 1),
                None => format!("{low}+"),
            };
            parts.push(format!(
                "{} {range}",
                self.paint(LEVEL_GLYPHS[level], LEVEL_COLORS[level])
            ));
        }
        format!("legend: {}", parts.join("  "))
    }

    #[tracing::instrument(skip(self, out, article, toc, body), fields(id = %article.id))]
    pub fn write_article<W: Write>(
        &self,
        out: &mut W,
        article: &Article,
        toc: &[TocEntry],
        body: &str,
    ) -> anyhow::Result<()> {
        writeln!(out, "{}", self.paint(article.display_title(), "1"))?;
        let meta = [
            Some(article.date.as_str()).filter(|d| !d.is_empty()),
            article.tag.as_deref(),
            article.read_time.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" · ");
        if !meta.is_empty() {
            writeln!(out, "{meta}")?;
        }

        if !toc.is_empty() {
            writeln!(out)?;
            writeln!(out, "{}", self.paint("Contents", "1"))?;
            for entry in toc {
                let indent = "  ".repeat(entry.level.saturating_sub(2));
                writeln!(out, "{indent}- {} (#{})", entry.text, entry.anchor)?;
            }
        }

        writeln!(out)?;
        writeln!(out, "{}", body.trim_end())?;
        Ok(())
    }

    #[tracing::instrument(skip(self, out, project), fields(id = %project.id))]
    pub fn write_project<W: Write>(&self, out: &mut W, project: &Project) -> anyhow::Result<()> {
        writeln!(out, "{}", self.paint(&project.title, "1"))?;
        writeln!(out, "category    {}", project.category)?;
        writeln!(out, "duration    {}", project.duration)?;
        writeln!(out, "status      {}", project.status)?;
        writeln!(out, "tech stack  {}", project.tech_stack.join(", "))?;
        if let Some(link) = project.link.as_deref().filter(|l| !l.is_empty()) {
            writeln!(out, "project     {link}")?;
        }
        if let Some(github) = project.github.as_deref().filter(|l| !l.is_empty()) {
            writeln!(out, "source      {github}")?;
        }

        writeln!(out)?;
        writeln!(out, "{}", project.description.trim_end())?;
        writeln!(out)?;
        writeln!(out, "{}", self.paint("Challenges", "1"))?;
        writeln!(
            out,
            "{}",
            project
                .challenges
                .as_deref()
                .filter(|c| !c.trim().is_empty())
                .unwrap_or("no notes recorded")
        )?;

        if !project.features.is_empty() {
            writeln!(out)?;
            writeln!(out, "{}", self.paint("Features", "1"))?;
            for feature in &project.features {
                writeln!(out, "- {feature}")?;
            }
        }

        if !project.images.is_empty() {
            writeln!(out)?;
            writeln!(out, "{}", self.paint("Gallery", "1"))?;
            for (idx, image) in project.images.iter().enumerate() {
                let marker = if idx == 0 { "*" } else { " " };
                writeln!(out, "{marker} {}. {image}", idx + 1)?;
            }
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, out, logs), fields(logs = logs.len()))]
    pub fn write_logs<W: Write>(&self, out: &mut W, logs: &[&Article]) -> anyhow::Result<()> {
        writeln!(out, "{}", self.paint("Development log", "1"))?;
        if logs.is_empty() {
            writeln!(out, "no development logs yet")?;
            return Ok(());
        }

        for log in logs {
            writeln!(out, "{}  {}", log.date, self.paint(log.display_title(), "33"))?;
            if let Some(excerpt) = log.excerpt.as_deref().filter(|e| !e.is_empty()) {
                writeln!(out, "    {excerpt}")?;
            }
            if let Some(link) = log.link.as_deref().filter(|l| !l.is_empty()) {
                writeln!(out, "    {link}")?;
            }
        }
        Ok(())
    }

    pub fn write_error<W: Write>(
        &self,
        out: &mut W,
        message: &str,
        detail: Option<&str>,
    ) -> anyhow::Result<()> {
        writeln!(out, "{}", self.paint(&format!("error: {message}"), "31"))?;
        if let Some(detail) = detail {
            writeln!(out, "  {detail}")?;
        }
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    let header_line = headers
        .iter()
        .zip(&widths)
        .map(|(header, width)| format!("{header:width$}"))
        .collect::<Vec<_>>()
        .join(" ");
    writeln!(writer, "{}", header_line.trim_end())?;

    let rule = widths
        .iter()
        .map(|width| "-".repeat(*width))
        .collect::<Vec<_>>()
        .join(" ");
    writeln!(writer, "{rule}")?;

    for row in rows {
        let mut line = String::new();
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            line.push_str(cell);
            line.push_str(&" ".repeat(padding));
            line.push(' ');
        }
        writeln!(writer, "{}", line.trim_end())?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{Renderer, strip_ansi, write_table};
    use crate::activity::DateCountMap;
    use crate::calendar::{GridOptions, LevelThresholds, Orientation, build_year_grid};
    use crate::stats::TagCount;

    fn render<F>(f: F) -> String
    where
        F: FnOnce(&mut Vec<u8>) -> anyhow::Result<()>,
    {
        let mut out = Vec::new();
        f(&mut out).expect("render");
        String::from_utf8(out).expect("utf8 output")
    }

    #[test]
    fn strips_escape_sequences() {
        assert_eq!(strip_ansi("\x1b[31mred\x1b[0m plain"), "red plain");
    }

    #[test]
    fn table_columns_align_on_visible_width() {
        let text = render(|out| {
            write_table(
                out,
                vec!["Tag".to_string(), "Count".to_string()],
                vec![
                    vec!["动态规划".to_string(), "3".to_string()],
                    vec!["\x1b[32mdp\x1b[0m".to_string(), "12".to_string()],
                ],
            )
        });
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Tag      Count");
        assert_eq!(lines[1], "-------- -----");
        assert_eq!(lines[2], "动态规划 3");
        assert_eq!(strip_ansi(lines[3]), "dp       12");
    }

    #[test]
    fn column_grid_has_seven_weekday_lines() {
        let mut counts = DateCountMap::new();
        counts.insert(NaiveDate::from_ymd_opt(2024, 1, 1).expect("date"), 12);
        let grid = build_year_grid(2024, &counts, &GridOptions::default());
        let text = render(|out| Renderer::plain().write_grid(out, "Submissions", &grid, &[2024, 2023]));
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "Submissions");
        assert_eq!(lines[1], "years: [2024] 2023");
        assert!(lines[2].trim_start().starts_with("Jan"));
        assert!(lines[3].starts_with("Mon █"));
        assert!(lines[9].starts_with("Sun"));
        assert_eq!(lines[10], "2024: 12 contributions on 1 days · busiest 2024-01-01 (12)");
        assert_eq!(lines[11], "legend: · 0  ░ 1-3  ▒ 4-6  ▓ 7-9  █ 10+");
    }

    #[test]
    fn row_grid_has_one_line_per_week() {
        let options = GridOptions {
            thresholds: LevelThresholds::capped(),
            orientation: Orientation::Rows,
            ..GridOptions::default()
        };
        let grid = build_year_grid(2023, &DateCountMap::new(), &options).with_previous_month(4);
        let text = render(|out| Renderer::plain().write_grid(out, "Project", &grid, &[]));
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[1], "    Mo Tu We Th Fr Sa Su");
        // 2023-01-01 is a Sunday: six fillers then one dot.
        assert_eq!(lines[2], format!("Jan{}·", " ".repeat(1 + 6 * 3)));
        assert_eq!(lines.len(), 1 + 1 + grid.week_count() + 2);
        assert!(text.contains("previous month 4"));
        assert!(text.contains("legend: · 0  ░ 1  ▒ 2  ▓ 3  █ 4+"));
    }

    #[test]
    fn tags_render_with_share() {
        let tags = vec![
            TagCount {
                tag: "greedy".to_string(),
                count: 3,
            },
            TagCount {
                tag: "math".to_string(),
                count: 1,
            },
        ];
        let text = render(|out| Renderer::plain().write_tags(out, &tags));
        assert!(text.contains("greedy 3     75.0%"));
        assert!(text.contains("math   1     25.0%"));
    }
}
