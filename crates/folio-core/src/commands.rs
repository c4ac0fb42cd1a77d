use std::io::Write;

use anyhow::{Context, anyhow};
use chrono::{Datelike, NaiveDate, Utc};
use tracing::{debug, error, info, instrument};

use crate::calendar::{GridOptions, YearGrid, build_year_grid};
use crate::cli::Invocation;
use crate::codeforces::{ProfileSource, Submission};
use crate::config::Config;
use crate::datetime::{project_timezone, to_project_date};
use crate::markdown::{add_heading_ids, table_of_contents};
use crate::render::Renderer;
use crate::site::{
    Article, Project, Site, article_activity, development_logs, project_year_options,
    related_articles,
};
use crate::stats::{
    ProfileSummary, rating_series, recent_years, submission_activity, tag_distribution,
};

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "dashboard",
        "profile",
        "ratings",
        "tags",
        "calendar",
        "article",
        "project",
        "logs",
        "_commands",
        "_show",
        "help",
        "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[instrument(skip(site, cfg, renderer, source, inv, out))]
pub fn dispatch<W: Write>(
    site: &Site,
    cfg: &Config,
    renderer: &Renderer,
    source: &dyn ProfileSource,
    inv: Invocation,
    out: &mut W,
) -> anyhow::Result<()> {
    let today = to_project_date(Utc::now());
    dispatch_on(site, cfg, renderer, source, inv, out, today)
}

/// Same as [`dispatch`] with "today" pinned, which decides the default year
/// and the previous-month statistic.
#[instrument(skip(site, cfg, renderer, source, inv, out))]
pub fn dispatch_on<W: Write>(
    site: &Site,
    cfg: &Config,
    renderer: &Renderer,
    source: &dyn ProfileSource,
    inv: Invocation,
    out: &mut W,
    today: NaiveDate,
) -> anyhow::Result<()> {
    let command = inv.command.as_str();
    debug!(
        command,
        positional = ?inv.positional,
        options = ?inv.options,
        "dispatching command"
    );

    match command {
        "dashboard" => cmd_dashboard(cfg, renderer, source, &inv, out, today),
        "profile" => cmd_profile(renderer, source, out),
        "ratings" => cmd_ratings(renderer, source, out),
        "tags" => cmd_tags(renderer, source, out),
        "calendar" => cmd_calendar(site, cfg, renderer, source, &inv, out, today),
        "article" => cmd_article(site, renderer, &inv, out),
        "project" => cmd_project(site, cfg, renderer, &inv, out, today),
        "logs" => cmd_logs(site, renderer, &inv, out),
        "_commands" => cmd_commands(out),
        "_show" => cmd_show(cfg, out),
        "help" => cmd_help(out),
        "version" => {
            writeln!(out, "{}", env!("CARGO_PKG_VERSION"))?;
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

/// Runs one fetch. A failure is logged and shown in place of the section
/// instead of aborting the command.
fn fetch_section<T, W, F>(
    renderer: &Renderer,
    out: &mut W,
    section: &str,
    fetch: F,
) -> anyhow::Result<Option<T>>
where
    W: Write,
    F: FnOnce() -> anyhow::Result<T>,
{
    match fetch() {
        Ok(value) => Ok(Some(value)),
        Err(err) => {
            let detail = format!("{err:#}");
            error!(section, error = %detail, "failed to load section");
            renderer.write_error(out, &format!("could not load {section}"), Some(&detail))?;
            Ok(None)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum CalendarSource {
    Codeforces,
    Project(String),
}

impl CalendarSource {
    fn parse(raw: &str) -> anyhow::Result<Self> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("codeforces") || raw.eq_ignore_ascii_case("cf") {
            return Ok(Self::Codeforces);
        }
        match raw.split_once(':') {
            Some((kind, id)) if kind.eq_ignore_ascii_case("project") && !id.trim().is_empty() => {
                Ok(Self::Project(id.trim().to_string()))
            }
            _ => Err(anyhow!(
                "invalid calendar source: {raw} (expected codeforces or project:<id>)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    fn parse(raw: &str) -> anyhow::Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(anyhow!("invalid output format: {other}")),
        }
    }
}

fn requested_year(inv: &Invocation) -> anyhow::Result<Option<i32>> {
    inv.option("year")
        .map(|raw| {
            raw.trim()
                .parse::<i32>()
                .with_context(|| format!("invalid year: {raw}"))
        })
        .transpose()
}

/// Configured calendar options with any `thresholds:`, `weeks:` or
/// `orientation:` arguments applied on top.
fn grid_options(cfg: &Config, inv: &Invocation, for_project: bool) -> anyhow::Result<GridOptions> {
    let mut options = GridOptions::from_config(cfg)?;
    if for_project && let Some(raw) = cfg.get("calendar.project.thresholds") {
        options.thresholds = raw
            .parse()
            .context("invalid calendar.project.thresholds setting")?;
    }
    if let Some(raw) = inv.option("thresholds") {
        options.thresholds = raw.parse()?;
    }
    if let Some(raw) = inv.option("weeks") {
        options.weeks = raw.parse()?;
    }
    if let Some(raw) = inv.option("orientation") {
        options.orientation = raw.parse()?;
    }
    Ok(options)
}

/// The current year and up to `calendar.years - 1` years before it.
fn year_choices(cfg: &Config, today: NaiveDate) -> anyhow::Result<Vec<i32>> {
    let span = cfg.get_u64("calendar.years")?.unwrap_or(5).clamp(1, 50);
    Ok(recent_years(today.year(), span as u32))
}

fn required_id<'a>(inv: &'a Invocation, command: &str) -> anyhow::Result<&'a str> {
    inv.positional
        .first()
        .map(String::as_str)
        .ok_or_else(|| anyhow!("{command} needs an id, e.g. `folio {command} 3`"))
}

fn submission_grid(
    submissions: &[Submission],
    year: i32,
    options: &GridOptions,
    today: NaiveDate,
) -> YearGrid {
    let tz = project_timezone();
    let counts = submission_activity(submissions, tz);
    let previous = crate::activity::previous_month_count(
        submissions.iter().filter_map(|s| s.activity().date(tz)),
        today,
    );
    build_year_grid(year, &counts, options).with_previous_month(previous)
}

fn project_grid(
    project: &Project,
    articles: &[Article],
    year: Option<i32>,
    options: &GridOptions,
    today: NaiveDate,
) -> (YearGrid, Vec<i32>) {
    let related = related_articles(articles, &project.tag);
    let counts = article_activity(&related);
    let (years, default_year) = project_year_options(project, today.year());
    let year = year.unwrap_or(default_year);
    debug!(
        project = %project.id,
        related = related.len(),
        year,
        "building project calendar"
    );
    (build_year_grid(year, &counts, options), years)
}

#[instrument(skip(cfg, renderer, source, inv, out))]
fn cmd_dashboard<W: Write>(
    cfg: &Config,
    renderer: &Renderer,
    source: &dyn ProfileSource,
    inv: &Invocation,
    out: &mut W,
    today: NaiveDate,
) -> anyhow::Result<()> {
    let options = grid_options(cfg, inv, false)?;
    let year = requested_year(inv)?.unwrap_or(today.year());
    info!(handle = source.handle(), year, "building dashboard");

    cmd_profile(renderer, source, out)?;
    writeln!(out)?;
    cmd_ratings(renderer, source, out)?;
    writeln!(out)?;

    let Some(submissions) = fetch_section(renderer, out, "submissions", || source.submissions())?
    else {
        return Ok(());
    };
    renderer.write_tags(out, &tag_distribution(&submissions))?;
    writeln!(out)?;

    let years = year_choices(cfg, today)?;
    let grid = submission_grid(&submissions, year, &options, today);
    renderer.write_grid(
        out,
        &format!("{} · submissions", source.handle()),
        &grid,
        &years,
    )
}

fn cmd_profile<W: Write>(
    renderer: &Renderer,
    source: &dyn ProfileSource,
    out: &mut W,
) -> anyhow::Result<()> {
    if let Some(user) = fetch_section(renderer, out, "profile", || source.user_info())? {
        renderer.write_profile(out, &ProfileSummary::from_user(&user))?;
    }
    Ok(())
}

fn cmd_ratings<W: Write>(
    renderer: &Renderer,
    source: &dyn ProfileSource,
    out: &mut W,
) -> anyhow::Result<()> {
    if let Some(history) =
        fetch_section(renderer, out, "rating history", || source.rating_history())?
    {
        renderer.write_ratings(out, &rating_series(&history, project_timezone()))?;
    }
    Ok(())
}

fn cmd_tags<W: Write>(
    renderer: &Renderer,
    source: &dyn ProfileSource,
    out: &mut W,
) -> anyhow::Result<()> {
    if let Some(submissions) =
        fetch_section(renderer, out, "submissions", || source.submissions())?
    {
        renderer.write_tags(out, &tag_distribution(&submissions))?;
    }
    Ok(())
}

#[instrument(skip(site, cfg, renderer, source, inv, out))]
fn cmd_calendar<W: Write>(
    site: &Site,
    cfg: &Config,
    renderer: &Renderer,
    source: &dyn ProfileSource,
    inv: &Invocation,
    out: &mut W,
    today: NaiveDate,
) -> anyhow::Result<()> {
    let calendar_source = inv
        .option("source")
        .map(CalendarSource::parse)
        .transpose()?
        .unwrap_or(CalendarSource::Codeforces);
    let format = inv
        .option("format")
        .map(OutputFormat::parse)
        .transpose()?
        .unwrap_or(OutputFormat::Text);
    let year = requested_year(inv)?;
    debug!(?calendar_source, ?format, ?year, "calendar request");

    let (grid, years, title) = match calendar_source {
        CalendarSource::Codeforces => {
            let options = grid_options(cfg, inv, false)?;
            let Some(submissions) =
                fetch_section(renderer, out, "submissions", || source.submissions())?
            else {
                return Ok(());
            };
            let years = year_choices(cfg, today)?;
            let grid = submission_grid(
                &submissions,
                year.unwrap_or(today.year()),
                &options,
                today,
            );
            (grid, years, format!("{} · submissions", source.handle()))
        }
        CalendarSource::Project(id) => {
            let options = grid_options(cfg, inv, true)?;
            let Some(found) = fetch_section(renderer, out, "projects", || site.find_project(&id))?
            else {
                return Ok(());
            };
            let project = found.ok_or_else(|| anyhow!("no project with id {id}"))?;
            let Some(articles) =
                fetch_section(renderer, out, "articles", || site.load_articles())?
            else {
                return Ok(());
            };
            let (grid, years) = project_grid(&project, &articles, year, &options, today);
            (grid, years, format!("{} · related writing", project.title))
        }
    };

    match format {
        OutputFormat::Text => renderer.write_grid(out, &title, &grid, &years),
        OutputFormat::Json => renderer.write_grid_json(out, &grid),
    }
}

#[instrument(skip(site, renderer, inv, out))]
fn cmd_article<W: Write>(
    site: &Site,
    renderer: &Renderer,
    inv: &Invocation,
    out: &mut W,
) -> anyhow::Result<()> {
    let id = required_id(inv, "article")?;
    let Some(found) = fetch_section(renderer, out, "articles", || site.find_article(id))? else {
        return Ok(());
    };
    let article = found.ok_or_else(|| anyhow!("no article with id {id}"))?;

    match site.load_markdown(&article) {
        Ok(content) => {
            let toc = table_of_contents(&content)?;
            let body = add_heading_ids(&content)?;
            renderer.write_article(out, &article, &toc, &body)
        }
        Err(err) => {
            let detail = format!("{err:#}");
            error!(id = %article.id, error = %detail, "article content unavailable");
            let tried = site
                .markdown_path(&article)
                .map(|path| format!("tried {}", path.display()))
                .unwrap_or(detail);
            renderer.write_error(
                out,
                &format!("could not load content for {}", article.display_title()),
                Some(&tried),
            )
        }
    }
}

#[instrument(skip(site, cfg, renderer, inv, out))]
fn cmd_project<W: Write>(
    site: &Site,
    cfg: &Config,
    renderer: &Renderer,
    inv: &Invocation,
    out: &mut W,
    today: NaiveDate,
) -> anyhow::Result<()> {
    let id = required_id(inv, "project")?;
    let Some(found) = fetch_section(renderer, out, "projects", || site.find_project(id))? else {
        return Ok(());
    };
    let project = found.ok_or_else(|| anyhow!("no project with id {id}"))?;
    renderer.write_project(out, &project)?;
    writeln!(out)?;

    let Some(articles) = fetch_section(renderer, out, "articles", || site.load_articles())? else {
        return Ok(());
    };
    let options = grid_options(cfg, inv, true)?;
    let (grid, years) = project_grid(&project, &articles, requested_year(inv)?, &options, today);
    renderer.write_grid(out, "Related writing", &grid, &years)?;
    writeln!(out)?;
    renderer.write_logs(out, &development_logs(&articles, &project.tag))
}

#[instrument(skip(site, renderer, inv, out))]
fn cmd_logs<W: Write>(
    site: &Site,
    renderer: &Renderer,
    inv: &Invocation,
    out: &mut W,
) -> anyhow::Result<()> {
    let id = required_id(inv, "logs")?;
    let Some(found) = fetch_section(renderer, out, "projects", || site.find_project(id))? else {
        return Ok(());
    };
    let project = found.ok_or_else(|| anyhow!("no project with id {id}"))?;
    let Some(articles) = fetch_section(renderer, out, "articles", || site.load_articles())? else {
        return Ok(());
    };
    renderer.write_logs(out, &development_logs(&articles, &project.tag))
}

fn cmd_commands<W: Write>(out: &mut W) -> anyhow::Result<()> {
    for command in known_command_names() {
        writeln!(out, "{command}")?;
    }
    Ok(())
}

fn cmd_show<W: Write>(cfg: &Config, out: &mut W) -> anyhow::Result<()> {
    let mut entries: Vec<(&String, &String)> = cfg.iter().collect();
    entries.sort();
    for (k, v) in entries {
        writeln!(out, "{k}={v}")?;
    }
    Ok(())
}

fn cmd_help<W: Write>(out: &mut W) -> anyhow::Result<()> {
    writeln!(
        out,
        "usage: folio [-v|-q] [--site DIR] [--foliorc FILE] [--rc KEY=VALUE] <command> [args]\n\
         \n\
         commands:\n\
         \x20 dashboard                 profile, ratings, tags and submission calendar\n\
         \x20 profile | ratings | tags  one dashboard section\n\
         \x20 calendar [source:codeforces|project:<id>] [year:N] [thresholds:1,4,7,10]\n\
         \x20          [weeks:exact|N] [orientation:columns|rows] [format:text|json]\n\
         \x20 article <id>              article with table of contents\n\
         \x20 project <id>              project details, calendar and development log\n\
         \x20 logs <project-id>         development log for a project\n\
         \x20 version | _commands | _show"
    )?;
    Ok(())
}
