use std::cmp::Reverse;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::activity::{DateCountMap, count_by_date};
use crate::datetime::parse_calendar_date;

/// Record ids appear as JSON numbers or strings; both compare by text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Number(i64),
    Text(String),
}

impl RecordId {
    pub fn matches(&self, wanted: &str) -> bool {
        self.to_string() == wanted.trim()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: RecordId,
    pub title: String,

    /// Display title; `title` also names the markdown file.
    #[serde(default)]
    pub arti_title: Option<String>,

    #[serde(default)]
    pub date: String,

    #[serde(default)]
    pub tag: Option<String>,

    #[serde(default)]
    pub read_time: Option<String>,

    #[serde(default)]
    pub excerpt: Option<String>,

    #[serde(default)]
    pub link: Option<String>,
}

impl Article {
    pub fn display_title(&self) -> &str {
        self.arti_title.as_deref().unwrap_or(&self.title)
    }

    pub fn calendar_date(&self) -> Option<NaiveDate> {
        match parse_calendar_date(&self.date) {
            Ok(date) => Some(date),
            Err(err) => {
                warn!(id = %self.id, date = %self.date, error = %err, "article has unusable date");
                None
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: RecordId,
    pub title: String,

    #[serde(default)]
    pub category: String,

    #[serde(default)]
    pub duration: String,

    #[serde(default)]
    pub status: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub challenges: Option<String>,

    #[serde(default)]
    pub tech_stack: Vec<String>,

    #[serde(default)]
    pub link: Option<String>,

    #[serde(default)]
    pub github: Option<String>,

    #[serde(default)]
    pub images: Vec<String>,

    #[serde(default)]
    pub features: Vec<String>,

    #[serde(default)]
    pub tag: String,

    #[serde(default)]
    pub date: String,
}

impl Project {
    pub fn calendar_date(&self) -> Option<NaiveDate> {
        parse_calendar_date(&self.date).ok()
    }
}

/// Static portfolio content laid out as `data/*.json` plus
/// `articles/<slug>.md` under one root.
#[derive(Debug, Clone)]
pub struct Site {
    pub root: PathBuf,
    pub articles_json: PathBuf,
    pub projects_json: PathBuf,
    pub articles_dir: PathBuf,
}

impl Site {
    pub fn new(root: &Path) -> Self {
        let root = root.to_path_buf();
        let data_dir = root.join("data");
        Self {
            articles_json: data_dir.join("articles.json"),
            projects_json: data_dir.join("projects.json"),
            articles_dir: root.join("articles"),
            root,
        }
    }

    #[tracing::instrument(skip(self))]
    pub fn load_articles(&self) -> anyhow::Result<Vec<Article>> {
        load_json_list(&self.articles_json).context("failed to load articles")
    }

    #[tracing::instrument(skip(self))]
    pub fn load_projects(&self) -> anyhow::Result<Vec<Project>> {
        load_json_list(&self.projects_json).context("failed to load projects")
    }

    #[tracing::instrument(skip(self))]
    pub fn find_article(&self, id: &str) -> anyhow::Result<Option<Article>> {
        let articles = self.load_articles()?;
        Ok(articles.into_iter().find(|article| article.id.matches(id)))
    }

    #[tracing::instrument(skip(self))]
    pub fn find_project(&self, id: &str) -> anyhow::Result<Option<Project>> {
        let projects = self.load_projects()?;
        Ok(projects.into_iter().find(|project| project.id.matches(id)))
    }

    pub fn markdown_path(&self, article: &Article) -> anyhow::Result<PathBuf> {
        Ok(self
            .articles_dir
            .join(format!("{}.md", safe_filename(&article.title)?)))
    }

    #[tracing::instrument(skip(self, article), fields(id = %article.id))]
    pub fn load_markdown(&self, article: &Article) -> anyhow::Result<String> {
        let path = self.markdown_path(article)?;
        debug!(file = %path.display(), "loading article markdown");
        fs::read_to_string(&path)
            .with_context(|| format!("failed to read article content {}", path.display()))
    }
}

/// Lowercase, each whitespace run to `-`, then drop anything outside
/// `[A-Za-z0-9_-]`. Leading and trailing whitespace become `-` too.
pub fn safe_filename(title: &str) -> anyhow::Result<String> {
    let whitespace_re =
        Regex::new(r"\s+").map_err(|e| anyhow!("internal regex compile failure: {e}"))?;
    Ok(whitespace_re
        .replace_all(&title.to_lowercase(), "-")
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric() || *ch == '_' || *ch == '-')
        .collect())
}

/// Articles whose non-empty tag contains the project tag.
pub fn related_articles<'a>(articles: &'a [Article], project_tag: &str) -> Vec<&'a Article> {
    articles
        .iter()
        .filter(|article| {
            article
                .tag
                .as_deref()
                .filter(|tag| !tag.is_empty())
                .is_some_and(|tag| tag.contains(project_tag))
        })
        .collect()
}

/// Articles tagged exactly with the project tag (ignoring case), newest
/// first. Undated entries sort last.
pub fn development_logs<'a>(articles: &'a [Article], project_tag: &str) -> Vec<&'a Article> {
    let wanted = project_tag.to_lowercase();
    let mut logs: Vec<&Article> = articles
        .iter()
        .filter(|article| {
            article
                .tag
                .as_deref()
                .filter(|tag| !tag.is_empty())
                .is_some_and(|tag| tag.to_lowercase() == wanted)
        })
        .collect();
    logs.sort_by_key(|article| Reverse(article.calendar_date()));
    logs
}

/// One contribution per related article, keyed by its date.
pub fn article_activity(articles: &[&Article]) -> DateCountMap {
    count_by_date(articles.iter().filter_map(|article| article.calendar_date()))
}

/// The project's year and its neighbours, oldest first.
pub fn project_year_options(project: &Project, fallback_year: i32) -> (Vec<i32>, i32) {
    let year = project
        .calendar_date()
        .map(|date| date.year())
        .unwrap_or(fallback_year);
    ((year - 1..=year + 1).collect(), year)
}

#[tracing::instrument(skip(path))]
fn load_json_list<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    if !path.exists() {
        return Err(anyhow!("{} does not exist", path.display()));
    }
    let raw =
        fs::read_to_string(path).with_context(|| format!("failed reading {}", path.display()))?;
    let items: Vec<T> = serde_json::from_str(&raw)
        .with_context(|| format!("failed parsing {}", path.display()))?;
    info!(file = %path.display(), count = items.len(), "loaded site data");
    Ok(items)
}
