use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::anyhow;
use chrono::{
  DateTime,
  NaiveDate,
  NaiveDateTime,
  Utc
};
use chrono_tz::Tz;
use serde::Deserialize;

const TIMEZONE_CONFIG_FILE: &str =
  "folio-time.toml";
const TIMEZONE_ENV_VAR: &str =
  "FOLIO_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str =
  "FOLIO_TIME_CONFIG";
const DEFAULT_PROJECT_TIMEZONE: &str =
  "Asia/Shanghai";

const DATE_FORMATS: [&str; 3] = [
  "%Y-%m-%d",
  "%Y/%m/%d",
  "%Y.%m.%d"
];

const DATETIME_FORMATS: [&str; 3] = [
  "%Y-%m-%d %H:%M:%S",
  "%Y-%m-%dT%H:%M:%S",
  "%Y/%m/%d %H:%M"
];

#[derive(Debug, Deserialize)]
struct TimezoneConfig {
  timezone: Option<String>,
  time:     Option<TimezoneSection>
}

#[derive(Debug, Deserialize)]
struct TimezoneSection {
  timezone: Option<String>
}

pub fn project_timezone() -> &'static Tz
{
  static PROJECT_TZ: OnceLock<Tz> =
    OnceLock::new();
  PROJECT_TZ.get_or_init(
    resolve_project_timezone
  )
}

#[must_use]
pub fn to_project_date(
  dt: DateTime<Utc>
) -> NaiveDate {
  dt.with_timezone(project_timezone())
    .date_naive()
}

#[must_use]
pub fn date_in_timezone(
  timestamp: i64,
  tz: &Tz
) -> Option<NaiveDate> {
  DateTime::<Utc>::from_timestamp(
    timestamp, 0
  )
  .map(|dt| {
    dt.with_timezone(tz).date_naive()
  })
}

/// Calendar date of a `YYYY-MM-DD`
/// style string, or of an RFC 3339
/// instant in the project timezone.
#[tracing::instrument(fields(input = input))]
pub fn parse_calendar_date(
  input: &str
) -> anyhow::Result<NaiveDate> {
  let token = input.trim();
  if token.is_empty() {
    return Err(anyhow!(
      "empty date string"
    ));
  }

  for format in DATE_FORMATS {
    if let Ok(date) =
      NaiveDate::parse_from_str(
        token, format
      )
    {
      return Ok(date);
    }
  }

  for format in DATETIME_FORMATS {
    if let Ok(dt) =
      NaiveDateTime::parse_from_str(
        token, format
      )
    {
      return Ok(dt.date());
    }
  }

  if let Ok(dt) =
    DateTime::parse_from_rfc3339(token)
  {
    return Ok(to_project_date(
      dt.with_timezone(&Utc)
    ));
  }

  Err(anyhow!(
    "unrecognized date: {token}"
  ))
}

fn resolve_project_timezone() -> Tz {
  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
  {
    if let Some(tz) = parse_timezone(
      &raw,
      TIMEZONE_ENV_VAR
    ) {
      return tz;
    }
  }

  if let Some(path) =
    timezone_config_path()
    && let Some(tz) =
      load_timezone_from_file(&path)
  {
    return tz;
  }

  parse_timezone(
    DEFAULT_PROJECT_TIMEZONE,
    "DEFAULT_PROJECT_TIMEZONE"
  )
  .unwrap_or_else(|| {
    tracing::error!(
      "failed to parse fallback \
       timezone; using UTC"
    );
    chrono_tz::UTC
  })
}

fn timezone_config_path()
-> Option<PathBuf> {
  if let Ok(raw) = std::env::var(
    TIMEZONE_CONFIG_ENV_VAR
  ) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return Some(PathBuf::from(
        trimmed
      ));
    }
  }

  std::env::current_dir().ok().map(
    |dir| {
      dir.join(TIMEZONE_CONFIG_FILE)
    }
  )
}

fn load_timezone_from_file(
  path: &PathBuf
) -> Option<Tz> {
  if !path.exists() {
    tracing::debug!(
      file = %path.display(),
      "timezone config file not found"
    );
    return None;
  }

  let raw = match fs::read_to_string(
    path
  ) {
    | Ok(raw) => raw,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed reading timezone config file"
      );
      return None;
    }
  };

  let parsed = match toml::from_str::<
    TimezoneConfig
  >(&raw)
  {
    | Ok(parsed) => parsed,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed parsing timezone config file"
      );
      return None;
    }
  };

  let timezone =
    parsed.timezone.or_else(|| {
      parsed.time.and_then(|section| {
        section.timezone
      })
    });
  let Some(timezone) = timezone else {
    tracing::warn!(
      file = %path.display(),
      "timezone config had no timezone field"
    );
    return None;
  };

  parse_timezone(
    timezone.as_str(),
    &format!("file:{}", path.display())
  )
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::info!(
        source,
        timezone = %trimmed,
        "configured project timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::{
    date_in_timezone,
    parse_calendar_date,
    parse_timezone
  };

  fn ymd(
    year: i32,
    month: u32,
    day: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(
      year, month, day
    )
    .expect("valid date")
  }

  #[test]
  fn parses_plain_dates() {
    for raw in [
      "2024-03-15",
      " 2024/03/15 ",
      "2024.03.15",
      "2024-03-15 10:30:00"
    ] {
      assert_eq!(
        parse_calendar_date(raw)
          .expect("parse date"),
        ymd(2024, 3, 15),
        "input {raw:?}"
      );
    }
  }

  #[test]
  fn rejects_garbage_dates() {
    assert!(
      parse_calendar_date("").is_err()
    );
    assert!(
      parse_calendar_date("yesterday")
        .is_err()
    );
    assert!(
      parse_calendar_date("2023-02-29")
        .is_err()
    );
  }

  #[test]
  fn timestamps_follow_timezone() {
    let ts = 1_710_446_400;
    assert_eq!(
      date_in_timezone(
        ts,
        &chrono_tz::UTC
      ),
      Some(ymd(2024, 3, 14))
    );
    assert_eq!(
      date_in_timezone(
        ts,
        &chrono_tz::Asia::Shanghai
      ),
      Some(ymd(2024, 3, 15))
    );
  }

  #[test]
  fn parses_timezone_ids() {
    assert!(
      parse_timezone(
        "Europe/Berlin",
        "test"
      )
      .is_some()
    );
    assert!(
      parse_timezone("  ", "test")
        .is_none()
    );
    assert!(
      parse_timezone(
        "Mars/Olympus",
        "test"
      )
      .is_none()
    );
  }
}
