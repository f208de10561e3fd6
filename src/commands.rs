//! # Commands Module
//!
//! Slash-command routing and the `[month] [year]` period arguments shared by
//! `/stats`, `/list` and `/export`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Month, TimeZone, Utc};
use chrono_tz::Tz;

use crate::errors::ParseError;

/// Closed set of commands the bot understands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Stats(String),
    List(String),
    Export(String),
    Undo,
}

/// Route text starting with `/`. Matching is exact and case-sensitive;
/// a `@botname` suffix is ignored and anything unknown falls back to help.
/// Returns `None` for non-command text.
pub fn parse_command(text: &str) -> Option<Command> {
    let text = text.trim();
    let rest = text.strip_prefix('/')?;
    let (head, args) = match rest.split_once(char::is_whitespace) {
        Some((head, args)) => (head, args.trim().to_string()),
        None => (rest, String::new()),
    };
    let name = head.split('@').next().unwrap_or(head);

    let command = match name {
        "start" => Command::Start,
        "help" => Command::Help,
        "stats" => Command::Stats(args),
        "list" => Command::List(args),
        "export" => Command::Export(args),
        "undo" => Command::Undo,
        _ => Command::Help,
    };
    Some(command)
}

/// A calendar month in the user's timezone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub month: u32,
    pub year: i32,
}

impl Period {
    /// Month containing `now` in `tz`
    pub fn current(tz: Tz, now: DateTime<Utc>) -> Self {
        let local = now.with_timezone(&tz);
        Self {
            month: local.month(),
            year: local.year(),
        }
    }

    /// Parse `""`, `"2"`, `"Feb"`, `"February"` or `"2 2022"`.
    /// Missing parts default to the current month and year in `tz`.
    pub fn parse(args: &str, tz: Tz, now: DateTime<Utc>) -> Result<Self, ParseError> {
        let current = Self::current(tz, now);
        let tokens: Vec<&str> = args.split_whitespace().collect();
        match tokens.as_slice() {
            [] => Ok(current),
            [month] => Ok(Self {
                month: parse_month(month)?,
                year: current.year,
            }),
            [month, year] => Ok(Self {
                month: parse_month(month)?,
                year: parse_year(year)?,
            }),
            _ => Err(ParseError::InvalidPeriod(args.to_string())),
        }
    }

    /// Half-open `[start, end)` range of this month in `tz`, as UTC instants
    pub fn bounds(&self, tz: Tz) -> Result<(DateTime<Utc>, DateTime<Utc>), ParseError> {
        let (next_year, next_month) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        let start = month_start(tz, self.year, self.month)
            .ok_or_else(|| ParseError::InvalidPeriod(self.to_string()))?;
        let end = month_start(tz, next_year, next_month)
            .ok_or_else(|| ParseError::InvalidPeriod(self.to_string()))?;
        Ok((start, end))
    }

    /// Compact form stored in a message context so pagination can re-query
    pub fn to_args(&self) -> String {
        format!("{} {}", self.month, self.year)
    }

    pub fn month_name(&self) -> &'static str {
        u8::try_from(self.month)
            .ok()
            .and_then(|m| Month::try_from(m).ok())
            .map(|m| m.name())
            .unwrap_or("?")
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.month_name(), self.year)
    }
}

fn month_start(tz: Tz, year: i32, month: u32) -> Option<DateTime<Utc>> {
    tz.with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_month(token: &str) -> Result<u32, ParseError> {
    let invalid = || ParseError::InvalidPeriod(token.to_string());
    if token.chars().all(|c| c.is_ascii_digit()) {
        let month: u32 = token.parse().map_err(|_| invalid())?;
        return if (1..=12).contains(&month) {
            Ok(month)
        } else {
            Err(invalid())
        };
    }
    Month::from_str(token)
        .map(|m| m.number_from_month())
        .map_err(|_| invalid())
}

fn parse_year(token: &str) -> Result<i32, ParseError> {
    if token.len() != 4 || !token.chars().all(|c| c.is_ascii_digit()) {
        return Err(ParseError::InvalidPeriod(token.to_string()));
    }
    token
        .parse()
        .map_err(|_| ParseError::InvalidPeriod(token.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Asia::Singapore;

    fn now() -> DateTime<Utc> {
        // 2022-03-31 20:00 UTC is already April 1st in Singapore
        Utc.with_ymd_and_hms(2022, 3, 31, 20, 0, 0).unwrap()
    }

    #[test]
    fn test_command_routing() {
        assert_eq!(parse_command("/start"), Some(Command::Start));
        assert_eq!(parse_command("/undo@expense_bot"), Some(Command::Undo));
        assert_eq!(
            parse_command("/list Feb 2022"),
            Some(Command::List("Feb 2022".to_string()))
        );
        assert_eq!(parse_command("/Start"), Some(Command::Help));
        assert_eq!(parse_command("/unknown"), Some(Command::Help));
        assert_eq!(parse_command("12.34 lunch"), None);
    }

    #[test]
    fn test_current_period_uses_timezone() {
        let period = Period::parse("", Singapore, now()).unwrap();
        assert_eq!(period, Period { month: 4, year: 2022 });
    }

    #[test]
    fn test_month_formats() {
        for token in ["2", "Feb", "February", "feb"] {
            let period = Period::parse(token, Singapore, now()).unwrap();
            assert_eq!(period, Period { month: 2, year: 2022 }, "token {token}");
        }
        let period = Period::parse("2 2021", Singapore, now()).unwrap();
        assert_eq!(period, Period { month: 2, year: 2021 });
    }

    #[test]
    fn test_invalid_periods() {
        for args in ["13", "0", "Febuary", "2 21", "2 2022 extra"] {
            assert!(
                matches!(
                    Period::parse(args, Singapore, now()),
                    Err(ParseError::InvalidPeriod(_))
                ),
                "args {args}"
            );
        }
    }

    #[test]
    fn test_bounds_in_timezone() {
        let (start, end) = Period { month: 12, year: 2021 }.bounds(Singapore).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2021, 11, 30, 16, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2021, 12, 31, 16, 0, 0).unwrap());
    }

    #[test]
    fn test_display_and_args() {
        let period = Period { month: 2, year: 2022 };
        assert_eq!(period.to_string(), "February 2022");
        assert_eq!(period.to_args(), "2 2022");
    }
}
