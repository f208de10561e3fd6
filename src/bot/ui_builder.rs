//! UI Builder module for creating keyboards and formatting messages
//!
//! Keyboards are built as plain [`KeyboardRows`] so the layout rules can be
//! tested without Telegram types; [`to_inline_markup`] converts at the edge.

use chrono_tz::Tz;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use teloxide::utils::html;

use crate::callback::{self, Callback, Direction};
use crate::commands::Period;
use crate::errors::{BotError, KeyboardError};
use crate::localization::{t_args_lang, t_lang};
use crate::money::{Currency, Money};
use crate::store::{Category, CategoryTotal, Transaction, TransactionType};

/// A button label and its encoded callback data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyboardButton {
    pub label: String,
    pub data: String,
}

impl KeyboardButton {
    pub fn new(label: impl Into<String>, callback: &Callback) -> Result<Self, BotError> {
        Ok(Self {
            label: label.into(),
            data: callback::encode(callback)?,
        })
    }
}

pub type KeyboardRows = Vec<Vec<KeyboardButton>>;

/// Tile buttons row-major, `columns` per row; the last row may be short
pub fn build_grid(items: Vec<KeyboardButton>, columns: usize) -> Result<KeyboardRows, KeyboardError> {
    if columns == 0 {
        return Err(KeyboardError::InvalidColumns);
    }
    let mut rows = Vec::with_capacity(items.len().div_ceil(columns));
    let mut row = Vec::with_capacity(columns);
    for item in items {
        row.push(item);
        if row.len() == columns {
            rows.push(std::mem::replace(&mut row, Vec::with_capacity(columns)));
        }
    }
    if !row.is_empty() {
        rows.push(row);
    }
    Ok(rows)
}

/// Append a single Cancel row releasing `message_context_id`
pub fn append_cancel(
    mut rows: KeyboardRows,
    message_context_id: i32,
    language_code: Option<&str>,
) -> Result<KeyboardRows, BotError> {
    rows.push(vec![KeyboardButton::new(
        t_lang("button-cancel", language_code),
        &Callback::Cancel { message_context_id },
    )?]);
    Ok(rows)
}

/// Navigation rows for a newest-first list.
///
/// "Previous" (newer entries) appears iff `offset > 0` and carries
/// `offset - limit`; "Next" (older entries) appears iff
/// `offset + limit < total` and carries `offset + limit`. A Cancel row is
/// added whenever there is anything listed; an empty list gets no keyboard.
pub fn build_pagination_rows(
    total: u32,
    offset: u32,
    limit: u32,
    message_context_id: i32,
    columns: usize,
    language_code: Option<&str>,
) -> Result<KeyboardRows, BotError> {
    if limit == 0 {
        return Err(KeyboardError::InvalidLimit.into());
    }
    if total == 0 {
        return Ok(Vec::new());
    }

    let mut nav = Vec::with_capacity(2);
    if offset > 0 {
        nav.push(KeyboardButton::new(
            t_lang("button-previous", language_code),
            &Callback::Pagination {
                direction: Direction::Previous,
                offset: offset.saturating_sub(limit),
                limit,
                message_context_id,
            },
        )?);
    }
    if u64::from(offset) + u64::from(limit) < u64::from(total) {
        nav.push(KeyboardButton::new(
            t_lang("button-next", language_code),
            &Callback::Pagination {
                direction: Direction::Next,
                offset: offset + limit,
                limit,
                message_context_id,
            },
        )?);
    }

    let rows = build_grid(nav, columns)?;
    append_cancel(rows, message_context_id, language_code)
}

/// Category choices for a pending expense, followed by Cancel
pub fn category_keyboard(
    categories: &[Category],
    message_context_id: i32,
    columns: usize,
    language_code: Option<&str>,
) -> Result<KeyboardRows, BotError> {
    let buttons = categories
        .iter()
        .map(|c| {
            KeyboardButton::new(
                c.name.clone(),
                &Callback::Category {
                    category_id: c.id,
                    message_context_id,
                },
            )
        })
        .collect::<Result<Vec<_>, _>>()?;
    append_cancel(build_grid(buttons, columns)?, message_context_id, language_code)
}

/// Transaction type choices for a pending expense, followed by Cancel
pub fn transaction_type_keyboard(
    types: &[TransactionType],
    message_context_id: i32,
    columns: usize,
    language_code: Option<&str>,
) -> Result<KeyboardRows, BotError> {
    let buttons = types
        .iter()
        .map(|t| {
            KeyboardButton::new(
                t.name.clone(),
                &Callback::TransactionType {
                    transaction_type_id: t.id,
                    message_context_id,
                },
            )
        })
        .collect::<Result<Vec<_>, _>>()?;
    append_cancel(build_grid(buttons, columns)?, message_context_id, language_code)
}

/// Confirm / Cancel row for `/undo`
pub fn undo_keyboard(
    transaction_id: i64,
    message_context_id: i32,
    language_code: Option<&str>,
) -> Result<KeyboardRows, BotError> {
    let confirm = KeyboardButton::new(
        t_lang("button-confirm-delete", language_code),
        &Callback::Undo { transaction_id },
    )?;
    append_cancel(vec![vec![confirm]], message_context_id, language_code)
}

pub fn to_inline_markup(rows: &KeyboardRows) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(rows.iter().map(|row| {
        row.iter()
            .map(|b| InlineKeyboardButton::callback(b.label.clone(), b.data.clone()))
            .collect::<Vec<_>>()
    }))
}

/// Share of `part` in `whole`, in percent rounded to one decimal
fn percent_of(part: i64, whole: i64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 / whole as f64 * 1000.0).round() / 10.0
}

/// `/stats` report: header with the period and total, then one aligned
/// line per category, e.g. `<code> 82.8% Food      SGD 1234.00</code>`
pub fn format_breakdown(
    totals: &[CategoryTotal],
    currency: Currency,
    period: &Period,
    language_code: Option<&str>,
) -> String {
    let sum = totals
        .iter()
        .fold(0i64, |acc, t| acc.saturating_add(t.total_minor));
    let total_line = t_args_lang(
        "stats-total",
        &[("total", &Money::new(sum, currency).to_string())],
        language_code,
    );
    let mut text = format!("<b>{period}</b>\n{}\n\n", html::escape(&total_line));

    let width = totals
        .iter()
        .map(|t| t.category_name.chars().count())
        .max()
        .unwrap_or(0);
    for t in totals {
        let percent = percent_of(t.total_minor, sum);
        let name = format!("{:<width$}", t.category_name);
        text.push_str(&format!(
            "<code>{percent:>5.1}% {} {}</code>\n",
            html::escape(&name),
            Money::new(t.total_minor, currency)
        ));
    }
    text
}

/// One `/list` page, newest first, dates shown in the user's timezone
pub fn format_transaction_list(
    transactions: &[Transaction],
    period: &Period,
    timezone: Tz,
    total: u32,
    offset: u32,
    language_code: Option<&str>,
) -> String {
    let shown = u32::try_from(transactions.len()).unwrap_or(u32::MAX);
    let from = offset.saturating_add(1).to_string();
    let to = offset.saturating_add(shown).to_string();
    let header = t_args_lang(
        "list-header",
        &[
            ("period", &period.to_string()),
            ("from", &from),
            ("to", &to),
            ("total", &total.to_string()),
        ],
        language_code,
    );

    let mut text = format!("<b>{}</b>\n\n", html::escape(&header));
    for t in transactions {
        let local = t.datetime.with_timezone(&timezone);
        text.push_str(&format!(
            "<b>{}</b> {}\n<b>{}</b> {}\n<b>{}</b>\n\n",
            local.format("%d/%m/%y"),
            local.format("%H:%M"),
            html::escape(&t.category_name),
            html::escape(&t.description),
            t.amount
        ));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn button(n: usize) -> KeyboardButton {
        KeyboardButton {
            label: format!("b{n}"),
            data: n.to_string(),
        }
    }

    #[test]
    fn test_grid_rejects_zero_columns() {
        assert_eq!(build_grid(vec![button(1)], 0), Err(KeyboardError::InvalidColumns));
    }

    #[test]
    fn test_grid_exact_rows() {
        let rows = build_grid((0..6).map(button).collect(), 2).unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.len() == 2));
    }

    #[test]
    fn test_percent_rounding() {
        assert_eq!(percent_of(828, 1000), 82.8);
        assert_eq!(percent_of(1, 3), 33.3);
        assert_eq!(percent_of(5, 0), 0.0);
    }

    #[test]
    fn test_breakdown_alignment() {
        let totals = vec![
            CategoryTotal {
                category_name: "Food".into(),
                total_minor: 750,
            },
            CategoryTotal {
                category_name: "Transport".into(),
                total_minor: 250,
            },
        ];
        let text = format_breakdown(
            &totals,
            Currency::Sgd,
            &Period { month: 2, year: 2022 },
            None,
        );
        assert!(text.starts_with("<b>February 2022</b>\nTotal: SGD 10.00"));
        assert!(text.contains("<code> 75.0% Food      SGD 7.50</code>"));
        assert!(text.contains("<code> 25.0% Transport SGD 2.50</code>"));
    }

    #[test]
    fn test_breakdown_saturates_huge_totals() {
        let totals = vec![
            CategoryTotal {
                category_name: "Food".into(),
                total_minor: i64::MAX,
            },
            CategoryTotal {
                category_name: "Bills".into(),
                total_minor: 1,
            },
        ];
        let text = format_breakdown(
            &totals,
            Currency::Sgd,
            &Period { month: 2, year: 2022 },
            None,
        );
        assert!(text.contains(&Money::new(i64::MAX, Currency::Sgd).to_string()));
        assert!(text.contains("100.0% Food"));
    }

    #[test]
    fn test_list_uses_timezone_and_escapes() {
        let tx = Transaction {
            id: 1,
            user_id: 1,
            category_id: 1,
            category_name: "Food".into(),
            amount: Money::new(1234, Currency::Sgd),
            description: "fish & chips".into(),
            datetime: Utc.with_ymd_and_hms(2022, 2, 1, 16, 30, 0).unwrap(),
        };
        let text = format_transaction_list(
            &[tx],
            &Period { month: 2, year: 2022 },
            chrono_tz::Asia::Singapore,
            1,
            0,
            None,
        );
        assert!(text.contains("<b>02/02/22</b> 00:30"));
        assert!(text.contains("fish &amp; chips"));
        assert!(text.contains("1-1 of 1"));
    }
}
