//! CSV export of a month of transactions.

use chrono_tz::Tz;
use csv::Writer;
use serde::Serialize;

use crate::commands::Period;
use crate::errors::BotError;
use crate::store::Transaction;

#[derive(Serialize)]
struct ExportRow<'a> {
    datetime: String,
    category: &'a str,
    amount: String,
    currency: &'static str,
    description: &'a str,
}

/// File name offered to the user, e.g. `expenses_02_2022.csv`
pub fn export_file_name(period: &Period) -> String {
    format!("expenses_{:02}_{}.csv", period.month, period.year)
}

/// Render transactions as CSV with a header row; datetimes in `timezone`
pub fn write_csv(transactions: &[Transaction], timezone: Tz) -> Result<Vec<u8>, BotError> {
    let mut writer = Writer::from_writer(vec![]);
    for t in transactions {
        writer
            .serialize(ExportRow {
                datetime: t
                    .datetime
                    .with_timezone(&timezone)
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string(),
                category: &t.category_name,
                amount: t.amount.major_string(),
                currency: t.amount.currency.code(),
                description: &t.description,
            })
            .map_err(|e| BotError::Export(e.to_string()))?;
    }
    writer
        .into_inner()
        .map_err(|e| BotError::Export(e.to_string()))
}
