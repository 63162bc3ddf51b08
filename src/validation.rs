//! Input checks that need no database access.

use chrono::NaiveDate;

use crate::error::{LedgerError, Result};

pub const MIN_NUMBER_LEN: usize = 16;
pub const MAX_NUMBER_LEN: usize = 19;

/// A primary account number is 16 to 19 ASCII digits, nothing else.
pub fn validate_card_number(number: &str) -> Result<()> {
    let len = number.len();
    if !(MIN_NUMBER_LEN..=MAX_NUMBER_LEN).contains(&len)
        || !number.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(LedgerError::InvalidCardNumber);
    }
    Ok(())
}

/// A card may only be issued with an expiry strictly after `today`.
pub fn validate_expiry(expiry: NaiveDate, today: NaiveDate) -> Result<()> {
    if expiry <= today {
        return Err(LedgerError::InvalidExpiry(expiry));
    }
    Ok(())
}

pub fn validate_date_range<T: PartialOrd>(from: Option<&T>, to: Option<&T>) -> Result<()> {
    if let (Some(from), Some(to)) = (from, to)
        && from > to
    {
        return Err(LedgerError::InvalidDateRange);
    }
    Ok(())
}
