use std::ops::{Add, Div, Mul};

use bigdecimal::BigDecimal;
use chrono::Duration;

use crate::installment::NewInstallment;
use crate::types::Date;

use super::{Error, ErrorKind, Result};

/// Validate loan terms before any schedule math; all three must be strictly
/// positive.
pub fn validate_terms(principal: &BigDecimal, rate: &BigDecimal, term_weeks: i32) -> Result<()> {
	let zero = BigDecimal::from(0);
	if principal <= &zero {
		return Err(Error::new(ErrorKind::InvalidTerms("principal must be positive".into())));
	}
	if rate <= &zero {
		return Err(Error::new(ErrorKind::InvalidTerms("interest rate must be positive".into())));
	}
	if term_weeks <= 0 {
		return Err(Error::new(ErrorKind::InvalidTerms("term weeks must be positive".into())));
	}
	Ok(())
}

/// Flat-rate weekly amount: `(principal + principal * rate / 100) / term_weeks`.
/// Computed once at loan creation and stored on the loan; never recomputed.
/// No rounding is applied; the value stays an exact decimal.
pub fn weekly_amount(principal: &BigDecimal, rate: &BigDecimal, term_weeks: i32) -> BigDecimal {
	let interest = principal.mul(rate).div(BigDecimal::from(100));
	principal.add(interest).div(BigDecimal::from(term_weeks))
}

/// Expand loan terms into the full repayment schedule: weeks `1..=term_weeks`,
/// each due seven days after the previous, all for the same amount, all
/// unpaid. Pure and deterministic; callers validate terms first.
pub fn generate(start_date: Date, term_weeks: i32, weekly_amount: &BigDecimal) -> Vec<NewInstallment> {
	(1..=term_weeks)
		.map(|week| NewInstallment {
			week_number: week,
			due_date: start_date + Duration::weeks(i64::from(week)),
			amount: weekly_amount.clone(),
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use std::str::FromStr;

	use chrono::NaiveDate;

	use super::*;

	fn money(s: &str) -> BigDecimal {
		BigDecimal::from_str(s).unwrap()
	}

	fn date(y: i32, m: u32, d: u32) -> Date {
		NaiveDate::from_ymd_opt(y, m, d).unwrap()
	}

	#[test]
	fn weekly_amount_is_flat_rate() {
		// 1000 at 10% over 10 weeks: total 1100, 110 a week
		assert_eq!(weekly_amount(&money("1000"), &money("10"), 10), money("110"));
	}

	#[test]
	fn weekly_amount_keeps_fractions() {
		// 900 at 10% over 4 weeks: total 990, 247.5 a week
		assert_eq!(weekly_amount(&money("900"), &money("10"), 4), money("247.5"));
	}

	#[test]
	fn generate_covers_every_week() {
		let weekly = money("110");
		let schedule = generate(date(2024, 1, 1), 10, &weekly);

		assert_eq!(schedule.len(), 10);
		for (i, inst) in schedule.iter().enumerate() {
			assert_eq!(inst.week_number, i as i32 + 1);
			assert_eq!(inst.amount, weekly);
		}
	}

	#[test]
	fn generate_spaces_due_dates_seven_days_apart() {
		let schedule = generate(date(2024, 1, 1), 10, &money("110"));

		assert_eq!(schedule[0].due_date, date(2024, 1, 8));
		assert_eq!(schedule[2].due_date, date(2024, 1, 22));
		assert_eq!(schedule[9].due_date, date(2024, 3, 11));
	}

	#[test]
	fn generate_is_deterministic() {
		let a = generate(date(2024, 1, 1), 5, &money("50"));
		let b = generate(date(2024, 1, 1), 5, &money("50"));
		assert_eq!(a, b);
	}

	#[test]
	fn validate_terms_accepts_positive_terms() {
		assert!(validate_terms(&money("1000"), &money("10"), 10).is_ok());
	}

	#[test]
	fn validate_terms_rejects_nonpositive_principal() {
		let err = validate_terms(&money("0"), &money("10"), 10).unwrap_err();
		assert!(matches!(err.kind(), ErrorKind::InvalidTerms(_)));

		assert!(validate_terms(&money("-5"), &money("10"), 10).is_err());
	}

	#[test]
	fn validate_terms_rejects_nonpositive_rate() {
		assert!(validate_terms(&money("1000"), &money("0"), 10).is_err());
	}

	#[test]
	fn validate_terms_rejects_nonpositive_term() {
		assert!(validate_terms(&money("1000"), &money("10"), 0).is_err());
		assert!(validate_terms(&money("1000"), &money("10"), -3).is_err());
	}
}
