use std::ops::Mul;

use bigdecimal::{BigDecimal, ToPrimitive};
use chrono::{DateTime, NaiveDate, Utc};

pub type Id = uuid::Uuid;
pub type Time = DateTime<Utc>;
pub type Date = NaiveDate;

pub trait MoneyExt {
	fn minor_units(&self) -> Option<i64>;
}

impl MoneyExt for BigDecimal {
	/// Value in currency minor units (cents), truncated past two decimal places.
	/// `None` when the value does not fit in an i64.
	fn minor_units(&self) -> Option<i64> {
		self.mul(BigDecimal::from(100)).with_scale(0).to_i64()
	}
}

#[cfg(test)]
mod tests {
	use std::str::FromStr;

	use super::*;

	fn money(s: &str) -> BigDecimal {
		BigDecimal::from_str(s).unwrap()
	}

	#[test]
	fn minor_units_of_whole_amount() {
		assert_eq!(money("110").minor_units(), Some(11000));
	}

	#[test]
	fn minor_units_of_fractional_amount() {
		assert_eq!(money("36.67").minor_units(), Some(3667));
	}

	#[test]
	fn minor_units_truncates_below_a_cent() {
		assert_eq!(money("0.005").minor_units(), Some(0));
		assert_eq!(money("110.009").minor_units(), Some(11000));
	}

	#[test]
	fn minor_units_of_negative_amount() {
		assert_eq!(money("-1").minor_units(), Some(-100));
	}
}
