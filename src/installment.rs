use bigdecimal::BigDecimal;
use serde::Serialize;

use crate::schema::installments;
use crate::types::{Date, Id};

/// One week of a loan's repayment schedule. `paid` only ever moves from false
/// to true.
#[derive(Queryable, Identifiable, Debug, Clone, PartialEq, Serialize)]
pub struct Installment {
	pub id: Id,
	pub loan_id: Id,
	pub week_number: i32,
	pub due_date: Date,
	pub amount: BigDecimal,
	pub paid: bool,
}

/// A scheduled installment that has not been persisted yet. The loan repo
/// attaches the loan id once the loan row has been inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewInstallment {
	pub week_number: i32,
	pub due_date: Date,
	pub amount: BigDecimal,
}

#[derive(Insertable)]
#[table_name = "installments"]
pub struct InstallmentRow<'a> {
	pub loan_id: &'a Id,
	pub week_number: i32,
	pub due_date: Date,
	pub amount: &'a BigDecimal,
	pub paid: bool,
}
