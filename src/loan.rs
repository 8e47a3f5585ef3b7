use bigdecimal::BigDecimal;
use diesel::Connection;
use diesel::prelude::*;
use serde::Serialize;

use crate::db;
use crate::installment::{Installment, InstallmentRow, NewInstallment};
use crate::schema::{installments, loans};
use crate::types::{Date, Id, Time};

#[derive(Queryable, Identifiable, Debug, Serialize)]
pub struct Loan {
	pub id: Id,
	pub principal: BigDecimal,
	pub interest_rate: BigDecimal,
	pub term_weeks: i32,
	// settled once at creation from principal, rate and term; never recomputed
	pub weekly_amount: BigDecimal,
	pub start_date: Date,
	pub is_active: bool,
	pub created_at: Time,
}

#[derive(Insertable)]
#[table_name = "loans"]
pub struct NewLoan {
	pub principal: BigDecimal,
	pub interest_rate: BigDecimal,
	pub term_weeks: i32,
	pub weekly_amount: BigDecimal,
	pub start_date: Date,
	pub is_active: bool,
}

pub struct Repo {
	db: db::PgPool,
}

impl Repo {
	pub fn new(db: db::PgPool) -> Self {
		Repo { db }
	}

	/// Insert the loan and its whole repayment schedule as one transaction.
	/// The generated loan id and creation timestamp are captured from the
	/// insert; any failed row rolls back everything.
	pub fn create(&self, new_loan: NewLoan, schedule: &[NewInstallment]) -> db::Result<Loan> {
		let conn = &self.db.get()?;
		conn.transaction::<Loan, db::Error, _>(|| {
			let loan: Loan = diesel::insert_into(loans::table)
				.values(&new_loan)
				.get_result(conn)?;

			let rows: Vec<InstallmentRow> = schedule.iter()
				.map(|inst| InstallmentRow {
					loan_id: &loan.id,
					week_number: inst.week_number,
					due_date: inst.due_date,
					amount: &inst.amount,
					paid: false,
				})
				.collect();
			diesel::insert_into(installments::table)
				.values(&rows)
				.execute(conn)?;

			Ok(loan)
		})
	}

	pub fn find_by_id(&self, id: &Id) -> db::Result<Loan> {
		let conn = &self.db.get()?;
		loans::table
			.filter(loans::id.eq(id))
			.filter(loans::is_active.eq(true))
			.first(conn)
			.map_err(Into::into)
	}

	/// Installments ordered by week number ascending. The ordering is
	/// load-bearing: delinquency and overdue-sum logic depend on it.
	pub fn installments(&self, loan_id: &Id) -> db::Result<Vec<Installment>> {
		let conn = &self.db.get()?;
		installments::table
			.filter(installments::loan_id.eq(loan_id))
			.order(installments::week_number.asc())
			.load::<Installment>(conn)
			.map_err(Into::into)
	}

	/// Bulk-set paid=true for the given installments. An empty id set is a
	/// no-op. Returns how many rows actually flipped; rows that were already
	/// paid are left alone and not counted.
	pub fn mark_installments_paid(&self, ids: &[Id]) -> db::Result<usize> {
		if ids.is_empty() {
			return Ok(0);
		}
		let conn = &self.db.get()?;
		diesel::update(
			installments::table
				.filter(installments::id.eq_any(ids))
				.filter(installments::paid.eq(false)),
		)
			.set(installments::paid.eq(true))
			.execute(conn)
			.map_err(Into::into)
	}
}
