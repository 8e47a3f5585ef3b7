use bigdecimal::BigDecimal;
use diesel::Connection;
use diesel::prelude::*;
use serde::Serialize;

use crate::db;
use crate::schema::{installments, payment_installments, payments};
use crate::types::{Id, Time};

#[derive(Queryable, Identifiable, Debug, Serialize)]
pub struct Payment {
	pub id: Id,
	pub loan_id: Id,
	pub amount: BigDecimal,
	// assigned by the database at insert
	pub payment_date: Time,
	pub idempotency_key: Option<String>,
}

#[derive(Insertable)]
#[table_name = "payments"]
pub struct NewPayment<'a> {
	pub loan_id: &'a Id,
	pub amount: &'a BigDecimal,
	pub idempotency_key: Option<&'a str>,
}

/// Join row linking a payment to one installment it settled.
#[derive(Queryable, Insertable, Debug)]
#[table_name = "payment_installments"]
pub struct PaymentInstallment {
	pub payment_id: Id,
	pub installment_id: Id,
}

pub struct Repo {
	db: db::PgPool,
}

impl Repo {
	pub fn new(db: db::PgPool) -> Self {
		Repo { db }
	}

	/// Insert the payment, mark every settled installment paid and link them,
	/// all within one transaction.
	///
	/// The paid-flag update only touches rows that are still unpaid. If a
	/// concurrent payment already settled any of them the update count comes
	/// up short and the whole transaction rolls back with
	/// [`db::Error::Conflict`], so two racing payments can never settle the
	/// same installment twice.
	pub fn create(&self, new_payment: NewPayment, installment_ids: &[Id]) -> db::Result<Payment> {
		let conn = &self.db.get()?;
		conn.transaction::<Payment, db::Error, _>(|| {
			let payment: Payment = diesel::insert_into(payments::table)
				.values(&new_payment)
				.get_result(conn)?;

			let updated = diesel::update(
				installments::table
					.filter(installments::id.eq_any(installment_ids))
					.filter(installments::paid.eq(false)),
			)
				.set(installments::paid.eq(true))
				.execute(conn)?;
			if updated != installment_ids.len() {
				return Err(db::Error::Conflict);
			}

			let links: Vec<PaymentInstallment> = installment_ids.iter()
				.map(|installment_id| PaymentInstallment {
					payment_id: payment.id,
					installment_id: *installment_id,
				})
				.collect();
			diesel::insert_into(payment_installments::table)
				.values(&links)
				.execute(conn)?;

			Ok(payment)
		})
	}

	pub fn find_by_id(&self, id: &Id) -> db::Result<Payment> {
		let conn = &self.db.get()?;
		payments::table
			.find(id)
			.first(conn)
			.map_err(Into::into)
	}

	/// Look up the payment a previously used idempotency key settled.
	pub fn find_by_idempotency_key(&self, key: &str) -> db::Result<Payment> {
		let conn = &self.db.get()?;
		payments::table
			.filter(payments::idempotency_key.eq(key))
			.first(conn)
			.map_err(Into::into)
	}
}
