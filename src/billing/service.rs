use std::time::Duration;

use bigdecimal::BigDecimal;
use log::warn;

use crate::idempotency;
use crate::installment::Installment;
use crate::loan::{self, Loan, NewLoan};
use crate::payment::{self, NewPayment, Payment};
use crate::types::{Date, Id, MoneyExt};

use super::{Error, ErrorKind, Result, schedule};

/// How long a processed payment's idempotency key stays registered.
const IDEMPOTENCY_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Source of "today" for due-date comparisons; overridable in tests.
pub trait Calendar {
	fn current_date(&self) -> Date {
		chrono::Utc::now().date_naive()
	}
}

pub struct SystemCalendar;

impl Calendar for SystemCalendar {}

/// Parameter object for creating a new Service
pub struct NewService<'a> {
	pub loan_repo: &'a loan::Repo,
	pub payment_repo: &'a payment::Repo,
	pub idempotency: &'a dyn idempotency::Store,
	pub calendar: &'a dyn Calendar,
}

/// Service for loan billing operations
pub struct Service<'a> {
	loan_repo: &'a loan::Repo,
	payment_repo: &'a payment::Repo,
	idempotency: &'a dyn idempotency::Store,
	calendar: &'a dyn Calendar,
}

impl<'a> Service<'a> {
	pub fn new(v: NewService<'a>) -> Self {
		Service {
			loan_repo: v.loan_repo,
			payment_repo: v.payment_repo,
			idempotency: v.idempotency,
			calendar: v.calendar,
		}
	}

	/// Create a loan and its weekly repayment schedule as one atomic unit.
	///
	/// # Arguments
	/// * `principal` - amount lent, must be positive
	/// * `rate` - flat interest rate as a percentage, must be positive
	/// * `term_weeks` - number of weekly installments, must be positive
	/// * `start_date` - date the first week is counted from
	pub fn create_loan(&self, principal: BigDecimal, rate: BigDecimal, term_weeks: i32, start_date: Date) -> Result<Loan> {
		schedule::validate_terms(&principal, &rate, term_weeks)?;
		let weekly_amount = schedule::weekly_amount(&principal, &rate, term_weeks);
		let installments = schedule::generate(start_date, term_weeks, &weekly_amount);

		self.loan_repo.create(NewLoan {
			principal,
			interest_rate: rate,
			term_weeks,
			weekly_amount,
			start_date,
			is_active: true,
		}, &installments).map_err(Into::into)
	}

	/// Sum of unpaid installment amounts. Always recomputed from installment
	/// state, never cached on the loan row.
	pub fn get_outstanding(&self, loan_id: &Id) -> Result<BigDecimal> {
		self.loan_repo.find_by_id(loan_id)?;
		let installments = self.loan_repo.installments(loan_id)?;
		Ok(outstanding(&installments))
	}

	/// A loan is delinquent when two installments with consecutive week
	/// numbers are both unpaid and past due. A single late installment does
	/// not count; delinquency signals a pattern of missed payments.
	pub fn is_delinquent(&self, loan_id: &Id) -> Result<bool> {
		self.loan_repo.find_by_id(loan_id)?;
		let installments = self.loan_repo.installments(loan_id)?;
		Ok(has_consecutive_overdue(&installments, self.calendar.current_date()))
	}

	/// Apply a payment against every currently-overdue installment of the
	/// loan.
	///
	/// With a non-empty idempotency key the key is reserved (set-if-absent)
	/// before the ledger commit; a key that is already registered means the
	/// payment was processed before and the call is a no-op success, without
	/// re-validating the amount against the stored key. The reservation is
	/// released if the commit never happens and overwritten with the payment
	/// id once it does.
	pub fn make_payment(&self, loan_id: &Id, amount: &BigDecimal, idempotency_key: Option<&str>) -> Result<()> {
		let key = idempotency_key.filter(|k| !k.is_empty());
		if let Some(key) = key {
			if !self.idempotency.acquire(key, IDEMPOTENCY_TTL)? {
				// already processed; succeed without touching the ledger
				return Ok(());
			}
		}

		match self.apply_payment(loan_id, amount, key) {
			Ok(payment) => {
				if let Some(key) = key {
					// the key is already reserved, so a lost confirm only
					// leaves the placeholder value behind
					if let Err(e) = self.idempotency.confirm(key, &payment.id.to_string(), IDEMPOTENCY_TTL) {
						warn!("confirming idempotency key {}: {}", key, e);
					}
				}
				Ok(())
			}
			Err(e) => {
				if let Some(key) = key {
					if let Err(release_err) = self.idempotency.release(key) {
						warn!("releasing idempotency key {}: {}", key, release_err);
					}
				}
				Err(e)
			}
		}
	}

	fn apply_payment(&self, loan_id: &Id, amount: &BigDecimal, idempotency_key: Option<&str>) -> Result<Payment> {
		let loan = self.loan_repo.find_by_id(loan_id)?;
		let installments = self.loan_repo.installments(loan_id)?;
		let due = plan_payment(&loan, &installments, amount, self.calendar.current_date())?;

		self.payment_repo.create(NewPayment {
			loan_id,
			amount,
			idempotency_key,
		}, &due).map_err(Into::into)
	}
}

/// Sum of amounts over unpaid installments.
fn outstanding(installments: &[Installment]) -> BigDecimal {
	installments.iter()
		.filter(|inst| !inst.paid)
		.fold(BigDecimal::from(0), |acc, inst| acc + &inst.amount)
}

/// Unpaid installments with a due date on or before `today`, in week order
/// (the repo guarantees the ordering).
fn due_unpaid<'a>(installments: &'a [Installment], today: Date) -> Vec<&'a Installment> {
	installments.iter()
		.filter(|inst| !inst.paid && inst.due_date <= today)
		.collect()
}

fn has_consecutive_overdue(installments: &[Installment], today: Date) -> bool {
	let overdue = due_unpaid(installments, today);
	overdue.windows(2)
		.any(|pair| pair[1].week_number == pair[0].week_number + 1)
}

/// Decide which installments a payment settles.
///
/// The amount must be a positive exact multiple of the loan's weekly
/// installment, checked in currency minor units so decimal representation
/// cannot drift, and must match the total of all overdue unpaid installments
/// exactly. Partial settlement and paying ahead are both rejected.
fn plan_payment(loan: &Loan, installments: &[Installment], amount: &BigDecimal, today: Date) -> Result<Vec<Id>> {
	match (amount.minor_units(), loan.weekly_amount.minor_units()) {
		(Some(a), Some(w)) if a > 0 && w > 0 && a % w == 0 => {}
		_ => return Err(Error::new(ErrorKind::InvalidAmount)),
	}

	let due = due_unpaid(installments, today);
	if due.is_empty() {
		return Err(Error::new(ErrorKind::NothingDue));
	}

	let total_due = due.iter()
		.fold(BigDecimal::from(0), |acc, inst| acc + &inst.amount);
	if amount != &total_due {
		return Err(Error::new(ErrorKind::AmountMismatch));
	}

	Ok(due.iter().map(|inst| inst.id).collect())
}
