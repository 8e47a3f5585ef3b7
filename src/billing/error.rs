use std::error;
use std::fmt;

use crate::{db, idempotency};

/// An error that can occur while servicing a billing operation.
#[derive(Debug)]
pub struct Error {
	kind: ErrorKind,
}

impl Error {
	pub fn new(kind: ErrorKind) -> Error {
		Error { kind }
	}

	pub fn kind(&self) -> &ErrorKind {
		&self.kind
	}

	/// True when the underlying cause is a missing loan record.
	pub fn is_not_found(&self) -> bool {
		matches!(self.kind, ErrorKind::Database(db::Error::RecordNotFound))
	}
}

/// The kind of an error that can occur.
#[derive(Debug)]
pub enum ErrorKind {
	Database(db::Error),
	Idempotency(idempotency::Error),
	/// Loan terms failed validation before schedule generation.
	InvalidTerms(String),
	/// Payment amount is not a positive multiple of the weekly installment.
	InvalidAmount,
	/// Payment amount does not cover exactly the overdue installments.
	AmountMismatch,
	/// No installments are currently due; paying ahead is not allowed.
	NothingDue,
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match &self.kind {
			ErrorKind::Database(e) => write!(f, "db error: {}", e),
			ErrorKind::Idempotency(e) => write!(f, "idempotency store error: {}", e),
			ErrorKind::InvalidTerms(msg) => write!(f, "invalid loan terms: {}", msg),
			ErrorKind::InvalidAmount => write!(f, "amount must be a positive multiple of weekly installment"),
			ErrorKind::AmountMismatch => write!(f, "payment amount must cover all overdue installments"),
			ErrorKind::NothingDue => write!(f, "no installments are due for payment"),
		}
	}
}

impl error::Error for Error {}

impl From<db::Error> for Error {
	fn from(e: db::Error) -> Self {
		Error::new(ErrorKind::Database(e))
	}
}

impl From<idempotency::Error> for Error {
	fn from(e: idempotency::Error) -> Self {
		Error::new(ErrorKind::Idempotency(e))
	}
}

impl From<r2d2::Error> for Error {
	fn from(e: r2d2::Error) -> Self {
		Error::new(ErrorKind::Database(db::Error::from(e)))
	}
}

impl From<diesel::result::Error> for Error {
	fn from(e: diesel::result::Error) -> Self {
		Error::new(ErrorKind::Database(db::Error::from(e)))
	}
}
