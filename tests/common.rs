use std::str::FromStr;

pub use bigdecimal::BigDecimal;
use diesel::PgConnection;
pub use diesel::prelude::*;
use diesel::r2d2::ConnectionManager;
use r2d2::PooledConnection;

pub use billing_api::billing::{Calendar, NewService, Service};
pub use billing_api::db;
pub use billing_api::idempotency::{MemoryStore, Store};
pub use billing_api::types::{Date, Id};
pub use billing_api::{loan, payment};

pub fn money(s: &str) -> BigDecimal {
	BigDecimal::from_str(s).unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> Date {
	chrono::NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Calendar pinned to a fixed date so due-date logic is deterministic.
pub struct FixedCalendar {
	pub today: Date,
}

impl Calendar for FixedCalendar {
	fn current_date(&self) -> Date {
		self.today
	}
}

pub struct Fixture {
	pub pool: db::PgPool,
}

impl Fixture {
	pub fn new() -> Self {
		Fixture { pool: db::pg_connection() }
	}

	pub fn conn(&self) -> PooledConnection<ConnectionManager<PgConnection>> {
		self.pool.get().unwrap()
	}

	pub fn teardown(&self) {
		let tables = vec![
			"payment_installments",
			"payments",
			"installments",
			"loans",
		];
		println!("\n--- clean up ---");
		for table in tables {
			diesel::sql_query(format!("DELETE FROM {}", table))
				.execute(&self.conn())
				.map(|n| println!("deleting {} from '{}' table", n, table))
				.expect("deleting db table");
		}
	}
}

pub struct Suite {
	pub loan_repo: loan::Repo,
	pub payment_repo: payment::Repo,
	pub store: MemoryStore,
	pub calendar: FixedCalendar,
}

impl Suite {
	pub fn setup(today: Date) -> Self {
		let fixture = Fixture::new();
		fixture.teardown();

		Suite {
			loan_repo: loan::Repo::new(fixture.pool.clone()),
			payment_repo: payment::Repo::new(fixture.pool.clone()),
			store: MemoryStore::new(),
			calendar: FixedCalendar { today },
		}
	}

	pub fn service(&self) -> Service {
		Service::new(NewService {
			loan_repo: &self.loan_repo,
			payment_repo: &self.payment_repo,
			idempotency: &self.store,
			calendar: &self.calendar,
		})
	}
}
