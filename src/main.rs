use std::env;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use log::*;
use serde::Deserialize;
use serde_json::json;
use warp::Filter;
use warp::filters::log::Info;
use warp::http::StatusCode;
use warp::reply::{Json, WithStatus};

use billing_api::billing::{self, ErrorKind, NewService, Service, SystemCalendar};
use billing_api::db::{self, PgPool};
use billing_api::idempotency::{self, RedisPool, RedisStore};
use billing_api::types::{Date, Id};
use billing_api::{loan, payment};

#[derive(Deserialize)]
struct CreateLoanRequest {
	principal: f64,
	interest_rate: f64,
	term_weeks: i32,
	start_date: Date,
}

#[derive(Deserialize)]
struct PaymentRequest {
	amount: f64,
}

#[tokio::main]
async fn main() {
	if env::var("RUST_LOG").is_err() {
		env::set_var("RUST_LOG", "info");
	}
	pretty_env_logger::init();

	let log = warp::log::custom(|info: Info| {
		info!(
			target: "billing::api",
			"\"{} {} {:?}\" \t{} {} {:?}",
			info.method(),
			info.path(),
			info.version(),
			info.status().canonical_reason().unwrap_or_else(|| "-"),
			info.status().as_u16(),
			info.elapsed(),
		);
	});

	let pool = db::pg_connection();
	let kv = idempotency::redis_connection();

	let create_loan = warp::post()
		.and(warp::path!("api" / "v1" / "loans"))
		.and(warp::body::content_length_limit(16 * 1024))
		.and(warp::body::json())
		.map({
			let pool = pool.clone();
			let kv = kv.clone();
			move |req: CreateLoanRequest| handle_create_loan(&pool, &kv, req)
		});

	let outstanding = warp::get()
		.and(warp::path!("api" / "v1" / "loans" / Id / "outstanding"))
		.map({
			let pool = pool.clone();
			let kv = kv.clone();
			move |id: Id| handle_outstanding(&pool, &kv, &id)
		});

	let delinquent = warp::get()
		.and(warp::path!("api" / "v1" / "loans" / Id / "delinquent"))
		.map({
			let pool = pool.clone();
			let kv = kv.clone();
			move |id: Id| handle_delinquent(&pool, &kv, &id)
		});

	let make_payment = warp::post()
		.and(warp::path!("api" / "v1" / "loans" / Id / "payments"))
		.and(warp::header::<String>("idempotency-key"))
		.and(warp::body::content_length_limit(16 * 1024))
		.and(warp::body::json())
		.map({
			let pool = pool.clone();
			let kv = kv.clone();
			move |id: Id, key: String, req: PaymentRequest| {
				handle_make_payment(&pool, &kv, &id, &key, req)
			}
		});

	let routes = create_loan
		.or(outstanding)
		.or(delinquent)
		.or(make_payment)
		.with(log);

	let port: u16 = env::var("PORT")
		.ok()
		.and_then(|p| p.parse().ok())
		.unwrap_or(8080);
	warp::serve(routes).run(([0, 0, 0, 0], port)).await;
}

fn handle_create_loan(pool: &PgPool, kv: &RedisPool, req: CreateLoanRequest) -> WithStatus<Json> {
	let principal = match decimal(req.principal) {
		Ok(v) => v,
		Err(reply) => return reply,
	};
	let rate = match decimal(req.interest_rate) {
		Ok(v) => v,
		Err(reply) => return reply,
	};

	let loan_repo = loan::Repo::new(pool.clone());
	let payment_repo = payment::Repo::new(pool.clone());
	let store = RedisStore::new(kv.clone());
	let calendar = SystemCalendar;
	let service = Service::new(NewService {
		loan_repo: &loan_repo,
		payment_repo: &payment_repo,
		idempotency: &store,
		calendar: &calendar,
	});

	match service.create_loan(principal, rate, req.term_weeks, req.start_date) {
		Ok(loan) => warp::reply::with_status(warp::reply::json(&loan), StatusCode::CREATED),
		Err(e) => error_reply(e),
	}
}

fn handle_outstanding(pool: &PgPool, kv: &RedisPool, id: &Id) -> WithStatus<Json> {
	let loan_repo = loan::Repo::new(pool.clone());
	let payment_repo = payment::Repo::new(pool.clone());
	let store = RedisStore::new(kv.clone());
	let calendar = SystemCalendar;
	let service = Service::new(NewService {
		loan_repo: &loan_repo,
		payment_repo: &payment_repo,
		idempotency: &store,
		calendar: &calendar,
	});

	match service.get_outstanding(id) {
		Ok(amount) => warp::reply::with_status(
			warp::reply::json(&json!({ "outstanding": amount })),
			StatusCode::OK,
		),
		Err(e) => error_reply(e),
	}
}

fn handle_delinquent(pool: &PgPool, kv: &RedisPool, id: &Id) -> WithStatus<Json> {
	let loan_repo = loan::Repo::new(pool.clone());
	let payment_repo = payment::Repo::new(pool.clone());
	let store = RedisStore::new(kv.clone());
	let calendar = SystemCalendar;
	let service = Service::new(NewService {
		loan_repo: &loan_repo,
		payment_repo: &payment_repo,
		idempotency: &store,
		calendar: &calendar,
	});

	match service.is_delinquent(id) {
		Ok(delinquent) => warp::reply::with_status(
			warp::reply::json(&json!({ "delinquent": delinquent })),
			StatusCode::OK,
		),
		Err(e) => error_reply(e),
	}
}

fn handle_make_payment(pool: &PgPool, kv: &RedisPool, id: &Id, key: &str, req: PaymentRequest) -> WithStatus<Json> {
	let amount = match decimal(req.amount) {
		Ok(v) => v,
		Err(reply) => return reply,
	};

	let loan_repo = loan::Repo::new(pool.clone());
	let payment_repo = payment::Repo::new(pool.clone());
	let store = RedisStore::new(kv.clone());
	let calendar = SystemCalendar;
	let service = Service::new(NewService {
		loan_repo: &loan_repo,
		payment_repo: &payment_repo,
		idempotency: &store,
		calendar: &calendar,
	});

	match service.make_payment(id, &amount, Some(key)) {
		Ok(()) => warp::reply::with_status(
			warp::reply::json(&json!({ "message": "payment processed" })),
			StatusCode::OK,
		),
		Err(e) => error_reply(e),
	}
}

// JSON numbers arrive as f64; going through the display form keeps the digits
// the client wrote instead of the binary expansion.
fn decimal(value: f64) -> Result<BigDecimal, WithStatus<Json>> {
	BigDecimal::from_str(&format!("{}", value)).map_err(|_| {
		warp::reply::with_status(
			warp::reply::json(&json!({ "error": "invalid amount" })),
			StatusCode::BAD_REQUEST,
		)
	})
}

fn error_reply(err: billing::Error) -> WithStatus<Json> {
	let status = if err.is_not_found() {
		StatusCode::NOT_FOUND
	} else {
		match err.kind() {
			ErrorKind::InvalidTerms(_)
			| ErrorKind::InvalidAmount
			| ErrorKind::AmountMismatch
			| ErrorKind::NothingDue => StatusCode::BAD_REQUEST,
			ErrorKind::Database(db::Error::Conflict) => StatusCode::CONFLICT,
			_ => StatusCode::INTERNAL_SERVER_ERROR,
		}
	};
	warp::reply::with_status(warp::reply::json(&json!({ "error": err.to_string() })), status)
}
