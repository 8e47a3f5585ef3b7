pub mod error;
pub mod schedule;
mod service;

pub use self::error::{Error, ErrorKind};
pub use self::service::{Calendar, NewService, Service, SystemCalendar};

pub type Result<T> = std::result::Result<T, Error>;
