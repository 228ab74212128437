use rust_decimal::Decimal;
use sqlx::postgres::PgArguments;
use sqlx::Postgres;
use uuid::Uuid;

/// A positional argument captured while building a predicate
#[derive(Debug, Clone, PartialEq)]
pub enum Bind {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Uuid(Uuid),
    Decimal(Decimal),
}

impl From<bool> for Bind {
    fn from(v: bool) -> Self {
        Bind::Bool(v)
    }
}

impl From<i64> for Bind {
    fn from(v: i64) -> Self {
        Bind::Int(v)
    }
}

impl From<i32> for Bind {
    fn from(v: i32) -> Self {
        Bind::Int(v as i64)
    }
}

impl From<f64> for Bind {
    fn from(v: f64) -> Self {
        Bind::Float(v)
    }
}

impl From<String> for Bind {
    fn from(v: String) -> Self {
        Bind::Text(v)
    }
}

impl From<&str> for Bind {
    fn from(v: &str) -> Self {
        Bind::Text(v.to_string())
    }
}

impl From<Uuid> for Bind {
    fn from(v: Uuid) -> Self {
        Bind::Uuid(v)
    }
}

impl From<Decimal> for Bind {
    fn from(v: Decimal) -> Self {
        Bind::Decimal(v)
    }
}

/// Attach a captured argument to a typed query in placeholder order
pub(crate) fn push_bind<'q, O>(
    query: sqlx::query::QueryAs<'q, Postgres, O, PgArguments>,
    bind: &Bind,
) -> sqlx::query::QueryAs<'q, Postgres, O, PgArguments> {
    match bind {
        Bind::Bool(v) => query.bind(*v),
        Bind::Int(v) => query.bind(*v),
        Bind::Float(v) => query.bind(*v),
        Bind::Text(v) => query.bind(v.clone()),
        Bind::Uuid(v) => query.bind(*v),
        Bind::Decimal(v) => query.bind(*v),
    }
}
