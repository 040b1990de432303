//! Parameter binding utilities for database queries.
//!
//! Every value reaches the server through the extended protocol's bind step,
//! in the order given. Strings are sent as TEXT; where the server expects some
//! other type (a date column, `now() > %s`) the placeholder gets an explicit
//! cast, chosen by describing the statement first.

use crate::db::sql::rewrite_placeholders;
use crate::error::DbResult;
use crate::models::SqlValue;
use serde_json::Value as JsonValue;
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::postgres::{PgArgumentBuffer, PgArguments, PgConnection, PgTypeInfo, PgTypeKind};
use sqlx::query::Query;
use sqlx::types::Json;
use sqlx::{Connection, Either, Encode, Executor, Postgres, Statement, Type, TypeInfo};
use std::borrow::Cow;
use std::collections::HashMap;

/// A NULL whose parameter type is left for the server to infer.
///
/// Declaring the parameter as `unknown` lets the same NULL land in an integer,
/// date or text column alike, where a typed `None::<String>` would be TEXT.
#[derive(Debug, Clone, Copy)]
pub(crate) struct UntypedNull;

impl Type<Postgres> for UntypedNull {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("unknown")
    }
}

impl Encode<'_, Postgres> for UntypedNull {
    fn encode_by_ref(&self, _buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        Ok(IsNull::Yes)
    }
}

/// Bind a single value to a PostgreSQL query.
pub(crate) fn bind_param<'q>(
    query: Query<'q, Postgres, PgArguments>,
    param: &'q SqlValue,
) -> Query<'q, Postgres, PgArguments> {
    match param {
        SqlValue::Null => query.bind(UntypedNull),
        SqlValue::Bool(v) => query.bind(*v),
        SqlValue::Int(v) => query.bind(*v),
        SqlValue::Float(v) => query.bind(*v),
        SqlValue::String(v) => query.bind(v.as_str()),
        SqlValue::Json(v) => query.bind(Json(v)),
    }
}

/// Build a query with all values bound positionally.
///
/// Statements are not cached on the connection: parameter types follow the
/// values of each call, so the same text may be bound with a NULL one time and
/// an integer the next.
pub(crate) fn build_query<'q>(
    sql: &'q str,
    params: &'q [SqlValue],
) -> Query<'q, Postgres, PgArguments> {
    params
        .iter()
        .fold(sqlx::query(sql).persistent(false), bind_param)
}

/// Parameter types declared when describing a statement.
///
/// Strings stay `unknown` so the description carries the type the server
/// infers for them; every other value is declared as it will be bound.
fn describe_types(params: &[SqlValue]) -> Vec<PgTypeInfo> {
    params
        .iter()
        .map(|param| match param {
            SqlValue::Null | SqlValue::String(_) => UntypedNull::type_info(),
            SqlValue::Bool(_) => <bool as Type<Postgres>>::type_info(),
            SqlValue::Int(_) => <i64 as Type<Postgres>>::type_info(),
            SqlValue::Float(_) => <f64 as Type<Postgres>>::type_info(),
            SqlValue::Json(_) => <Json<JsonValue> as Type<Postgres>>::type_info(),
        })
        .collect()
}

/// Ask the server which type it infers for each parameter of `sql`.
///
/// The named statement this creates is closed again before returning.
pub(crate) async fn describe_params(
    conn: &mut PgConnection,
    sql: &str,
    params: &[SqlValue],
) -> DbResult<Vec<PgTypeInfo>> {
    let declared = describe_types(params);
    let types = {
        let statement = (&mut *conn).prepare_with(sql, &declared).await?;
        match statement.parameters() {
            Some(Either::Left(types)) => types.to_vec(),
            _ => Vec::new(),
        }
    };
    conn.clear_cached_statements().await?;
    Ok(types)
}

/// Cast target for a TEXT parameter the server inferred as `ty`.
///
/// `None` for the character types, which accept TEXT by assignment.
pub(crate) fn text_cast_target(ty: &PgTypeInfo) -> Option<String> {
    let name = ty.name();
    match name.to_ascii_uppercase().as_str() {
        "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" | "UNKNOWN" => return None,
        // Bare BIT means BIT(1); VARBIT assigns to any width.
        "BIT" => return Some("VARBIT".to_string()),
        _ => {}
    }
    // User-defined names keep their case; resolved types carry an OID.
    let user_defined = ty.oid().is_some()
        && matches!(
            ty.kind(),
            PgTypeKind::Enum(_) | PgTypeKind::Domain(_) | PgTypeKind::Composite(_)
        );
    if user_defined && !name.starts_with('"') {
        Some(format!("\"{}\"", name.replace('"', "\"\"")))
    } else {
        Some(name.to_string())
    }
}

/// Append casts to the placeholders of string values whose inferred type
/// TEXT cannot be assigned to. `inferred` is indexed like `params`.
pub(crate) fn cast_string_params<'s>(
    sql: &'s str,
    params: &[SqlValue],
    inferred: &[PgTypeInfo],
) -> Cow<'s, str> {
    let casts: HashMap<usize, String> = params
        .iter()
        .zip(inferred)
        .enumerate()
        .filter(|(_, (param, _))| matches!(param, SqlValue::String(_)))
        .filter_map(|(idx, (_, ty))| text_cast_target(ty).map(|target| (idx + 1, target)))
        .collect();

    if casts.is_empty() {
        return Cow::Borrowed(sql);
    }
    Cow::Owned(rewrite_placeholders(sql, |n| match casts.get(&n) {
        Some(target) => format!("${n}::{target}"),
        None => format!("${n}"),
    }))
}
