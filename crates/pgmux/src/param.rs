//! Binding-type classes and bound parameters.
//!
//! Every logical column type maps to one coarse [`BindingType`]. A caller [`Value`] is
//! coerced into its column's class when it is registered, producing a [`Param`]. At execution
//! time the param encodes itself for whatever Postgres type the server inferred for the
//! placeholder, so e.g. an integer-class value binds to `BIGINT` and `BOOLEAN` columns alike
//! and a text-class value binds to `DATE`/`TIMESTAMP` columns by parsing its literal.

use crate::error::{MuxError, MuxResult};
use crate::value::{FORMAT_DATE, FORMAT_DATETIME, Value};
use bytes::BytesMut;
use chrono::{NaiveDate, NaiveDateTime};
use std::error::Error;
use tokio_postgres::types::{IsNull, ToSql, Type};

/// Driver parameter class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingType {
    Integer,
    Decimal,
    Text,
    Binary,
}

impl BindingType {
    /// Coerce a caller value into this class.
    pub fn bind(self, column: &str, value: Value) -> MuxResult<Param> {
        let mismatch = |value: &Value| {
            MuxError::request(format!(
                "cannot bind {} value '{}' to column `{}` as {}",
                value.kind(),
                value,
                column,
                self.as_str()
            ))
        };

        let param = match (self, value) {
            (_, Value::Null) => Param::Null,

            (BindingType::Integer, v) => match v.as_i64() {
                Some(i) => Param::Integer(i),
                None => return Err(mismatch(&v)),
            },

            (BindingType::Decimal, Value::Int(i)) => Param::Decimal(i as f64),
            (BindingType::Decimal, Value::Float(f)) => Param::Decimal(f),
            (BindingType::Decimal, Value::Text(s)) => match s.trim().parse::<f64>() {
                Ok(f) => Param::Decimal(f),
                Err(_) => return Err(mismatch(&Value::Text(s))),
            },
            (BindingType::Decimal, v) => return Err(mismatch(&v)),

            (BindingType::Text, Value::Bytes(b)) => match String::from_utf8(b) {
                Ok(s) => Param::Text(s),
                Err(e) => return Err(mismatch(&Value::Bytes(e.into_bytes()))),
            },
            (BindingType::Text, v) => Param::Text(v.to_string()),

            (BindingType::Binary, Value::Bytes(b)) => Param::Binary(b),
            (BindingType::Binary, Value::Text(s)) => Param::Binary(s.into_bytes()),
            (BindingType::Binary, v) => return Err(mismatch(&v)),
        };
        Ok(param)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BindingType::Integer => "integer",
            BindingType::Decimal => "decimal",
            BindingType::Text => "text",
            BindingType::Binary => "binary",
        }
    }
}

/// A value coerced into its binding class, ready to be sent as a positional parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Null,
    Integer(i64),
    Decimal(f64),
    Text(String),
    Binary(Vec<u8>),
}

impl Param {
    /// The class this param was bound as (`None` for NULL).
    pub fn binding_type(&self) -> Option<BindingType> {
        match self {
            Param::Null => None,
            Param::Integer(_) => Some(BindingType::Integer),
            Param::Decimal(_) => Some(BindingType::Decimal),
            Param::Text(_) => Some(BindingType::Text),
            Param::Binary(_) => Some(BindingType::Binary),
        }
    }
}

fn is_text(ty: &Type) -> bool {
    matches!(
        *ty,
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN
    )
}

fn narrow<T: TryFrom<i64>>(i: i64, ty: &Type) -> Result<T, Box<dyn Error + Sync + Send>> {
    T::try_from(i).map_err(|_| format!("integer {i} out of range for {ty}").into())
}

impl ToSql for Param {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            Param::Null => Ok(IsNull::Yes),

            Param::Integer(i) => match *ty {
                Type::INT8 => i.to_sql(ty, out),
                Type::INT4 => narrow::<i32>(*i, ty)?.to_sql(ty, out),
                Type::INT2 => narrow::<i16>(*i, ty)?.to_sql(ty, out),
                Type::BOOL => (*i != 0).to_sql(ty, out),
                Type::FLOAT8 => (*i as f64).to_sql(ty, out),
                Type::FLOAT4 => (*i as f32).to_sql(ty, out),
                _ if is_text(ty) => i.to_string().to_sql(ty, out),
                _ => Err(format!("cannot bind integer to {ty}").into()),
            },

            Param::Decimal(f) => match *ty {
                Type::FLOAT8 => f.to_sql(ty, out),
                Type::FLOAT4 => (*f as f32).to_sql(ty, out),
                _ if is_text(ty) => f.to_string().to_sql(ty, out),
                _ => Err(format!("cannot bind decimal to {ty}").into()),
            },

            Param::Text(s) => match *ty {
                Type::DATE => NaiveDate::parse_from_str(s, FORMAT_DATE)?.to_sql(ty, out),
                Type::TIMESTAMP => {
                    NaiveDateTime::parse_from_str(s, FORMAT_DATETIME)?.to_sql(ty, out)
                }
                Type::INT8 => s.trim().parse::<i64>()?.to_sql(ty, out),
                Type::INT4 => s.trim().parse::<i32>()?.to_sql(ty, out),
                Type::INT2 => s.trim().parse::<i16>()?.to_sql(ty, out),
                Type::FLOAT8 => s.trim().parse::<f64>()?.to_sql(ty, out),
                Type::BOOL => matches!(s.trim(), "1" | "true" | "t").to_sql(ty, out),
                Type::BYTEA => s.as_bytes().to_sql(ty, out),
                _ if is_text(ty) => s.as_str().to_sql(ty, out),
                _ => Err(format!("cannot bind text to {ty}").into()),
            },

            Param::Binary(b) => match *ty {
                Type::BYTEA => b.as_slice().to_sql(ty, out),
                _ if is_text(ty) => std::str::from_utf8(b)?.to_sql(ty, out),
                _ => Err(format!("cannot bind binary to {ty}").into()),
            },
        }
    }

    fn accepts(ty: &Type) -> bool {
        is_text(ty)
            || matches!(
                *ty,
                Type::INT2
                    | Type::INT4
                    | Type::INT8
                    | Type::FLOAT4
                    | Type::FLOAT8
                    | Type::BOOL
                    | Type::BYTEA
                    | Type::DATE
                    | Type::TIMESTAMP
            )
    }

    tokio_postgres::types::to_sql_checked!();
}

/// An ordered list of params that can be lent to the driver.
#[derive(Clone, Debug, Default)]
pub struct ParamList {
    params: Vec<Param>,
}

impl ParamList {
    pub fn new() -> Self {
        Self { params: Vec::new() }
    }

    /// Add a param and return its 1-based index.
    pub fn push(&mut self, param: Param) -> usize {
        self.params.push(param);
        self.params.len()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Param> {
        self.params.get(idx)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Param> {
        self.params.iter()
    }

    /// Get all parameters as references for tokio-postgres.
    pub fn as_refs(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params
            .iter()
            .map(|p| p as &(dyn ToSql + Sync))
            .collect()
    }
}

impl FromIterator<Param> for ParamList {
    fn from_iter<I: IntoIterator<Item = Param>>(iter: I) -> Self {
        Self {
            params: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(p: &Param, ty: &Type) -> Result<BytesMut, Box<dyn Error + Sync + Send>> {
        let mut buf = BytesMut::new();
        p.to_sql(ty, &mut buf)?;
        Ok(buf)
    }

    fn encode_native(v: &NaiveDateTime, ty: &Type) -> BytesMut {
        let mut buf = BytesMut::new();
        v.to_sql(ty, &mut buf).unwrap();
        buf
    }

    #[test]
    fn integer_class_coercion() {
        let b = BindingType::Integer;
        assert_eq!(b.bind("age", Value::Int(3)).unwrap(), Param::Integer(3));
        assert_eq!(b.bind("flag", Value::Bool(true)).unwrap(), Param::Integer(1));
        assert_eq!(b.bind("age", Value::from("12")).unwrap(), Param::Integer(12));
        let err = b.bind("age", Value::from("%12%")).unwrap_err();
        assert!(err.is_request());
        assert!(err.to_string().contains("`age`"));
    }

    #[test]
    fn text_class_renders_literals() {
        let b = BindingType::Text;
        let d = NaiveDate::from_ymd_opt(2020, 2, 29).unwrap();
        assert_eq!(b.bind("born", Value::Date(d)).unwrap(), Param::Text("2020-02-29".into()));
        assert_eq!(b.bind("name", Value::Int(7)).unwrap(), Param::Text("7".into()));
        assert!(b.bind("name", Value::Bytes(vec![0xff])).is_err());
    }

    #[test]
    fn decimal_and_binary_classes() {
        assert_eq!(
            BindingType::Decimal.bind("price", Value::Int(2)).unwrap(),
            Param::Decimal(2.0)
        );
        assert!(BindingType::Decimal.bind("price", Value::Bool(true)).is_err());
        assert_eq!(
            BindingType::Binary.bind("blob", Value::from("ab")).unwrap(),
            Param::Binary(b"ab".to_vec())
        );
    }

    #[test]
    fn null_binds_in_every_class() {
        for b in [
            BindingType::Integer,
            BindingType::Decimal,
            BindingType::Text,
            BindingType::Binary,
        ] {
            assert_eq!(b.bind("c", Value::Null).unwrap(), Param::Null);
        }
    }

    #[test]
    fn integer_param_encodes_for_column_type() {
        assert_eq!(encode(&Param::Integer(5), &Type::INT8).unwrap().len(), 8);
        assert_eq!(encode(&Param::Integer(5), &Type::INT4).unwrap().len(), 4);
        assert_eq!(&encode(&Param::Integer(1), &Type::BOOL).unwrap()[..], &[1u8][..]);
        assert!(encode(&Param::Integer(i64::MAX), &Type::INT4).is_err());
    }

    #[test]
    fn text_param_parses_dates() {
        let ok = encode(&Param::Text("1979-04-20".into()), &Type::DATE);
        assert!(ok.is_ok());
        let bad = encode(&Param::Text("20/04/1979".into()), &Type::DATE);
        assert!(bad.is_err());
        let ts = encode(&Param::Text("2024-01-02 03:04:05".into()), &Type::TIMESTAMP);
        assert!(ts.is_ok());
    }

    #[test]
    fn date_time_binds_without_losing_microseconds() {
        let dt = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_micro_opt(3, 4, 5, 123_456)
            .unwrap();
        let param = BindingType::Text.bind("seen", Value::DateTime(dt)).unwrap();
        assert_eq!(param, Param::Text("2024-01-02 03:04:05.123456".into()));
        assert_eq!(
            encode(&param, &Type::TIMESTAMP).unwrap(),
            encode_native(&dt, &Type::TIMESTAMP)
        );
    }

    #[test]
    fn param_list_indices_are_one_based() {
        let mut list = ParamList::new();
        assert_eq!(list.push(Param::Integer(1)), 1);
        assert_eq!(list.push(Param::Text("a".into())), 2);
        assert_eq!(list.as_refs().len(), 2);
        assert_eq!(list.get(1), Some(&Param::Text("a".into())));
    }
}
