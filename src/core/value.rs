//! 查询值类型
//!
//! 表示字面量、SQL 绑定参数以及内存记录中的字段值

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, SecondsFormat};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use uuid::Uuid;

/// 统一的值类型
///
/// 既用作 AST 字面量的载荷，也用作生成 SQL 时的位置参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Date(NaiveDate),
    TimeOfDay(NaiveTime),
    DateTimeOffset(DateTime<FixedOffset>),
    Guid(Uuid),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    /// 数值转换为 f64，非数值返回 None
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Edm 类型名称，用于错误消息
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Edm.Boolean",
            Value::Int(_) => "Edm.Int64",
            Value::Float(_) => "Edm.Double",
            Value::String(_) => "Edm.String",
            Value::Date(_) => "Edm.Date",
            Value::TimeOfDay(_) => "Edm.TimeOfDay",
            Value::DateTimeOffset(_) => "Edm.DateTimeOffset",
            Value::Guid(_) => "Edm.Guid",
        }
    }

    /// 转换为 JSON 值，用于与物化后的行数据比较
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Int(i) => JsonValue::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            other => JsonValue::String(other.to_string()),
        }
    }

    /// 从 JSON 值构造
    ///
    /// 数组和对象按其 JSON 文本保存为字符串
    pub fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(s) => Value::String(s.clone()),
            other => Value::String(other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) if v.is_nan() => write!(f, "NaN"),
            Value::Float(v) if v.is_infinite() => {
                write!(f, "{}", if *v > 0.0 { "INF" } else { "-INF" })
            }
            Value::Float(v) => write!(f, "{}", v),
            Value::String(s) => write!(f, "{}", s),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::TimeOfDay(t) => write!(f, "{}", t.format("%H:%M:%S%.f")),
            Value::DateTimeOffset(dt) => {
                write!(f, "{}", dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            Value::Guid(g) => write!(f, "{}", g.hyphenated()),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Guid(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Int(42).to_string(), "42");
        assert_eq!(Value::Float(f64::INFINITY).to_string(), "INF");
        assert_eq!(Value::Float(f64::NEG_INFINITY).to_string(), "-INF");
        assert_eq!(Value::Bool(true).to_string(), "true");
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).expect("合法日期");
        assert_eq!(Value::Date(date).to_string(), "2024-01-15");
    }

    #[test]
    fn test_value_json_conversion() {
        let json = serde_json::json!({"a": 1, "b": 2.5, "c": "x", "d": null});
        assert_eq!(Value::from_json(&json["a"]), Value::Int(1));
        assert_eq!(Value::from_json(&json["b"]), Value::Float(2.5));
        assert_eq!(Value::from_json(&json["c"]), Value::from("x"));
        assert!(Value::from_json(&json["d"]).is_null());
        assert_eq!(Value::Int(7).to_json(), serde_json::json!(7));
    }

    #[test]
    fn test_value_numeric_helpers() {
        assert_eq!(Value::Float(3.0).as_i64(), Some(3));
        assert_eq!(Value::Float(3.5).as_i64(), None);
        assert!(Value::Int(1).is_numeric());
        assert!(!Value::from("1").is_numeric());
    }
}
