//! 内置函数表
//!
//! 记录每个 OData 函数的参数个数范围与返回类型，解析器据此拒绝未知函数和参数个数错误。

use crate::core::error::{ODataError, ODataResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnKind {
    Boolean,
    String,
    Integer,
    Decimal,
    /// 与第一个参数相同
    SameAsArgument,
    Date,
    TimeOfDay,
    DateTimeOffset,
    /// 由 cast 的目标类型决定
    Cast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionSignature {
    pub name: &'static str,
    pub min_args: usize,
    pub max_args: usize,
    pub returns: ReturnKind,
}

const fn sig(name: &'static str, min_args: usize, max_args: usize, returns: ReturnKind) -> FunctionSignature {
    FunctionSignature {
        name,
        min_args,
        max_args,
        returns,
    }
}

static FUNCTIONS: &[FunctionSignature] = &[
    // 字符串
    sig("contains", 2, 2, ReturnKind::Boolean),
    sig("startswith", 2, 2, ReturnKind::Boolean),
    sig("endswith", 2, 2, ReturnKind::Boolean),
    sig("matchesPattern", 2, 2, ReturnKind::Boolean),
    sig("length", 1, 1, ReturnKind::Integer),
    sig("indexof", 2, 2, ReturnKind::Integer),
    sig("substring", 2, 3, ReturnKind::String),
    sig("tolower", 1, 1, ReturnKind::String),
    sig("toupper", 1, 1, ReturnKind::String),
    sig("trim", 1, 1, ReturnKind::String),
    sig("concat", 2, 2, ReturnKind::String),
    // 日期与时间
    sig("year", 1, 1, ReturnKind::Integer),
    sig("month", 1, 1, ReturnKind::Integer),
    sig("day", 1, 1, ReturnKind::Integer),
    sig("hour", 1, 1, ReturnKind::Integer),
    sig("minute", 1, 1, ReturnKind::Integer),
    sig("second", 1, 1, ReturnKind::Integer),
    sig("fractionalseconds", 1, 1, ReturnKind::Decimal),
    sig("totaloffsetminutes", 1, 1, ReturnKind::Integer),
    sig("date", 1, 1, ReturnKind::Date),
    sig("time", 1, 1, ReturnKind::TimeOfDay),
    sig("now", 0, 0, ReturnKind::DateTimeOffset),
    sig("mindatetime", 0, 0, ReturnKind::DateTimeOffset),
    sig("maxdatetime", 0, 0, ReturnKind::DateTimeOffset),
    // 数学
    sig("round", 1, 1, ReturnKind::SameAsArgument),
    sig("floor", 1, 1, ReturnKind::SameAsArgument),
    sig("ceiling", 1, 1, ReturnKind::SameAsArgument),
    // 类型
    sig("cast", 1, 2, ReturnKind::Cast),
    sig("isof", 1, 2, ReturnKind::Boolean),
    // 地理
    sig("geo.distance", 2, 2, ReturnKind::Decimal),
    sig("geo.length", 1, 1, ReturnKind::Decimal),
    sig("geo.intersects", 2, 2, ReturnKind::Boolean),
];

/// 查找函数签名；`matchesPattern` 之外的函数名大小写不敏感
pub fn lookup(name: &str) -> Option<&'static FunctionSignature> {
    FUNCTIONS
        .iter()
        .find(|f| f.name == name)
        .or_else(|| FUNCTIONS.iter().find(|f| f.name.eq_ignore_ascii_case(name)))
}

/// 校验函数存在且参数个数合法，返回规范签名
pub fn check_arity(name: &str, found: usize) -> ODataResult<&'static FunctionSignature> {
    let signature = lookup(name).ok_or_else(|| ODataError::UnsupportedFunction(name.to_string()))?;
    if found < signature.min_args || found > signature.max_args {
        let expected = if signature.min_args == signature.max_args {
            signature.min_args.to_string()
        } else {
            format!("{}-{}", signature.min_args, signature.max_args)
        };
        return Err(ODataError::InvalidArgumentCount {
            function: signature.name.to_string(),
            expected,
            found,
        });
    }
    Ok(signature)
}

pub fn is_boolean_function(name: &str) -> bool {
    lookup(name).is_some_and(|f| f.returns == ReturnKind::Boolean)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(lookup("ToLower").map(|f| f.name), Some("tolower"));
        assert_eq!(lookup("matchespattern").map(|f| f.name), Some("matchesPattern"));
        assert!(lookup("frobnicate").is_none());
    }

    #[test]
    fn test_arity_errors() {
        assert!(check_arity("substring", 2).is_ok());
        assert!(check_arity("substring", 3).is_ok());
        let err = check_arity("substring", 1).expect_err("参数不足应报错");
        assert_eq!(
            err,
            ODataError::InvalidArgumentCount {
                function: "substring".to_string(),
                expected: "2-3".to_string(),
                found: 1
            }
        );
        assert_eq!(
            check_arity("bogus", 1),
            Err(ODataError::UnsupportedFunction("bogus".to_string()))
        );
    }

    #[test]
    fn test_boolean_functions() {
        assert!(is_boolean_function("contains"));
        assert!(is_boolean_function("geo.intersects"));
        assert!(!is_boolean_function("length"));
    }
}
