//! 函数调用的方言映射
//!
//! 参数先各自渲染成片段，再按方言模板拼接；模板中重复出现的参数会重复绑定其值，
//! 保证占位符与参数一一对应。

use super::dialect::SqlDialect;
use super::fragment::SqlFragment;
use crate::core::error::{ODataError, ODataResult};

/// 模板中的一段：原样文本或第 n 个参数
enum Piece<'t> {
    Text(&'t str),
    Arg(usize),
}

fn render(pieces: &[Piece<'_>], args: &[SqlFragment]) -> ODataResult<SqlFragment> {
    let mut out = SqlFragment::default();
    for piece in pieces {
        match piece {
            Piece::Text(text) => {
                out.push_str(text);
            }
            Piece::Arg(i) => {
                let arg = args.get(*i).ok_or_else(|| {
                    ODataError::InvalidArgumentCount {
                        function: "function".to_string(),
                        expected: format!("at least {}", i + 1),
                        found: args.len(),
                    }
                })?;
                out.push_fragment(arg);
            }
        }
    }
    Ok(out)
}

fn strftime_part(format: &str, args: &[SqlFragment]) -> ODataResult<SqlFragment> {
    let mut out = SqlFragment::new(format!("CAST(strftime('{}', ", format));
    out.push_fragment(first(args)?);
    out.push_str(") AS INTEGER)");
    Ok(out)
}

fn extract_part(field: &str, args: &[SqlFragment]) -> ODataResult<SqlFragment> {
    let mut out = SqlFragment::new(format!("EXTRACT({} FROM ", field));
    out.push_fragment(first(args)?);
    out.push_str(")");
    Ok(out)
}

fn first(args: &[SqlFragment]) -> ODataResult<&SqlFragment> {
    args.first().ok_or_else(|| ODataError::InvalidArgumentCount {
        function: "function".to_string(),
        expected: "1".to_string(),
        found: 0,
    })
}

/// 渲染函数调用；`name` 是规范化后的函数名
pub fn function_sql(
    dialect: SqlDialect,
    name: &str,
    args: &[SqlFragment],
) -> ODataResult<SqlFragment> {
    use Piece::{Arg, Text};
    let sqlite = dialect == SqlDialect::Sqlite;

    match name {
        "length" => render(&[Text("LENGTH("), Arg(0), Text(")")], args),
        "tolower" => render(&[Text("LOWER("), Arg(0), Text(")")], args),
        "toupper" => render(&[Text("UPPER("), Arg(0), Text(")")], args),
        "trim" => render(&[Text("TRIM("), Arg(0), Text(")")], args),
        "indexof" if sqlite => render(&[Text("(INSTR("), Arg(0), Text(", "), Arg(1), Text(") - 1)")], args),
        "indexof" => render(&[Text("(STRPOS("), Arg(0), Text(", "), Arg(1), Text(") - 1)")], args),
        "substring" if args.len() == 3 => render(
            &[Text("SUBSTR("), Arg(0), Text(", ("), Arg(1), Text(") + 1, "), Arg(2), Text(")")],
            args,
        ),
        "substring" => render(&[Text("SUBSTR("), Arg(0), Text(", ("), Arg(1), Text(") + 1)")], args),
        "concat" if sqlite => render(&[Text("("), Arg(0), Text(" || "), Arg(1), Text(")")], args),
        "concat" => render(&[Text("CONCAT("), Arg(0), Text(", "), Arg(1), Text(")")], args),

        "year" if sqlite => strftime_part("%Y", args),
        "month" if sqlite => strftime_part("%m", args),
        "day" if sqlite => strftime_part("%d", args),
        "hour" if sqlite => strftime_part("%H", args),
        "minute" if sqlite => strftime_part("%M", args),
        "second" if sqlite => strftime_part("%S", args),
        "year" => extract_part("YEAR", args),
        "month" => extract_part("MONTH", args),
        "day" => extract_part("DAY", args),
        "hour" => extract_part("HOUR", args),
        "minute" => extract_part("MINUTE", args),
        "second" => render(&[Text("FLOOR(EXTRACT(SECOND FROM "), Arg(0), Text("))")], args),
        "fractionalseconds" if sqlite => render(
            &[
                Text("(CAST(strftime('%f', "),
                Arg(0),
                Text(") AS REAL) - CAST(strftime('%S', "),
                Arg(0),
                Text(") AS INTEGER))"),
            ],
            args,
        ),
        "fractionalseconds" => render(
            &[
                Text("(EXTRACT(SECOND FROM "),
                Arg(0),
                Text(") - FLOOR(EXTRACT(SECOND FROM "),
                Arg(0),
                Text(")))"),
            ],
            args,
        ),
        "totaloffsetminutes" if sqlite => render(
            &[
                Text("CAST(ROUND((julianday(SUBSTR("),
                Arg(0),
                Text(", 1, 19)) - julianday("),
                Arg(0),
                Text(")) * 1440) AS INTEGER)"),
            ],
            args,
        ),
        "totaloffsetminutes" => render(&[Text("(EXTRACT(TIMEZONE FROM "), Arg(0), Text(") / 60)")], args),
        "date" if sqlite => render(&[Text("date("), Arg(0), Text(")")], args),
        "date" => render(&[Text("CAST("), Arg(0), Text(" AS DATE)")], args),
        "time" if sqlite => render(&[Text("time("), Arg(0), Text(")")], args),
        "time" => render(&[Text("CAST("), Arg(0), Text(" AS TIME)")], args),
        "now" if sqlite => Ok(SqlFragment::new("strftime('%Y-%m-%dT%H:%M:%fZ', 'now')")),
        "now" => Ok(SqlFragment::new("NOW()")),
        "mindatetime" if sqlite => Ok(SqlFragment::new("'0001-01-01T00:00:00.000Z'")),
        "mindatetime" => Ok(SqlFragment::new("TIMESTAMPTZ '0001-01-01 00:00:00+00'")),
        "maxdatetime" if sqlite => Ok(SqlFragment::new("'9999-12-31T23:59:59.999Z'")),
        "maxdatetime" => Ok(SqlFragment::new("TIMESTAMPTZ '9999-12-31 23:59:59.999+00'")),

        "round" => render(&[Text("ROUND("), Arg(0), Text(")")], args),
        "floor" if sqlite => render(
            &[
                Text("(CASE WHEN "),
                Arg(0),
                Text(" >= 0 OR "),
                Arg(0),
                Text(" = CAST("),
                Arg(0),
                Text(" AS INTEGER) THEN CAST("),
                Arg(0),
                Text(" AS INTEGER) ELSE CAST("),
                Arg(0),
                Text(" AS INTEGER) - 1 END)"),
            ],
            args,
        ),
        "floor" => render(&[Text("FLOOR("), Arg(0), Text(")")], args),
        "ceiling" if sqlite => render(
            &[
                Text("(CASE WHEN "),
                Arg(0),
                Text(" <= 0 OR "),
                Arg(0),
                Text(" = CAST("),
                Arg(0),
                Text(" AS INTEGER) THEN CAST("),
                Arg(0),
                Text(" AS INTEGER) ELSE CAST("),
                Arg(0),
                Text(" AS INTEGER) + 1 END)"),
            ],
            args,
        ),
        "ceiling" => render(&[Text("CEIL("), Arg(0), Text(")")], args),

        "geo.distance" => render(&[Text("ST_Distance("), Arg(0), Text(", "), Arg(1), Text(")")], args),
        "geo.length" => render(&[Text("ST_Length("), Arg(0), Text(")")], args),
        "geo.intersects" => {
            render(&[Text("ST_Intersects("), Arg(0), Text(", "), Arg(1), Text(")")], args)
        }

        other => Err(ODataError::UnsupportedFunction(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Value;

    fn col(name: &str) -> SqlFragment {
        SqlFragment::new(name)
    }

    #[test]
    fn test_dialect_specific_functions() {
        let args = [col("name"), col("other")];
        assert_eq!(
            function_sql(SqlDialect::Sqlite, "concat", &args).map(|f| f.sql),
            Ok("(name || other)".to_string())
        );
        assert_eq!(
            function_sql(SqlDialect::Postgres, "concat", &args).map(|f| f.sql),
            Ok("CONCAT(name, other)".to_string())
        );
        assert_eq!(
            function_sql(SqlDialect::Sqlite, "year", &[col("created_at")]).map(|f| f.sql),
            Ok("CAST(strftime('%Y', created_at) AS INTEGER)".to_string())
        );
        assert_eq!(
            function_sql(SqlDialect::Postgres, "year", &[col("created_at")]).map(|f| f.sql),
            Ok("EXTRACT(YEAR FROM created_at)".to_string())
        );
    }

    #[test]
    fn test_repeated_argument_rebinds_values() {
        let arg = SqlFragment::with_args("(price * ?)", vec![Value::Float(1.5)]);
        let frag = function_sql(SqlDialect::Sqlite, "floor", &[arg]).expect("floor 应可渲染");
        assert_eq!(frag.args.len(), 5);
        assert!(frag.is_consistent());
    }

    #[test]
    fn test_unknown_function() {
        assert_eq!(
            function_sql(SqlDialect::Sqlite, "soundex", &[col("x")]),
            Err(ODataError::UnsupportedFunction("soundex".to_string()))
        );
    }
}
