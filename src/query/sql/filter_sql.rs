//! FilterExpression → WHERE / HAVING 片段

use super::dialect::SqlDialect;
use super::fragment::SqlFragment;
use super::function_sql::function_sql;
use super::lambda_sql::{count_subquery, lambda_exists, scalar_subquery};
use crate::core::error::ODataResult;
use crate::core::Value;
use crate::query::resolver::{
    AggregateMethod, ArithmeticOp, CompareOp, FilterExpression, Operand, StringMatchOp,
};
use crate::utils::escape_like;

#[derive(Debug, Clone, Copy)]
pub struct FilterSqlBuilder {
    dialect: SqlDialect,
}

impl FilterSqlBuilder {
    pub fn new(dialect: SqlDialect) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    pub fn build(&self, filter: &FilterExpression) -> ODataResult<SqlFragment> {
        let fragment = self.filter_sql(filter)?;
        log::debug!("过滤条件 SQL: {} ({} 个参数)", fragment.sql, fragment.args.len());
        Ok(fragment)
    }

    fn filter_sql(&self, filter: &FilterExpression) -> ODataResult<SqlFragment> {
        match filter {
            FilterExpression::Logical { op, left, right } => {
                let mut out = self.filter_sql(left)?.parenthesized();
                out.push_str(&format!(" {} ", op.sql()));
                out.push_fragment(&self.filter_sql(right)?.parenthesized());
                Ok(out)
            }
            FilterExpression::Not(inner) => {
                let mut out = SqlFragment::new("NOT ");
                out.push_fragment(&self.filter_sql(inner)?.parenthesized());
                Ok(out)
            }
            FilterExpression::Comparison { left, op, right } => self.comparison_sql(left, *op, right),
            FilterExpression::In { operand, values } => {
                let mut out = self.operand_sql(operand)?;
                out.push_str(" IN (");
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.bind(value.clone());
                }
                out.push_str(")");
                Ok(out)
            }
            FilterExpression::HasFlag { operand, flag } => {
                let mut out = SqlFragment::new("(");
                out.push_fragment(&self.operand_sql(operand)?);
                out.push_str(" & ");
                out.bind(Value::Int(*flag));
                out.push_str(") = ");
                out.bind(Value::Int(*flag));
                Ok(out)
            }
            FilterExpression::StringMatch {
                op,
                operand,
                pattern,
            } => self.string_match_sql(*op, operand, pattern),
            FilterExpression::BoolFunction { name, args } => {
                let args = args
                    .iter()
                    .map(|a| self.operand_sql(a))
                    .collect::<ODataResult<Vec<_>>>()?;
                function_sql(self.dialect, name, &args)
            }
            FilterExpression::IsOf {
                type_name,
                discriminator,
            } => match discriminator {
                Some(column) => {
                    let mut out = SqlFragment::new(
                        self.dialect.column(column.qualifier.as_deref(), &column.column),
                    );
                    out.push_str(" = ");
                    out.bind(Value::String(type_name.clone()));
                    Ok(out)
                }
                None => Ok(SqlFragment::new("1=0")),
            },
            FilterExpression::Lambda {
                op,
                correlation,
                predicate,
                ..
            } => {
                let predicate = predicate
                    .as_deref()
                    .map(|p| self.filter_sql(p))
                    .transpose()?;
                Ok(lambda_exists(self.dialect, *op, correlation, predicate.as_ref()))
            }
            FilterExpression::Constant(true) => Ok(SqlFragment::new("1=1")),
            FilterExpression::Constant(false) => Ok(SqlFragment::new("1=0")),
        }
    }

    fn comparison_sql(&self, left: &Operand, op: CompareOp, right: &Operand) -> ODataResult<SqlFragment> {
        let null_check = |operand: &Operand| -> ODataResult<Option<SqlFragment>> {
            let keyword = match op {
                CompareOp::Eq => " IS NULL",
                CompareOp::Ne => " IS NOT NULL",
                _ => return Ok(None),
            };
            let mut out = self.operand_sql(operand)?;
            out.push_str(keyword);
            Ok(Some(out))
        };

        match (left, right) {
            (_, Operand::Literal(Value::Null)) => {
                if let Some(out) = null_check(left)? {
                    return Ok(out);
                }
            }
            (Operand::Literal(Value::Null), _) => {
                if let Some(out) = null_check(right)? {
                    return Ok(out);
                }
            }
            _ => {}
        }

        let mut out = self.operand_sql(left)?;
        out.push_str(&format!(" {} ", op.sql()));
        out.push_fragment(&self.operand_sql(right)?);
        Ok(out)
    }

    fn string_match_sql(
        &self,
        op: StringMatchOp,
        operand: &Operand,
        pattern: &Operand,
    ) -> ODataResult<SqlFragment> {
        let mut out = self.operand_sql(operand)?;

        if op == StringMatchOp::MatchesPattern {
            out.push_str(match self.dialect {
                SqlDialect::Sqlite => " REGEXP ",
                SqlDialect::Postgres => " ~ ",
            });
            out.push_fragment(&self.operand_sql(pattern)?);
            return Ok(out);
        }

        out.push_str(" LIKE ");
        match pattern {
            Operand::Literal(Value::String(text)) => {
                let escaped = escape_like(text);
                let like = match op {
                    StringMatchOp::Contains => format!("%{}%", escaped),
                    StringMatchOp::StartsWith => format!("{}%", escaped),
                    _ => format!("%{}", escaped),
                };
                out.bind(Value::String(like));
            }
            other => {
                let inner = self.operand_sql(other)?;
                if matches!(op, StringMatchOp::Contains | StringMatchOp::EndsWith) {
                    out.push_str("'%' || ");
                }
                out.push_fragment(&inner);
                if matches!(op, StringMatchOp::Contains | StringMatchOp::StartsWith) {
                    out.push_str(" || '%'");
                }
            }
        }
        out.push_str(" ESCAPE '\\'");
        Ok(out)
    }

    /// 操作数的 SQL 表达式
    pub fn operand_sql(&self, operand: &Operand) -> ODataResult<SqlFragment> {
        let dialect = self.dialect;
        match operand {
            Operand::Property(p) => Ok(SqlFragment::new(
                dialect.column(p.qualifier.as_deref(), &p.column),
            )),
            Operand::Navigation {
                correlation, leaf, ..
            } => Ok(scalar_subquery(dialect, correlation, &leaf.column)),
            Operand::CollectionCount { correlation, .. } => Ok(count_subquery(dialect, correlation)),
            Operand::Literal(value) => {
                let mut out = SqlFragment::default();
                out.bind(value.clone());
                Ok(out)
            }
            Operand::Spatial { wkt, srid } => {
                let func = match dialect {
                    SqlDialect::Sqlite => "GeomFromText",
                    SqlDialect::Postgres => "ST_GeomFromText",
                };
                let mut out = SqlFragment::new(format!("{}(", func));
                out.bind(Value::String(wkt.clone()));
                out.push_str(&format!(", {})", srid));
                Ok(out)
            }
            Operand::Function { name, args } => {
                let args = args
                    .iter()
                    .map(|a| self.operand_sql(a))
                    .collect::<ODataResult<Vec<_>>>()?;
                function_sql(dialect, name, &args)
            }
            Operand::Arithmetic { op, left, right } => {
                let mut out = SqlFragment::new("(");
                let left = self.operand_sql(left)?;
                if *op == ArithmeticOp::DivBy {
                    out.push_str("CAST(");
                    out.push_fragment(&left);
                    out.push_str(&format!(" AS {})", dialect.real_type()));
                } else {
                    out.push_fragment(&left);
                }
                out.push_str(&format!(" {} ", op.sql()));
                out.push_fragment(&self.operand_sql(right)?);
                out.push_str(")");
                Ok(out)
            }
            Operand::Negate(inner) => {
                let mut out = SqlFragment::new("-");
                out.push_fragment(&self.operand_sql(inner)?.parenthesized());
                Ok(out)
            }
            Operand::Cast { operand, target } => {
                let mut out = SqlFragment::new("CAST(");
                out.push_fragment(&self.operand_sql(operand)?);
                out.push_str(&format!(" AS {})", dialect.cast_type(*target)));
                Ok(out)
            }
            Operand::Computed { expr, .. } => Ok(self.operand_sql(expr)?.parenthesized()),
            Operand::Aggregate {
                method, operand, ..
            } => {
                let inner = operand
                    .as_deref()
                    .map(|o| self.operand_sql(o))
                    .transpose()?;
                let (prefix, inner) = match (method, inner) {
                    (AggregateMethod::Count, _) | (_, None) => {
                        return Ok(SqlFragment::new("COUNT(*)"))
                    }
                    (AggregateMethod::Sum, Some(i)) => ("SUM(", i),
                    (AggregateMethod::Min, Some(i)) => ("MIN(", i),
                    (AggregateMethod::Max, Some(i)) => ("MAX(", i),
                    (AggregateMethod::Average, Some(i)) => ("AVG(", i),
                    (AggregateMethod::CountDistinct, Some(i)) => ("COUNT(DISTINCT ", i),
                };
                let mut out = SqlFragment::new(prefix);
                out.push_fragment(&inner);
                out.push_str(")");
                Ok(out)
            }
        }
    }
}

/// 便捷入口：过滤表达式 → `(sql, args)`
pub fn filter_to_sql(filter: &FilterExpression, dialect: SqlDialect) -> ODataResult<SqlFragment> {
    FilterSqlBuilder::new(dialect).build(filter)
}
