//! AST → FilterExpression 转换
//!
//! 按元数据解析标识符、校验字面量类型与数值范围、展开 lambda 与导航路径。
//! 标识符的查找顺序：lambda 变量 → `$it` → 计算/聚合别名 → 结构属性 →
//! 单值导航路径 → `Nav/$count`。

use std::collections::HashMap;
use std::sync::Arc;

use super::context::{ConversionContext, LambdaScope};
use super::filter_expr::{
    ArithmeticOp, CompareOp, FilterExpression, Operand, PropertyRef, StringMatchOp,
};
use super::functions::{self, ReturnKind};
use crate::core::error::{ODataError, ODataResult};
use crate::core::metadata::{EntityMetadata, PropertyMetadata, PropertyType};
use crate::core::Value;
use crate::query::parser::ast::*;

/// 解析过滤表达式
pub fn resolve(
    expr: &Expr,
    metadata: &EntityMetadata,
    aliases: &HashMap<String, Operand>,
    max_in_clause_size: usize,
) -> ODataResult<FilterExpression> {
    let mut ctx = ConversionContext::new(metadata)
        .with_aliases(aliases.clone())
        .with_max_in_clause_size(max_in_clause_size);
    let filter = ctx.convert(expr)?;
    filter.validate_in_clause_size(max_in_clause_size)?;
    Ok(filter)
}

/// 解析值表达式（`$compute`、`$orderby`、聚合参数）
pub fn resolve_operand(
    expr: &Expr,
    metadata: &EntityMetadata,
    aliases: &HashMap<String, Operand>,
) -> ODataResult<Operand> {
    let mut ctx = ConversionContext::new(metadata).with_aliases(aliases.clone());
    ctx.convert_operand(expr)
}

fn literal_of(expr: &Expr) -> Option<&LiteralExpr> {
    match expr.unwrap_group() {
        Expr::Literal(lit) => Some(lit),
        _ => None,
    }
}

/// cast/isof 的类型参数：字符串字面量或限定标识符
fn type_name_of(expr: &Expr) -> Option<String> {
    match expr.unwrap_group() {
        Expr::Literal(LiteralExpr {
            value: Value::String(s),
            kind: LiteralKind::String,
            ..
        }) => Some(s.clone()),
        Expr::Identifier(ident) => Some(ident.name.clone()),
        _ => None,
    }
}

fn compare_op(op: ComparisonOp) -> Option<CompareOp> {
    match op {
        ComparisonOp::Eq => Some(CompareOp::Eq),
        ComparisonOp::Ne => Some(CompareOp::Ne),
        ComparisonOp::Gt => Some(CompareOp::Gt),
        ComparisonOp::Ge => Some(CompareOp::Ge),
        ComparisonOp::Lt => Some(CompareOp::Lt),
        ComparisonOp::Le => Some(CompareOp::Le),
        ComparisonOp::Has | ComparisonOp::In => None,
    }
}

fn arithmetic_op(op: BinaryOp) -> Option<ArithmeticOp> {
    match op {
        BinaryOp::Add => Some(ArithmeticOp::Add),
        BinaryOp::Sub => Some(ArithmeticOp::Sub),
        BinaryOp::Mul => Some(ArithmeticOp::Mul),
        BinaryOp::Div => Some(ArithmeticOp::Div),
        BinaryOp::DivBy => Some(ArithmeticOp::DivBy),
        BinaryOp::Mod => Some(ArithmeticOp::Mod),
        BinaryOp::And | BinaryOp::Or => None,
    }
}

fn property_ref(prop: &PropertyMetadata, qualifier: Option<String>) -> PropertyRef {
    PropertyRef {
        name: prop.name.clone(),
        column: prop.column_name.clone(),
        qualifier,
        property_type: prop.property_type,
        enum_members: prop.enum_members.clone(),
    }
}

/// `SRID=4326;POINT(1 2)` → (WKT, SRID)
fn parse_spatial(text: &str) -> (String, i64) {
    if let Some(rest) = text.strip_prefix("SRID=") {
        if let Some((srid, wkt)) = rest.split_once(';') {
            if let Ok(srid) = srid.trim().parse::<i64>() {
                return (wkt.trim().to_string(), srid);
            }
        }
    }
    (text.trim().to_string(), 4326)
}

/// 整数列的取值范围检查
fn check_integer_range(value: &Value, ty: PropertyType, property: &str) -> ODataResult<()> {
    let Some((lo, hi)) = ty.integer_bounds() else {
        return Ok(());
    };
    let in_range = match value {
        Value::Int(i) => match ty {
            PropertyType::Int64 => true,
            PropertyType::UInt64 => *i >= 0,
            _ => (*i as f64) >= lo && (*i as f64) < hi,
        },
        Value::Float(f) => f.is_finite() && *f >= lo && *f < hi,
        _ => true,
    };
    if in_range {
        Ok(())
    } else {
        Err(ODataError::NumericOverflow {
            value: value.to_string(),
            property: property.to_string(),
            type_name: ty.edm_name().to_string(),
        })
    }
}

/// 枚举成员（可用逗号组合多个标志）→ 数值
fn enum_flags(prop: &PropertyRef, members: &str) -> ODataResult<i64> {
    let mut flags = 0i64;
    for member in members.split(',').map(str::trim) {
        let value = prop.enum_members.get(member).ok_or_else(|| {
            ODataError::TypeMismatch(format!(
                "'{}' is not a member of enum property '{}'",
                member, prop.name
            ))
        })?;
        flags |= value;
    }
    Ok(flags)
}

impl<'a> ConversionContext<'a> {
    pub fn convert(&mut self, expr: &Expr) -> ODataResult<FilterExpression> {
        match expr {
            Expr::Group(group) => self.convert(&group.inner),
            Expr::Binary(bin) => match bin.op {
                BinaryOp::And => Ok(FilterExpression::and(
                    self.convert(&bin.left)?,
                    self.convert(&bin.right)?,
                )),
                BinaryOp::Or => Ok(FilterExpression::or(
                    self.convert(&bin.left)?,
                    self.convert(&bin.right)?,
                )),
                op => Err(ODataError::TypeMismatch(format!(
                    "arithmetic expression '{}' is not a boolean predicate",
                    op
                ))),
            },
            Expr::Unary(unary) => match unary.op {
                UnaryOp::Not => Ok(FilterExpression::negate(self.convert(&unary.operand)?)),
                UnaryOp::Negate => Err(ODataError::TypeMismatch(
                    "negated value is not a boolean predicate".to_string(),
                )),
            },
            Expr::Comparison(cmp) => self.convert_comparison(cmp),
            Expr::FunctionCall(call) => self.convert_predicate_function(call),
            Expr::Lambda(lambda) => self.convert_lambda(lambda),
            Expr::Identifier(ident) => {
                let operand = self.resolve_identifier(ident)?;
                match operand.property_type() {
                    Some(PropertyType::Boolean) => Ok(FilterExpression::Comparison {
                        left: operand,
                        op: CompareOp::Eq,
                        right: Operand::Literal(Value::Bool(true)),
                    }),
                    _ => Err(ODataError::TypeMismatch(format!(
                        "'{}' is not a boolean property",
                        ident.name
                    ))),
                }
            }
            Expr::Literal(lit) => match lit.value {
                Value::Bool(b) => Ok(FilterExpression::Constant(b)),
                _ => Err(ODataError::TypeMismatch(format!(
                    "literal {} is not a boolean predicate",
                    lit.to_odata()
                ))),
            },
            Expr::Collection(_) => Err(ODataError::TypeMismatch(
                "a literal collection is only valid on the right of 'in'".to_string(),
            )),
        }
    }

    pub fn convert_operand(&mut self, expr: &Expr) -> ODataResult<Operand> {
        match expr {
            Expr::Group(group) => self.convert_operand(&group.inner),
            Expr::Literal(lit) => self.literal_operand(lit, None),
            Expr::Identifier(ident) => self.resolve_identifier(ident),
            Expr::FunctionCall(call) => self.convert_function_operand(call),
            Expr::Binary(bin) => {
                let op = arithmetic_op(bin.op).ok_or_else(|| {
                    ODataError::TypeMismatch(format!(
                        "logical '{}' cannot be used as a value",
                        bin.op
                    ))
                })?;
                let left = self.convert_operand(&bin.left)?;
                let right = self.convert_operand(&bin.right)?;
                for side in [&left, &right] {
                    if side.property_type().is_some_and(|t| !t.is_numeric() && !t.is_temporal()) {
                        return Err(ODataError::TypeMismatch(format!(
                            "arithmetic '{}' requires numeric operands",
                            bin.op
                        )));
                    }
                }
                Ok(Operand::Arithmetic {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                })
            }
            Expr::Unary(unary) => match unary.op {
                UnaryOp::Negate => Ok(Operand::Negate(Box::new(
                    self.convert_operand(&unary.operand)?,
                ))),
                UnaryOp::Not => Err(ODataError::TypeMismatch(
                    "'not' cannot be used as a value".to_string(),
                )),
            },
            Expr::Comparison(_) | Expr::Lambda(_) => Err(ODataError::TypeMismatch(
                "a predicate cannot be used as a value".to_string(),
            )),
            Expr::Collection(_) => Err(ODataError::TypeMismatch(
                "a literal collection is only valid on the right of 'in'".to_string(),
            )),
        }
    }

    fn convert_comparison(&mut self, cmp: &ComparisonExpr) -> ODataResult<FilterExpression> {
        match cmp.op {
            ComparisonOp::In => return self.convert_in(cmp),
            ComparisonOp::Has => return self.convert_has(cmp),
            _ => {}
        }
        let Some(op) = compare_op(cmp.op) else {
            return Err(ODataError::TypeMismatch(format!("unexpected operator '{}'", cmp.op)));
        };

        // contains(...) eq true / startswith(...) ne false
        if matches!(op, CompareOp::Eq | CompareOp::Ne) {
            for (call_side, bool_side) in [(&cmp.left, &cmp.right), (&cmp.right, &cmp.left)] {
                if let (Expr::FunctionCall(call), Some(lit)) =
                    (call_side.unwrap_group(), literal_of(bool_side))
                {
                    if let (true, Value::Bool(b)) =
                        (functions::is_boolean_function(&call.name), &lit.value)
                    {
                        let predicate = self.convert_predicate_function(call)?;
                        return Ok(if (op == CompareOp::Eq) == *b {
                            predicate
                        } else {
                            FilterExpression::negate(predicate)
                        });
                    }
                }
            }
        }

        let (left, right) = match (literal_of(&cmp.left), literal_of(&cmp.right)) {
            (None, Some(lit)) => {
                let left = self.convert_operand(&cmp.left)?;
                let right = self.literal_operand(lit, Some(&left))?;
                (left, right)
            }
            (Some(lit), None) => {
                let right = self.convert_operand(&cmp.right)?;
                let left = self.literal_operand(lit, Some(&right))?;
                (left, right)
            }
            _ => {
                let left = self.convert_operand(&cmp.left)?;
                let right = self.convert_operand(&cmp.right)?;
                check_comparable(&left, &right)?;
                (left, right)
            }
        };
        Ok(FilterExpression::Comparison { left, op, right })
    }

    fn convert_in(&mut self, cmp: &ComparisonExpr) -> ODataResult<FilterExpression> {
        let operand = self.convert_operand(&cmp.left)?;
        let Expr::Collection(collection) = cmp.right.unwrap_group() else {
            return Err(ODataError::TypeMismatch(
                "'in' requires a literal collection".to_string(),
            ));
        };
        if collection.values.len() > self.max_in_clause_size {
            return Err(ODataError::InClauseTooLarge {
                size: collection.values.len(),
                max: self.max_in_clause_size,
            });
        }
        if collection.values.is_empty() {
            return Ok(FilterExpression::Constant(false));
        }

        let mut values = Vec::with_capacity(collection.values.len());
        for item in &collection.values {
            let lit = literal_of(item).ok_or_else(|| {
                ODataError::TypeMismatch("'in' collection may only contain literals".to_string())
            })?;
            match self.literal_operand(lit, Some(&operand))? {
                Operand::Literal(value) => values.push(value),
                _ => {
                    return Err(ODataError::TypeMismatch(
                        "spatial literals are not allowed in 'in'".to_string(),
                    ))
                }
            }
        }
        Ok(FilterExpression::In { operand, values })
    }

    fn convert_has(&mut self, cmp: &ComparisonExpr) -> ODataResult<FilterExpression> {
        let operand = self.convert_operand(&cmp.left)?;
        let lit = literal_of(&cmp.right).ok_or_else(|| {
            ODataError::TypeMismatch("'has' requires an enum literal".to_string())
        })?;
        let flag = match &lit.value {
            Value::Int(i) => *i,
            Value::String(members) => {
                let prop = operand.property_ref().ok_or_else(|| {
                    ODataError::TypeMismatch("'has' requires an enum property".to_string())
                })?;
                enum_flags(prop, members)?
            }
            _ => {
                return Err(ODataError::TypeMismatch(format!(
                    "'has' requires an enum literal, found {}",
                    lit.to_odata()
                )))
            }
        };
        Ok(FilterExpression::HasFlag { operand, flag })
    }

    fn convert_predicate_function(
        &mut self,
        call: &FunctionCallExpr,
    ) -> ODataResult<FilterExpression> {
        let signature = functions::check_arity(&call.name, call.args.len())?;
        if let Some(op) = StringMatchOp::from_function(signature.name) {
            let operand = self.convert_operand(&call.args[0])?;
            let pattern = self.convert_operand(&call.args[1])?;
            for side in [&operand, &pattern] {
                let non_string = match side {
                    Operand::Literal(v) => !matches!(v, Value::String(_) | Value::Null),
                    other => other.property_type().is_some_and(|t| !t.is_string()),
                };
                if non_string {
                    return Err(ODataError::TypeMismatch(format!(
                        "{} requires string arguments",
                        signature.name
                    )));
                }
            }
            return Ok(FilterExpression::StringMatch {
                op,
                operand,
                pattern,
            });
        }

        match signature.name {
            "isof" => self.convert_isof(call),
            "geo.intersects" => {
                let args = call
                    .args
                    .iter()
                    .map(|a| self.convert_operand(a))
                    .collect::<ODataResult<Vec<_>>>()?;
                Ok(FilterExpression::BoolFunction {
                    name: signature.name.to_string(),
                    args,
                })
            }
            name => Err(ODataError::TypeMismatch(format!(
                "function '{}' does not return a boolean",
                name
            ))),
        }
    }

    fn convert_isof(&mut self, call: &FunctionCallExpr) -> ODataResult<FilterExpression> {
        let type_arg = call.args.last().and_then(type_name_of).ok_or_else(|| {
            ODataError::TypeMismatch("isof requires a type name".to_string())
        })?;

        if call.args.len() == 2 {
            let operand = self.convert_operand(&call.args[0])?;
            let target = PropertyType::from_edm_name(&type_arg).ok_or_else(|| {
                ODataError::UnsupportedFeature(format!(
                    "isof on a property with non-primitive type '{}'",
                    type_arg
                ))
            })?;
            return Ok(FilterExpression::Constant(
                operand.property_type() == Some(target),
            ));
        }

        let short_name = type_arg.rsplit('.').next().unwrap_or(&type_arg).to_string();
        let discriminator = match &self.metadata.type_discriminator {
            Some(column) => Some(PropertyRef {
                name: column.clone(),
                column: column.clone(),
                qualifier: self.root_qualifier(),
                property_type: PropertyType::String,
                enum_members: Default::default(),
            }),
            None => {
                log::warn!(
                    "实体 {} 没有类型鉴别列, isof('{}') 恒为假",
                    self.metadata.entity_name,
                    type_arg
                );
                None
            }
        };
        Ok(FilterExpression::IsOf {
            type_name: short_name,
            discriminator,
        })
    }

    fn convert_function_operand(&mut self, call: &FunctionCallExpr) -> ODataResult<Operand> {
        let signature = functions::check_arity(&call.name, call.args.len())?;
        match (signature.name, signature.returns) {
            ("cast", _) => {
                if call.args.len() == 1 {
                    return Err(ODataError::UnsupportedFeature(
                        "cast of the current instance".to_string(),
                    ));
                }
                let type_arg = type_name_of(&call.args[1]).ok_or_else(|| {
                    ODataError::TypeMismatch("cast requires a type name".to_string())
                })?;
                let target = PropertyType::from_edm_name(&type_arg).ok_or_else(|| {
                    ODataError::UnsupportedFeature(format!("cast to '{}'", type_arg))
                })?;
                let operand = self.convert_operand(&call.args[0])?;
                Ok(Operand::Cast {
                    operand: Box::new(operand),
                    target,
                })
            }
            (name, ReturnKind::Boolean) => Err(ODataError::TypeMismatch(format!(
                "boolean function '{}' cannot be used as a value",
                name
            ))),
            (name, _) => {
                let args = call
                    .args
                    .iter()
                    .map(|a| self.convert_operand(a))
                    .collect::<ODataResult<Vec<_>>>()?;
                Ok(Operand::Function {
                    name: name.to_string(),
                    args,
                })
            }
        }
    }

    fn convert_lambda(&mut self, lambda: &LambdaExpr) -> ODataResult<FilterExpression> {
        let segments: Vec<&str> = lambda.collection_path.iter().map(String::as_str).collect();
        let path = segments.join("/");
        let root = self.metadata;

        let (scope_entity, parent, rest): (Option<Arc<EntityMetadata>>, String, &[&str]) =
            match segments.split_first() {
                Some((&"$it", rest)) => (None, root.table_name.clone(), rest),
                Some((first, rest)) => match self.find_scope(first) {
                    Some(scope) => (
                        Some(Arc::clone(&scope.entity)),
                        scope.qualifier.clone(),
                        rest,
                    ),
                    None => (None, root.table_name.clone(), &segments[..]),
                },
                None => return Err(ODataError::InvalidNavigation("empty lambda path".to_string())),
            };
        let source: &EntityMetadata = scope_entity.as_deref().unwrap_or(root);

        let hops = source.resolve_navigation_chain(rest)?;
        let element = match hops.last() {
            Some(hop) if hop.is_collection() => Arc::clone(&hop.target),
            Some(hop) => {
                return Err(ODataError::InvalidNavigation(format!(
                    "'{}' is not a collection; {} requires a collection navigation",
                    hop.property.name, lambda.op
                )))
            }
            None => {
                return Err(ODataError::InvalidNavigation(format!(
                    "'{}' does not name a navigation property",
                    path
                )))
            }
        };
        let correlation = self.correlate(&parent, &hops);

        let predicate = match (&lambda.predicate, &lambda.variable) {
            (Some(pred), Some(variable)) => {
                if self.find_scope(variable).is_some() {
                    return Err(ODataError::InvalidNavigation(format!(
                        "range variable '{}' is already in scope",
                        variable
                    )));
                }
                let scope = LambdaScope {
                    variable: variable.clone(),
                    entity: element,
                    qualifier: correlation.last_alias().to_string(),
                };
                self.push_scope(scope, &correlation);
                let converted = self.convert(pred);
                self.pop_scope(&correlation);
                Some(Box::new(converted?))
            }
            _ => None,
        };

        Ok(FilterExpression::Lambda {
            op: lambda.op,
            path,
            correlation,
            predicate,
        })
    }

    fn resolve_identifier(&mut self, ident: &IdentifierExpr) -> ODataResult<Operand> {
        let segments = ident.segments();
        let (first, rest) = match segments.split_first() {
            Some(parts) => parts,
            None => return Err(ODataError::property_not_found(&ident.name, &self.metadata.entity_name)),
        };

        if let Some(scope) = self.find_scope(first) {
            if rest.is_empty() {
                return Err(ODataError::TypeMismatch(format!(
                    "range variable '{}' cannot be used as a value",
                    first
                )));
            }
            let entity = Arc::clone(&scope.entity);
            let qualifier = scope.qualifier.clone();
            return self.resolve_path(&entity, Some(qualifier.clone()), &qualifier, &rest.join("/"));
        }

        let root = self.metadata;
        if *first == "$it" && !rest.is_empty() {
            return self.resolve_path(
                root,
                Some(root.table_name.clone()),
                &root.table_name,
                &rest.join("/"),
            );
        }

        if rest.is_empty() {
            if let Some(alias) = self.aliases.get(*first) {
                return Ok(alias.clone());
            }
        }

        let qualifier = self.root_qualifier();
        self.resolve_path(root, qualifier, &root.table_name, &ident.name)
    }

    /// 在给定实体上解析属性路径
    fn resolve_path(
        &mut self,
        entity: &EntityMetadata,
        qualifier: Option<String>,
        parent: &str,
        path: &str,
    ) -> ODataResult<Operand> {
        if !path.contains('/') {
            if let Some(prop) = self.cache.resolve_property(entity, path) {
                return Ok(Operand::Property(property_ref(&prop, qualifier)));
            }
            if entity.find_navigation_property(path).is_some() {
                return Err(ODataError::InvalidNavigation(format!(
                    "navigation property '{}' cannot be used as a value",
                    path
                )));
            }
            return Err(ODataError::property_not_found(path, &entity.entity_name));
        }

        if let Some(nav_path) = path.strip_suffix("/$count") {
            let segments: Vec<&str> = nav_path.split('/').collect();
            let hops = entity.resolve_navigation_chain(&segments)?;
            if !hops.last().is_some_and(|h| h.is_collection()) {
                return Err(ODataError::InvalidNavigation(format!(
                    "$count requires a collection navigation, found '{}'",
                    nav_path
                )));
            }
            return Ok(Operand::CollectionCount {
                path: nav_path.to_string(),
                correlation: self.correlate(parent, &hops),
            });
        }

        let nav = self.cache.resolve_navigation(entity, path)?;
        let correlation = self.correlate(parent, &nav.hops);
        let leaf = property_ref(&nav.leaf, Some(correlation.last_alias().to_string()));
        Ok(Operand::Navigation {
            path: path.to_string(),
            correlation,
            leaf,
        })
    }

    /// 字面量操作数；给出比较对象时按其类型校验并转换
    fn literal_operand(&self, lit: &LiteralExpr, target: Option<&Operand>) -> ODataResult<Operand> {
        if lit.kind.is_spatial() {
            let text = lit.value.as_str().unwrap_or_default();
            let (wkt, srid) = parse_spatial(text);
            return Ok(Operand::Spatial { wkt, srid });
        }

        let value = lit.value.clone();
        let (Some(target), false) = (target, value.is_null()) else {
            return Ok(Operand::Literal(value));
        };
        let Some(ty) = target.property_type() else {
            return Ok(Operand::Literal(value));
        };
        let name = target.key_name().unwrap_or_default();

        if ty == PropertyType::Enum {
            return match (&value, target.property_ref()) {
                (Value::String(members), Some(prop)) if !prop.enum_members.is_empty() => {
                    Ok(Operand::Literal(Value::Int(enum_flags(prop, members)?)))
                }
                _ => Ok(Operand::Literal(value)),
            };
        }

        let mismatch = || {
            ODataError::TypeMismatch(format!(
                "cannot compare {} property '{}' with {} literal",
                ty.edm_name(),
                name,
                value.type_name()
            ))
        };

        if ty.is_numeric() {
            if !value.is_numeric() {
                return Err(mismatch());
            }
            check_integer_range(&value, ty, &name)?;
        } else if ty.is_string() {
            if value.is_numeric() || matches!(value, Value::Bool(_)) {
                return Err(mismatch());
            }
        } else if ty == PropertyType::Boolean && !matches!(value, Value::Bool(_)) {
            return Err(mismatch());
        }
        Ok(Operand::Literal(value))
    }
}

/// 两侧都不是字面量时的静态类型检查
fn check_comparable(left: &Operand, right: &Operand) -> ODataResult<()> {
    match (left.property_type(), right.property_type()) {
        (Some(l), Some(r)) if (l.is_string() && r.is_numeric()) || (l.is_numeric() && r.is_string()) => {
            Err(ODataError::TypeMismatch(format!(
                "cannot compare {} with {}",
                l.edm_name(),
                r.edm_name()
            )))
        }
        _ => Ok(()),
    }
}
