//! 自定义断言辅助模块
//!
//! 提供测试中的常用断言函数

use odata_query::{ODataError, SqlFragment};

/// 断言结果成功，返回内部值
pub fn assert_ok<T, E: std::fmt::Debug>(result: Result<T, E>) -> T {
    result.expect("操作应该成功")
}

/// 断言结果失败并匹配错误消息
pub fn assert_err_with<T: std::fmt::Debug, E: std::fmt::Display>(result: Result<T, E>, expected_msg: &str) {
    let err = result.expect_err("操作应该失败");
    let err_str = err.to_string();
    assert!(
        err_str.contains(expected_msg),
        "错误消息应包含 '{}', 实际是 '{}'",
        expected_msg,
        err_str
    );
}

/// 断言是客户端错误（可映射为 400）
pub fn assert_client_error<T: std::fmt::Debug>(result: Result<T, ODataError>) -> ODataError {
    let err = result.expect_err("操作应该失败");
    assert!(err.is_client_error(), "应为客户端错误: {:?}", err);
    err
}

/// 断言集合包含指定数量的元素
pub fn assert_count<T>(collection: &[T], expected: usize, item_name: &str) {
    assert_eq!(
        collection.len(),
        expected,
        "{}数量不匹配: 期望 {}, 实际 {}",
        item_name,
        expected,
        collection.len()
    );
}

/// 断言占位符个数与参数个数一致（`?` 或 `$n`）
pub fn assert_consistent(fragment: &SqlFragment) {
    let positional = fragment.sql.matches('?').count();
    let numbered = (1..=fragment.args.len())
        .filter(|n| fragment.sql.contains(&format!("${}", n)))
        .count();
    assert!(
        positional == fragment.args.len() || (positional == 0 && numbered == fragment.args.len()),
        "占位符与参数个数不一致: {:?}",
        fragment
    );
}

/// 断言 SQL 包含全部片段
pub fn assert_sql_contains(fragment: &SqlFragment, parts: &[&str]) {
    for part in parts {
        assert!(
            fragment.sql.contains(part),
            "SQL 应包含 '{}', 实际是 '{}'",
            part,
            fragment.sql
        );
    }
}
