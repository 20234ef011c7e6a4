//! 全文检索查询串序列化
//!
//! 同一棵搜索树分别输出 SQLite FTS5、FTS3/4 与 PostgreSQL `websearch_to_tsquery` 语法。
//! 目标语法表达不了的部分被丢弃并记录 WARN。

use log::warn;

use super::parser::{parse_search, SearchExprNode};

fn quote_phrase(phrase: &str) -> String {
    format!("\"{}\"", phrase.replace('"', "\"\""))
}

/// FTS 词项：含特殊字符的词需要加引号
fn fts_term(term: &str) -> String {
    if term.chars().all(|c| c.is_alphanumeric() || c == '_') {
        term.to_string()
    } else {
        quote_phrase(term)
    }
}

fn fts5(node: &SearchExprNode) -> Option<String> {
    match node {
        SearchExprNode::Term(t) => Some(fts_term(t)),
        SearchExprNode::Phrase(p) => Some(quote_phrase(p)),
        SearchExprNode::And(l, r) => match (l.as_ref(), r.as_ref()) {
            // FTS5 的 NOT 是二元运算符
            (left, SearchExprNode::Not(negated)) => match (fts5(left), fts5(negated)) {
                (Some(a), Some(b)) => Some(format!("({} NOT {})", a, b)),
                (a, _) => a,
            },
            (left, right) => match (fts5(left), fts5(right)) {
                (Some(a), Some(b)) => Some(format!("({} AND {})", a, b)),
                (a, b) => a.or(b),
            },
        },
        SearchExprNode::Or(l, r) => match (fts5(l), fts5(r)) {
            (Some(a), Some(b)) => Some(format!("({} OR {})", a, b)),
            (a, b) => a.or(b),
        },
        SearchExprNode::Not(_) => {
            warn!("FTS5 不支持一元 NOT，已丢弃子表达式: {}", node);
            None
        }
    }
}

fn fts34(node: &SearchExprNode) -> Option<String> {
    match node {
        SearchExprNode::Term(t) => Some(fts_term(t)),
        SearchExprNode::Phrase(p) => Some(quote_phrase(p)),
        // FTS3/4 标准语法中相邻词项即为 AND
        SearchExprNode::And(l, r) => match (fts34(l), fts34(r)) {
            (Some(a), Some(b)) => Some(format!("{} {}", a, b)),
            (a, b) => a.or(b),
        },
        SearchExprNode::Or(l, r) => match (fts34(l), fts34(r)) {
            (Some(a), Some(b)) => Some(format!("{} OR {}", a, b)),
            (a, b) => a.or(b),
        },
        SearchExprNode::Not(_) => {
            warn!("FTS3/4 不支持 NOT，已丢弃子表达式: {}", node);
            None
        }
    }
}

fn websearch(node: &SearchExprNode) -> Option<String> {
    match node {
        SearchExprNode::Term(t) => Some(t.clone()),
        SearchExprNode::Phrase(p) => Some(format!("\"{}\"", p.replace('"', ""))),
        SearchExprNode::And(l, r) => match (websearch(l), websearch(r)) {
            (Some(a), Some(b)) => Some(format!("{} {}", a, b)),
            (a, b) => a.or(b),
        },
        SearchExprNode::Or(l, r) => match (websearch(l), websearch(r)) {
            (Some(a), Some(b)) => Some(format!("{} or {}", a, b)),
            (a, b) => a.or(b),
        },
        SearchExprNode::Not(inner) => match inner.as_ref() {
            SearchExprNode::Term(_) | SearchExprNode::Phrase(_) => {
                websearch(inner).map(|s| format!("-{}", s))
            }
            // 复合表达式整体加括号后取反
            _ => websearch(inner).map(|s| format!("-({})", s)),
        },
    }
}

pub fn tree_to_fts5(tree: &SearchExprNode) -> String {
    fts5(tree).unwrap_or_default()
}

pub fn tree_to_fts34(tree: &SearchExprNode) -> String {
    fts34(tree).unwrap_or_default()
}

pub fn tree_to_websearch(tree: &SearchExprNode) -> String {
    websearch(tree).unwrap_or_default()
}

/// SQLite FTS5 MATCH 查询串
pub fn to_fts5_query(search: &str) -> String {
    parse_search(search).map(|t| tree_to_fts5(&t)).unwrap_or_default()
}

/// SQLite FTS3/4 MATCH 查询串，NOT 子树被丢弃
pub fn to_fts34_query(search: &str) -> String {
    parse_search(search).map(|t| tree_to_fts34(&t)).unwrap_or_default()
}

/// PostgreSQL `websearch_to_tsquery` 输入
pub fn to_websearch_query(search: &str) -> String {
    parse_search(search)
        .map(|t| tree_to_websearch(&t))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fts5() {
        assert_eq!(to_fts5_query("laptop OR phone"), "(laptop OR phone)");
        assert_eq!(to_fts5_query("laptop phone"), "(laptop AND phone)");
        assert_eq!(to_fts5_query("laptop NOT phone"), "(laptop NOT phone)");
        assert_eq!(to_fts5_query("NOT phone"), "");
        assert_eq!(to_fts5_query("\"gaming laptop\""), "\"gaming laptop\"");
        assert_eq!(to_fts5_query("c++"), "\"c++\"");
    }

    #[test]
    fn test_fts34() {
        assert_eq!(to_fts34_query("laptop NOT phone"), "laptop");
        assert_eq!(to_fts34_query("laptop OR phone"), "laptop OR phone");
        assert_eq!(to_fts34_query("a b"), "a b");
    }

    #[test]
    fn test_websearch() {
        assert_eq!(to_websearch_query("NOT phone"), "-phone");
        assert_eq!(to_websearch_query("laptop OR phone"), "laptop or phone");
        assert_eq!(to_websearch_query("laptop NOT phone"), "laptop -phone");
        assert_eq!(to_websearch_query("\"red shoes\""), "\"red shoes\"");
        assert_eq!(to_websearch_query(""), "");
    }

    #[test]
    fn test_websearch_negated_group() {
        assert_eq!(to_websearch_query("NOT (laptop OR phone)"), "-(laptop or phone)");
        assert_eq!(
            to_websearch_query("tablet NOT (laptop OR phone)"),
            "tablet -(laptop or phone)"
        );
    }
}
