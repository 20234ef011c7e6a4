//! `$search` 布尔语法
//!
//! 优先级：`OR` < 显式或隐式 `AND` < `NOT` < 括号/词项/短语。
//! 关键字区分大小写（小写的 `and` 是普通词项）。解析器是宽松的：
//! 无法理解的记号被跳过，整个输入无意义时返回 `None`。

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchExprNode {
    Term(String),
    Phrase(String),
    And(Box<SearchExprNode>, Box<SearchExprNode>),
    Or(Box<SearchExprNode>, Box<SearchExprNode>),
    Not(Box<SearchExprNode>),
}

impl SearchExprNode {
    pub fn and(left: SearchExprNode, right: SearchExprNode) -> Self {
        SearchExprNode::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: SearchExprNode, right: SearchExprNode) -> Self {
        SearchExprNode::Or(Box::new(left), Box::new(right))
    }

    pub fn negate(inner: SearchExprNode) -> Self {
        SearchExprNode::Not(Box::new(inner))
    }

    /// 所有正向词项与短语（不在 NOT 之下）
    pub fn positive_terms(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_terms(false, &mut out);
        out
    }

    fn collect_terms<'a>(&'a self, negated: bool, out: &mut Vec<&'a str>) {
        match self {
            SearchExprNode::Term(t) | SearchExprNode::Phrase(t) => {
                if !negated {
                    out.push(t);
                }
            }
            SearchExprNode::And(l, r) | SearchExprNode::Or(l, r) => {
                l.collect_terms(negated, out);
                r.collect_terms(negated, out);
            }
            SearchExprNode::Not(inner) => inner.collect_terms(!negated, out),
        }
    }
}

impl fmt::Display for SearchExprNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchExprNode::Term(t) => write!(f, "{}", t),
            SearchExprNode::Phrase(p) => write!(f, "\"{}\"", p),
            SearchExprNode::And(l, r) => write!(f, "({} AND {})", l, r),
            SearchExprNode::Or(l, r) => write!(f, "({} OR {})", l, r),
            SearchExprNode::Not(inner) => write!(f, "NOT {}", inner),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SearchToken {
    Word(String),
    Phrase(String),
    And,
    Or,
    Not,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Vec<SearchToken> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&ch) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(SearchToken::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(SearchToken::RParen);
            }
            '"' => {
                chars.next();
                let mut phrase = String::new();
                // 未闭合的短语读到输入末尾
                while let Some(c) = chars.next() {
                    match c {
                        '"' => break,
                        '\\' => {
                            if let Some(escaped) = chars.next() {
                                phrase.push(escaped);
                            }
                        }
                        other => phrase.push(other),
                    }
                }
                let phrase = phrase.trim().to_string();
                if !phrase.is_empty() {
                    tokens.push(SearchToken::Phrase(phrase));
                }
            }
            _ => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || c == '(' || c == ')' || c == '"' {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                tokens.push(match word.as_str() {
                    "AND" => SearchToken::And,
                    "OR" => SearchToken::Or,
                    "NOT" => SearchToken::Not,
                    _ => SearchToken::Word(word),
                });
            }
        }
    }
    tokens
}

struct SearchParser {
    tokens: Vec<SearchToken>,
    pos: usize,
}

impl SearchParser {
    fn peek(&self) -> Option<&SearchToken> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<SearchToken> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn parse_or(&mut self) -> Option<SearchExprNode> {
        let mut left = self.parse_and();
        while self.peek() == Some(&SearchToken::Or) {
            self.advance();
            let right = self.parse_and();
            left = match (left, right) {
                (Some(l), Some(r)) => Some(SearchExprNode::or(l, r)),
                (l, r) => l.or(r),
            };
        }
        left
    }

    fn parse_and(&mut self) -> Option<SearchExprNode> {
        let mut left = self.parse_not();
        loop {
            match self.peek() {
                Some(SearchToken::And) => {
                    self.advance();
                }
                // 隐式 AND
                Some(SearchToken::Word(_))
                | Some(SearchToken::Phrase(_))
                | Some(SearchToken::Not)
                | Some(SearchToken::LParen) => {}
                _ => break,
            }
            let right = self.parse_not();
            left = match (left, right) {
                (Some(l), Some(r)) => Some(SearchExprNode::and(l, r)),
                (l, r) => l.or(r),
            };
        }
        left
    }

    fn parse_not(&mut self) -> Option<SearchExprNode> {
        if self.peek() == Some(&SearchToken::Not) {
            self.advance();
            return self.parse_not().map(SearchExprNode::negate);
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Option<SearchExprNode> {
        match self.peek()? {
            SearchToken::Word(_) | SearchToken::Phrase(_) => match self.advance()? {
                SearchToken::Word(w) => Some(SearchExprNode::Term(w)),
                SearchToken::Phrase(p) => Some(SearchExprNode::Phrase(p)),
                _ => None,
            },
            SearchToken::LParen => {
                self.advance();
                let inner = self.parse_or();
                // 缺失的右括号视为在末尾
                if self.peek() == Some(&SearchToken::RParen) {
                    self.advance();
                }
                inner
            }
            // 悬空的 AND/OR/右括号由外层跳过
            _ => None,
        }
    }
}

/// 解析搜索表达式；空输入或只有运算符时返回 `None`
pub fn parse_search(input: &str) -> Option<SearchExprNode> {
    let mut parser = SearchParser {
        tokens: tokenize(input),
        pos: 0,
    };

    let mut result: Option<SearchExprNode> = None;
    while parser.pos < parser.tokens.len() {
        let start = parser.pos;
        let next = parser.parse_or();
        result = match (result, next) {
            (Some(l), Some(r)) => Some(SearchExprNode::and(l, r)),
            (l, r) => l.or(r),
        };
        if parser.pos == start {
            // 跳过无法开始表达式的记号
            parser.advance();
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn term(t: &str) -> SearchExprNode {
        SearchExprNode::Term(t.to_string())
    }

    #[test]
    fn test_precedence() {
        let tree = parse_search("a b OR c").expect("应该得到搜索树");
        assert_eq!(
            tree,
            SearchExprNode::or(SearchExprNode::and(term("a"), term("b")), term("c"))
        );

        let tree = parse_search("NOT a AND (b OR c)").expect("应该得到搜索树");
        assert_eq!(
            tree,
            SearchExprNode::and(
                SearchExprNode::negate(term("a")),
                SearchExprNode::or(term("b"), term("c"))
            )
        );
    }

    #[test]
    fn test_keywords_are_case_sensitive() {
        let tree = parse_search("laptop and phone").expect("应该得到搜索树");
        assert_eq!(
            tree,
            SearchExprNode::and(SearchExprNode::and(term("laptop"), term("and")), term("phone"))
        );
    }

    #[test]
    fn test_phrase() {
        let tree = parse_search("\"gaming laptop\" cheap").expect("应该得到搜索树");
        assert_eq!(
            tree,
            SearchExprNode::and(SearchExprNode::Phrase("gaming laptop".to_string()), term("cheap"))
        );
    }

    #[test]
    fn test_lenient_recovery() {
        assert_eq!(parse_search(""), None);
        assert_eq!(parse_search("AND OR"), None);
        assert_eq!(parse_search("a OR"), Some(term("a")));
        assert_eq!(parse_search(") a ("), Some(term("a")));
        assert_eq!(parse_search("(a b"), Some(SearchExprNode::and(term("a"), term("b"))));
        assert_eq!(parse_search("\"open phrase"), Some(SearchExprNode::Phrase("open phrase".to_string())));
    }

    #[test]
    fn test_positive_terms() {
        let tree = parse_search("a NOT b \"c d\"").expect("应该得到搜索树");
        assert_eq!(tree.positive_terms(), vec!["a", "c d"]);
        assert_eq!(tree.to_string(), "((a AND NOT b) AND \"c d\")");
    }
}
