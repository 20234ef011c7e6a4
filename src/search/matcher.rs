//! 内存搜索求值
//!
//! 在字段访问表上对搜索树求值。参与比较的字段由访问表决定（显式可搜索字段，
//! 否则全部字符串字段），非字符串值按其文本形式比较。

use std::collections::HashMap;

use log::debug;

use super::fuzzy::{best_similarity, fuzzy_contains};
use super::parser::{parse_search, SearchExprNode};
use crate::config::SearchConfig;
use crate::core::metadata::{EntityMetadata, FieldAccessorTable, JsonRow};
use crate::core::Value;

#[derive(Debug, Clone)]
pub struct SearchMatcher<T> {
    accessors: FieldAccessorTable<T>,
    default_fuzziness: u32,
    field_fuzziness: HashMap<String, u32>,
    min_similarity: Option<f64>,
}

impl<T> SearchMatcher<T> {
    pub fn new(accessors: FieldAccessorTable<T>) -> Self {
        Self {
            accessors,
            default_fuzziness: 1,
            field_fuzziness: HashMap::new(),
            min_similarity: None,
        }
    }

    pub fn with_config(mut self, config: &SearchConfig) -> Self {
        self.default_fuzziness = config.default_fuzziness.max(1);
        self.min_similarity = config.min_similarity;
        self
    }

    pub fn with_default_fuzziness(mut self, fuzziness: u32) -> Self {
        self.default_fuzziness = fuzziness.max(1);
        self
    }

    pub fn with_field_fuzziness(mut self, field: impl Into<String>, fuzziness: u32) -> Self {
        self.field_fuzziness.insert(field.into(), fuzziness.max(1));
        self
    }

    /// 设置后按相似度判断，不再使用编辑距离阈值
    pub fn with_min_similarity(mut self, ratio: f64) -> Self {
        self.min_similarity = Some(ratio);
        self
    }

    fn fuzziness_of(&self, field: &str) -> u32 {
        self.field_fuzziness
            .get(field)
            .copied()
            .unwrap_or(self.default_fuzziness)
    }

    fn text_matches(&self, field: &str, text: &str, needle: &str) -> bool {
        match self.min_similarity {
            Some(ratio) => {
                text.to_lowercase().contains(&needle.to_lowercase())
                    || best_similarity(text, needle) >= ratio
            }
            None => fuzzy_contains(text, needle, self.fuzziness_of(field)),
        }
    }

    fn any_field_matches(&self, item: &T, needle: &str) -> bool {
        self.accessors.search_fields().into_iter().any(|field| {
            match self.accessors.get(item, field) {
                None | Some(Value::Null) => false,
                Some(Value::String(s)) => self.text_matches(field, &s, needle),
                Some(other) => self.text_matches(field, &other.to_string(), needle),
            }
        })
    }

    pub fn matches(&self, item: &T, tree: &SearchExprNode) -> bool {
        match tree {
            SearchExprNode::Term(t) | SearchExprNode::Phrase(t) => self.any_field_matches(item, t),
            SearchExprNode::And(l, r) => self.matches(item, l) && self.matches(item, r),
            SearchExprNode::Or(l, r) => self.matches(item, l) || self.matches(item, r),
            SearchExprNode::Not(inner) => !self.matches(item, inner),
        }
    }

    /// 过滤出匹配的元素；搜索串为空或无意义时原样返回
    pub fn filter<'a>(&self, items: &'a [T], search: &str) -> Vec<&'a T> {
        let Some(tree) = parse_search(search) else {
            return items.iter().collect();
        };
        let matched: Vec<&T> = items.iter().filter(|item| self.matches(item, &tree)).collect();
        debug!(
            "搜索 '{}' 匹配 {}/{} 条记录",
            search,
            matched.len(),
            items.len()
        );
        matched
    }

    pub fn filter_owned(&self, items: Vec<T>, search: &str) -> Vec<T> {
        let Some(tree) = parse_search(search) else {
            return items;
        };
        items
            .into_iter()
            .filter(|item| self.matches(item, &tree))
            .collect()
    }
}

impl SearchMatcher<JsonRow> {
    /// 由元数据构造：每个属性的 `search_fuzziness` 覆盖默认值
    pub fn for_json_rows(metadata: &EntityMetadata, config: &SearchConfig) -> Self {
        let mut matcher = SearchMatcher::new(FieldAccessorTable::for_json_rows(metadata))
            .with_config(config);
        for prop in metadata.structural_properties() {
            if let Some(fuzziness) = prop.search_fuzziness {
                matcher = matcher.with_field_fuzziness(prop.json_name.clone(), fuzziness);
            }
        }
        matcher
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metadata::test_fixtures;
    use serde_json::json;

    #[derive(Debug, PartialEq)]
    struct Item {
        name: String,
        sku: i64,
    }

    fn items() -> Vec<Item> {
        vec![
            Item {
                name: "Gaming Laptop".to_string(),
                sku: 1001,
            },
            Item {
                name: "Smart Phone".to_string(),
                sku: 2002,
            },
            Item {
                name: "Café Latte".to_string(),
                sku: 3003,
            },
        ]
    }

    fn matcher() -> SearchMatcher<Item> {
        SearchMatcher::new(
            FieldAccessorTable::new()
                .field("Name", true, |i: &Item| Value::String(i.name.clone()))
                .field("Sku", false, |i: &Item| Value::Int(i.sku)),
        )
    }

    #[test]
    fn test_boolean_search() {
        let data = items();
        let m = matcher();
        assert_eq!(m.filter(&data, "laptop OR phone").len(), 2);
        assert_eq!(m.filter(&data, "smart phone").len(), 1);
        assert_eq!(m.filter(&data, "NOT laptop").len(), 2);
        assert_eq!(m.filter(&data, "").len(), 3);
        // 非字符串字段不在默认搜索字段中
        assert!(m.filter(&data, "1001").is_empty());
    }

    #[test]
    fn test_fuzzy_search() {
        let data = items();
        assert!(matcher().filter(&data, "cafe").is_empty());
        let fuzzy = matcher().with_field_fuzziness("Name", 2);
        assert_eq!(fuzzy.filter(&data, "cafe").len(), 1);
        let ratio = matcher().with_min_similarity(0.7);
        assert_eq!(ratio.filter(&data, "lapton").len(), 1);
    }

    #[test]
    fn test_json_rows_from_metadata() {
        let mut meta = test_fixtures::product();
        meta.normalize();
        let m = SearchMatcher::for_json_rows(&meta, &SearchConfig::default());
        let rows: Vec<JsonRow> = vec![
            json!({"ID": 1, "Name": "Laptop", "Description": "fast machine"}),
            json!({"ID": 2, "Name": "Mouse", "Description": null}),
        ]
        .into_iter()
        .filter_map(|v| v.as_object().cloned())
        .collect();
        let found = m.filter_owned(rows, "machine");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].get("ID"), Some(&json!(1)));
    }
}
