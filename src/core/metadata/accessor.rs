//! 字段访问表
//!
//! 每个实体类型注册一次的 名称 → 取值闭包 映射，内存搜索与结果投影通过它读取字段，
//! 不依赖运行时反射。`JsonRow` 的访问表可以直接由元数据生成。

use serde_json::{Map, Value as JsonValue};
use std::sync::Arc;

use super::entity::EntityMetadata;
use crate::core::Value;

/// 物化后的一行：JSON 名 → 值
pub type JsonRow = Map<String, JsonValue>;

type Getter<T> = Arc<dyn Fn(&T) -> Value + Send + Sync>;

struct FieldAccessor<T> {
    name: String,
    is_string: bool,
    searchable: bool,
    getter: Getter<T>,
}

impl<T> Clone for FieldAccessor<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            is_string: self.is_string,
            searchable: self.searchable,
            getter: Arc::clone(&self.getter),
        }
    }
}

pub struct FieldAccessorTable<T> {
    fields: Vec<FieldAccessor<T>>,
}

impl<T> Clone for FieldAccessorTable<T> {
    fn clone(&self) -> Self {
        Self {
            fields: self.fields.clone(),
        }
    }
}

impl<T> Default for FieldAccessorTable<T> {
    fn default() -> Self {
        Self { fields: Vec::new() }
    }
}

impl<T> std::fmt::Debug for FieldAccessorTable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldAccessorTable")
            .field("fields", &self.field_names())
            .finish()
    }
}

impl<T> FieldAccessorTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册字段；`is_string` 决定没有显式可搜索字段时是否参与搜索
    pub fn field<F>(mut self, name: impl Into<String>, is_string: bool, getter: F) -> Self
    where
        F: Fn(&T) -> Value + Send + Sync + 'static,
    {
        self.fields.push(FieldAccessor {
            name: name.into(),
            is_string,
            searchable: false,
            getter: Arc::new(getter),
        });
        self
    }

    pub fn searchable_field<F>(mut self, name: impl Into<String>, is_string: bool, getter: F) -> Self
    where
        F: Fn(&T) -> Value + Send + Sync + 'static,
    {
        self.fields.push(FieldAccessor {
            name: name.into(),
            is_string,
            searchable: true,
            getter: Arc::new(getter),
        });
        self
    }

    pub fn get(&self, item: &T, name: &str) -> Option<Value> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| (f.getter)(item))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// 参与搜索的字段：显式标记的字段；都未标记时取全部字符串字段
    pub fn search_fields(&self) -> Vec<&str> {
        let flagged: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| f.searchable)
            .map(|f| f.name.as_str())
            .collect();
        if !flagged.is_empty() {
            return flagged;
        }
        self.fields
            .iter()
            .filter(|f| f.is_string)
            .map(|f| f.name.as_str())
            .collect()
    }

    /// 投影为 JSON 对象，只保留给定字段（按表中的注册顺序）
    pub fn project(&self, item: &T, names: &[&str]) -> JsonRow {
        self.fields
            .iter()
            .filter(|f| names.contains(&f.name.as_str()))
            .map(|f| (f.name.clone(), (f.getter)(item).to_json()))
            .collect()
    }
}

impl FieldAccessorTable<JsonRow> {
    /// 由元数据生成 JSON 行的访问表，键为 JSON 名
    pub fn for_json_rows(metadata: &EntityMetadata) -> Self {
        let searchable: Vec<String> = metadata
            .searchable_properties()
            .iter()
            .map(|p| p.json_name.clone())
            .collect();

        let mut table = FieldAccessorTable::new();
        for prop in metadata.structural_properties() {
            let key = prop.json_name.clone();
            let lookup = key.clone();
            let getter = move |row: &JsonRow| {
                row.get(&lookup).map(Value::from_json).unwrap_or(Value::Null)
            };
            table = if searchable.contains(&key) {
                table.searchable_field(key, prop.property_type.is_string(), getter)
            } else {
                table.field(key, prop.property_type.is_string(), getter)
            };
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metadata::test_fixtures;
    use serde_json::json;

    struct Book {
        title: String,
        pages: i64,
    }

    #[test]
    fn test_struct_accessors() {
        let table = FieldAccessorTable::<Book>::new()
            .field("Title", true, |b: &Book| Value::String(b.title.clone()))
            .field("Pages", false, |b: &Book| Value::Int(b.pages));
        let book = Book {
            title: "Dune".to_string(),
            pages: 412,
        };

        assert_eq!(table.get(&book, "Pages"), Some(Value::Int(412)));
        assert_eq!(table.get(&book, "Missing"), None);
        assert_eq!(table.search_fields(), vec!["Title"]);

        let projected = table.project(&book, &["Title"]);
        assert_eq!(projected.get("Title"), Some(&json!("Dune")));
        assert!(!projected.contains_key("Pages"));
    }

    #[test]
    fn test_json_row_table_from_metadata() {
        let mut meta = test_fixtures::product();
        meta.normalize();
        let table = FieldAccessorTable::for_json_rows(&meta);

        let row: JsonRow = json!({"ID": 1, "Name": "Laptop", "Price": 999.5})
            .as_object()
            .cloned()
            .unwrap_or_default();
        assert_eq!(table.get(&row, "Name"), Some(Value::String("Laptop".to_string())));
        assert_eq!(table.get(&row, "Stock"), Some(Value::Null));
        assert_eq!(table.search_fields(), vec!["Name", "Description"]);
    }
}
