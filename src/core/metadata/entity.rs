//! 实体与属性元数据
//!
//! 元数据由宿主在启动时注册，之后只读。属性名、JSON 名与列名三者分离：
//! 查询字符串使用属性名（或 JSON 名），SQL 使用列名，物化后的行使用 JSON 名。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::utils::to_snake_case;

/// 属性的 EDM 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyType {
    String,
    Boolean,
    Byte,
    SByte,
    Int16,
    Int32,
    Int64,
    UInt64,
    Decimal,
    Double,
    Single,
    Date,
    TimeOfDay,
    DateTimeOffset,
    Duration,
    Guid,
    Binary,
    Geography,
    Geometry,
    Enum,
    /// 导航属性
    Entity,
}

impl PropertyType {
    /// 解析 `Edm.Int32` 或 `Int32` 形式的类型名
    pub fn from_edm_name(name: &str) -> Option<PropertyType> {
        let short = name.strip_prefix("Edm.").unwrap_or(name);
        let ty = match short {
            "String" => PropertyType::String,
            "Boolean" => PropertyType::Boolean,
            "Byte" => PropertyType::Byte,
            "SByte" => PropertyType::SByte,
            "Int16" => PropertyType::Int16,
            "Int32" => PropertyType::Int32,
            "Int64" => PropertyType::Int64,
            "UInt64" => PropertyType::UInt64,
            "Decimal" => PropertyType::Decimal,
            "Double" => PropertyType::Double,
            "Single" => PropertyType::Single,
            "Date" => PropertyType::Date,
            "TimeOfDay" => PropertyType::TimeOfDay,
            "DateTimeOffset" => PropertyType::DateTimeOffset,
            "Duration" => PropertyType::Duration,
            "Guid" => PropertyType::Guid,
            "Binary" => PropertyType::Binary,
            s if s.starts_with("Geography") => PropertyType::Geography,
            s if s.starts_with("Geometry") => PropertyType::Geometry,
            _ => return None,
        };
        Some(ty)
    }

    pub fn edm_name(&self) -> &'static str {
        match self {
            PropertyType::String => "Edm.String",
            PropertyType::Boolean => "Edm.Boolean",
            PropertyType::Byte => "Edm.Byte",
            PropertyType::SByte => "Edm.SByte",
            PropertyType::Int16 => "Edm.Int16",
            PropertyType::Int32 => "Edm.Int32",
            PropertyType::Int64 => "Edm.Int64",
            PropertyType::UInt64 => "Edm.UInt64",
            PropertyType::Decimal => "Edm.Decimal",
            PropertyType::Double => "Edm.Double",
            PropertyType::Single => "Edm.Single",
            PropertyType::Date => "Edm.Date",
            PropertyType::TimeOfDay => "Edm.TimeOfDay",
            PropertyType::DateTimeOffset => "Edm.DateTimeOffset",
            PropertyType::Duration => "Edm.Duration",
            PropertyType::Guid => "Edm.Guid",
            PropertyType::Binary => "Edm.Binary",
            PropertyType::Geography => "Edm.Geography",
            PropertyType::Geometry => "Edm.Geometry",
            PropertyType::Enum => "Edm.Enum",
            PropertyType::Entity => "Edm.EntityType",
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            PropertyType::Byte
                | PropertyType::SByte
                | PropertyType::Int16
                | PropertyType::Int32
                | PropertyType::Int64
                | PropertyType::UInt64
        )
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer()
            || matches!(
                self,
                PropertyType::Decimal | PropertyType::Double | PropertyType::Single
            )
    }

    pub fn is_string(&self) -> bool {
        matches!(self, PropertyType::String)
    }

    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            PropertyType::Date | PropertyType::TimeOfDay | PropertyType::DateTimeOffset
        )
    }

    pub fn is_spatial(&self) -> bool {
        matches!(self, PropertyType::Geography | PropertyType::Geometry)
    }

    /// 整数列可接受的取值区间（闭区间下界，开区间上界），以 f64 表示
    ///
    /// Int64 的边界是 ±2^63，两者都能被 f64 精确表示
    pub fn integer_bounds(&self) -> Option<(f64, f64)> {
        const TWO_63: f64 = 9_223_372_036_854_775_808.0;
        const TWO_64: f64 = 18_446_744_073_709_551_616.0;
        match self {
            PropertyType::Byte => Some((0.0, 256.0)),
            PropertyType::SByte => Some((-128.0, 128.0)),
            PropertyType::Int16 => Some((-32_768.0, 32_768.0)),
            PropertyType::Int32 => Some((-2_147_483_648.0, 2_147_483_648.0)),
            PropertyType::Int64 => Some((-TWO_63, TWO_63)),
            PropertyType::UInt64 => Some((0.0, TWO_64)),
            _ => None,
        }
    }
}

/// 属性元数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyMetadata {
    pub name: String,
    /// 物化行中的键名，默认与属性名相同
    #[serde(default)]
    pub json_name: String,
    /// 数据库列名，默认是属性名的 snake_case 形式
    #[serde(default)]
    pub column_name: String,
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    #[serde(default)]
    pub is_key: bool,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub is_navigation: bool,
    /// 导航目标的实体集名（或实体名）
    #[serde(default)]
    pub navigation_target: Option<String>,
    #[serde(default)]
    pub navigation_is_array: bool,
    /// 未声明引用约束时使用的外键列
    #[serde(default)]
    pub foreign_key_column: Option<String>,
    /// 依赖方属性名 → 主体方属性名
    #[serde(default)]
    pub referential_constraints: BTreeMap<String, String>,
    #[serde(default)]
    pub is_searchable: bool,
    #[serde(default)]
    pub search_fuzziness: Option<u32>,
    /// 枚举成员名 → 数值
    #[serde(default)]
    pub enum_members: BTreeMap<String, i64>,
}

impl PropertyMetadata {
    pub fn new(name: impl Into<String>, property_type: PropertyType) -> Self {
        let name = name.into();
        Self {
            json_name: name.clone(),
            column_name: to_snake_case(&name),
            name,
            property_type,
            is_key: false,
            nullable: true,
            is_navigation: false,
            navigation_target: None,
            navigation_is_array: false,
            foreign_key_column: None,
            referential_constraints: BTreeMap::new(),
            is_searchable: false,
            search_fuzziness: None,
            enum_members: BTreeMap::new(),
        }
    }

    /// 导航属性
    pub fn navigation(name: impl Into<String>, target: impl Into<String>, is_array: bool) -> Self {
        let mut prop = PropertyMetadata::new(name, PropertyType::Entity);
        prop.is_navigation = true;
        prop.navigation_target = Some(target.into());
        prop.navigation_is_array = is_array;
        prop.column_name = String::new();
        prop
    }

    pub fn key(mut self) -> Self {
        self.is_key = true;
        self.nullable = false;
        self
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column_name = column.into();
        self
    }

    pub fn json(mut self, json_name: impl Into<String>) -> Self {
        self.json_name = json_name.into();
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn searchable(mut self) -> Self {
        self.is_searchable = true;
        self
    }

    pub fn fuzziness(mut self, fuzziness: u32) -> Self {
        self.is_searchable = true;
        self.search_fuzziness = Some(fuzziness);
        self
    }

    pub fn foreign_key(mut self, column: impl Into<String>) -> Self {
        self.foreign_key_column = Some(column.into());
        self
    }

    pub fn constraint(mut self, dependent: impl Into<String>, principal: impl Into<String>) -> Self {
        self.referential_constraints
            .insert(dependent.into(), principal.into());
        self
    }

    pub fn enum_member(mut self, member: impl Into<String>, value: i64) -> Self {
        self.enum_members.insert(member.into(), value);
        self
    }

    pub fn is_single_navigation(&self) -> bool {
        self.is_navigation && !self.navigation_is_array
    }

    pub fn is_collection_navigation(&self) -> bool {
        self.is_navigation && self.navigation_is_array
    }

    /// 补全未填写的 JSON 名与列名
    pub(crate) fn normalize(&mut self) {
        if self.json_name.is_empty() {
            self.json_name = self.name.clone();
        }
        if self.column_name.is_empty() && !self.is_navigation {
            self.column_name = to_snake_case(&self.name);
        }
        if self.is_navigation {
            self.property_type = PropertyType::Entity;
        }
    }
}

/// 实体元数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMetadata {
    pub entity_name: String,
    pub entity_set_name: String,
    #[serde(default)]
    pub table_name: String,
    #[serde(default)]
    pub properties: Vec<PropertyMetadata>,
    /// 存放具体子类型名的列，`isof` 依赖它
    #[serde(default)]
    pub type_discriminator: Option<String>,
    /// 实体类型的命名空间，用于匹配 `isof('Ns.Type')`
    #[serde(default)]
    pub namespace: Option<String>,
}

impl EntityMetadata {
    pub fn new(entity_name: impl Into<String>, entity_set_name: impl Into<String>) -> Self {
        let entity_set_name = entity_set_name.into();
        Self {
            entity_name: entity_name.into(),
            table_name: to_snake_case(&entity_set_name),
            entity_set_name,
            properties: Vec::new(),
            type_discriminator: None,
            namespace: None,
        }
    }

    pub fn table(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    pub fn property(mut self, property: PropertyMetadata) -> Self {
        self.properties.push(property);
        self
    }

    pub fn discriminator(mut self, column: impl Into<String>) -> Self {
        self.type_discriminator = Some(column.into());
        self
    }

    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub(crate) fn normalize(&mut self) {
        if self.table_name.is_empty() {
            self.table_name = to_snake_case(&self.entity_set_name);
        }
        for prop in &mut self.properties {
            prop.normalize();
        }
    }

    /// 限定名 `Namespace.EntityName`
    pub fn qualified_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{}.{}", ns, self.entity_name),
            None => self.entity_name.clone(),
        }
    }

    pub fn properties(&self) -> &[PropertyMetadata] {
        &self.properties
    }

    /// 按属性名或 JSON 名查找
    pub fn find_property(&self, name: &str) -> Option<&PropertyMetadata> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .or_else(|| self.properties.iter().find(|p| p.json_name == name))
    }

    /// 解析单段结构属性
    pub fn resolve_property_path(&self, path: &str) -> Option<&PropertyMetadata> {
        if path.contains('/') {
            return None;
        }
        self.find_property(path).filter(|p| !p.is_navigation)
    }

    pub fn find_navigation_property(&self, name: &str) -> Option<&PropertyMetadata> {
        self.find_property(name).filter(|p| p.is_navigation)
    }

    pub fn find_by_column(&self, column: &str) -> Option<&PropertyMetadata> {
        self.properties
            .iter()
            .find(|p| !p.is_navigation && p.column_name == column)
    }

    pub fn key_properties(&self) -> Vec<&PropertyMetadata> {
        self.properties.iter().filter(|p| p.is_key).collect()
    }

    pub fn structural_properties(&self) -> impl Iterator<Item = &PropertyMetadata> {
        self.properties.iter().filter(|p| !p.is_navigation)
    }

    pub fn navigation_properties(&self) -> impl Iterator<Item = &PropertyMetadata> {
        self.properties.iter().filter(|p| p.is_navigation)
    }

    /// 参与搜索的属性：显式标记的属性；都未标记时取全部字符串属性
    pub fn searchable_properties(&self) -> Vec<&PropertyMetadata> {
        let flagged: Vec<_> = self
            .structural_properties()
            .filter(|p| p.is_searchable)
            .collect();
        if !flagged.is_empty() {
            return flagged;
        }
        self.structural_properties()
            .filter(|p| p.property_type.is_string())
            .collect()
    }

    /// 按属性名、列名或 JSON 名查找列名
    pub fn column_of(&self, name: &str) -> Option<&str> {
        self.resolve_property_path(name)
            .or_else(|| self.find_by_column(name))
            .map(|p| p.column_name.as_str())
    }
}
