//! 实体元数据服务
//!
//! 查询解析只读地消费这里的信息：属性查找、导航目标解析、主键枚举、可搜索标记。

pub mod accessor;
pub mod entity;
pub mod registry;

#[cfg(test)]
pub(crate) mod test_fixtures;

pub use accessor::{FieldAccessorTable, JsonRow};
pub use entity::{EntityMetadata, PropertyMetadata, PropertyType};
pub use registry::{EntityRegistry, JoinPair, NavigationHop, NavigationPath};
