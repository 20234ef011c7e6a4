//! 单元测试共用的商品目录模型

use super::entity::{EntityMetadata, PropertyMetadata, PropertyType};
use super::registry::EntityRegistry;

pub fn product() -> EntityMetadata {
    EntityMetadata::new("Product", "Products")
        .in_namespace("Catalog")
        .discriminator("kind")
        .property(PropertyMetadata::new("ID", PropertyType::Int64).key())
        .property(PropertyMetadata::new("Name", PropertyType::String).searchable())
        .property(PropertyMetadata::new("Description", PropertyType::String).fuzziness(2))
        .property(PropertyMetadata::new("Price", PropertyType::Double))
        .property(PropertyMetadata::new("Cost", PropertyType::Double))
        .property(PropertyMetadata::new("Stock", PropertyType::Int32))
        .property(PropertyMetadata::new("Quantity", PropertyType::Int64))
        .property(PropertyMetadata::new("CategoryID", PropertyType::Int64))
        .property(PropertyMetadata::new("Active", PropertyType::Boolean))
        .property(PropertyMetadata::new("CreatedAt", PropertyType::DateTimeOffset))
        .property(PropertyMetadata::new("ReleaseDate", PropertyType::Date))
        .property(PropertyMetadata::new("Location", PropertyType::Geography))
        .property(
            PropertyMetadata::new("Color", PropertyType::Enum)
                .enum_member("Red", 1)
                .enum_member("Green", 2)
                .enum_member("Blue", 4),
        )
        .property(
            PropertyMetadata::navigation("Category", "Categories", false)
                .constraint("CategoryID", "ID"),
        )
        .property(
            PropertyMetadata::navigation("Reviews", "Reviews", true).constraint("ProductID", "ID"),
        )
}

pub fn category() -> EntityMetadata {
    EntityMetadata::new("Category", "Categories")
        .property(PropertyMetadata::new("ID", PropertyType::Int64).key())
        .property(PropertyMetadata::new("Name", PropertyType::String))
        .property(PropertyMetadata::new("ParentID", PropertyType::Int64))
        .property(
            PropertyMetadata::navigation("Products", "Products", true)
                .constraint("CategoryID", "ID"),
        )
        .property(
            PropertyMetadata::navigation("Parent", "Categories", false)
                .constraint("ParentID", "ID"),
        )
        .property(
            PropertyMetadata::navigation("Children", "Categories", true)
                .constraint("ParentID", "ID"),
        )
}

pub fn review() -> EntityMetadata {
    EntityMetadata::new("Review", "Reviews")
        .property(PropertyMetadata::new("ID", PropertyType::Int64).key())
        .property(PropertyMetadata::new("ProductID", PropertyType::Int64))
        .property(PropertyMetadata::new("Rating", PropertyType::Int32))
        .property(PropertyMetadata::new("Comment", PropertyType::String))
        .property(
            PropertyMetadata::navigation("Product", "Products", false)
                .constraint("ProductID", "ID"),
        )
}

pub fn order_line() -> EntityMetadata {
    EntityMetadata::new("OrderLine", "OrderLines")
        .property(PropertyMetadata::new("OrderID", PropertyType::Int64).key())
        .property(PropertyMetadata::new("LineNo", PropertyType::Int32).key())
        .property(PropertyMetadata::new("ShipmentOrderID", PropertyType::Int64))
        .property(PropertyMetadata::new("ShipmentNo", PropertyType::Int32))
        .property(PropertyMetadata::new("Amount", PropertyType::Decimal))
        .property(
            PropertyMetadata::navigation("Shipment", "Shipments", false)
                .constraint("ShipmentOrderID", "OrderID")
                .constraint("ShipmentNo", "No"),
        )
}

pub fn shipment() -> EntityMetadata {
    EntityMetadata::new("Shipment", "Shipments")
        .property(PropertyMetadata::new("OrderID", PropertyType::Int64).key())
        .property(PropertyMetadata::new("No", PropertyType::Int32).key())
        .property(PropertyMetadata::new("Carrier", PropertyType::String))
        .property(
            PropertyMetadata::navigation("Lines", "OrderLines", true)
                .constraint("ShipmentOrderID", "OrderID")
                .constraint("ShipmentNo", "No"),
        )
}

/// 注册全部实体；重复调用是幂等的
pub fn register_catalog() {
    for meta in [product(), category(), review(), order_line(), shipment()] {
        EntityRegistry::register(meta);
    }
}
