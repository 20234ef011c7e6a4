//! 测试数据模型
//!
//! 商品目录（商品、分类、评论）、图书馆（作者、图书）以及复合键的订单行与发货单。

use odata_query::core::JsonRow;
use odata_query::{EntityMetadata, EntityRegistry, PropertyMetadata, PropertyType};
use serde_json::{json, Value as JsonValue};

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
        .property(PropertyMetadata::new("CategoryID", PropertyType::Int64))
        .property(PropertyMetadata::new("Active", PropertyType::Boolean))
        .property(PropertyMetadata::new("CreatedAt", PropertyType::DateTimeOffset))
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

pub fn author() -> EntityMetadata {
    EntityMetadata::new("Author", "Authors")
        .property(PropertyMetadata::new("ID", PropertyType::Int64).key())
        .property(PropertyMetadata::new("Name", PropertyType::String))
        .property(PropertyMetadata::new("Email", PropertyType::String))
        .property(
            PropertyMetadata::navigation("Books", "Books", true).constraint("AuthorID", "ID"),
        )
}

pub fn book() -> EntityMetadata {
    EntityMetadata::new("Book", "Books")
        .property(PropertyMetadata::new("ID", PropertyType::Int64).key())
        .property(PropertyMetadata::new("Title", PropertyType::String))
        .property(PropertyMetadata::new("AuthorID", PropertyType::Int64))
        .property(PropertyMetadata::new("Pages", PropertyType::Int32))
        .property(
            PropertyMetadata::navigation("Author", "Authors", false).constraint("AuthorID", "ID"),
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
pub fn register_all() {
    for meta in [
        product(),
        category(),
        review(),
        author(),
        book(),
        order_line(),
        shipment(),
    ] {
        EntityRegistry::register(meta);
    }
}

pub fn row(value: JsonValue) -> JsonRow {
    value.as_object().cloned().unwrap_or_default()
}

/// 内存中的商品行
pub fn product_rows() -> Vec<JsonRow> {
    vec![
        row(json!({"ID": 1, "Name": "Laptop Pro", "Description": "Fast café laptop", "Price": 1200.0, "Stock": 4})),
        row(json!({"ID": 2, "Name": "Phone", "Description": "Smart phone with camera", "Price": 800.0, "Stock": 10})),
        row(json!({"ID": 3, "Name": "Desk Lamp", "Description": "LED lamp", "Price": 35.5, "Stock": 0})),
        row(json!({"ID": 4, "Name": "東京都 Guide", "Description": "Travel book", "Price": 20.0, "Stock": 7})),
    ]
}

/// 评论表
pub fn review_rows() -> Vec<JsonRow> {
    vec![
        row(json!({"ID": 1, "ProductID": 1, "Rating": 5, "Comment": "great"})),
        row(json!({"ID": 2, "ProductID": 1, "Rating": 4, "Comment": "good"})),
        row(json!({"ID": 3, "ProductID": 1, "Rating": 2, "Comment": "meh"})),
        row(json!({"ID": 4, "ProductID": 2, "Rating": 5, "Comment": "love it"})),
    ]
}
