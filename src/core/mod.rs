pub mod error;
pub mod metadata;
pub mod value;

// 错误和结果类型
pub use error::{ErrorCategory, ODataError, ODataResult};

// 元数据
pub use metadata::{
    EntityMetadata, EntityRegistry, FieldAccessorTable, JsonRow, PropertyMetadata, PropertyType,
};

// 核心数据类型
pub use value::Value;
