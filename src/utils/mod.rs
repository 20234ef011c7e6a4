// 工具模块 - 仅用于导出各个子模块，不包含具体实现

// 对象池模块
pub mod object_pool;
pub use object_pool::{ObjectPool, Reset};

// 日志模块
pub mod logging;

// 字符串工具模块
pub mod string_utils;
pub use string_utils::{escape_like, split_top_level, to_snake_case, unquote};
