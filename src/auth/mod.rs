//! 授权感知的投影
//!
//! 解析与校验之后、生成 SQL 之前，按授权策略裁剪 `$select` 与 `$expand`。

pub mod filter;
pub mod policy;

pub use filter::{authorize_query_options, filter_expand_options, filter_selected_properties};
pub use policy::{AllowAll, AuthContext, Authorizer, DenyList, ResourceDescriptor, RolePolicy};
