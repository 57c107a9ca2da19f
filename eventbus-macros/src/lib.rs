//! 集成事件过程宏（eventbus-macros）
//!
//! - `#[integration_event]`：为具名字段结构体补齐 `id` / `created_at` 字段、
//!   合并必需派生，并实现 `::eventbus::integration_event::IntegrationEvent`。
//!
use proc_macro::TokenStream;

mod integration_event;
mod utils;

/// 集成事件宏
/// - 追加字段：`id: String`, `created_at: Timestamp`（若缺失）并置于字段最前
/// - 派生：Debug, Clone, serde::Serialize, serde::Deserialize（与已有 derive 合并去重）
/// - 生成 `new(..)`：参数为其余字段，自动填充新事件标识与当前时间
/// - 支持参数：`#[integration_event(name = "...")]`，默认取结构体名
#[proc_macro_attribute]
pub fn integration_event(attr: TokenStream, item: TokenStream) -> TokenStream {
    integration_event::expand(attr, item)
}
