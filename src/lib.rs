pub mod active_plugins;
pub mod encoding;
pub mod error;
pub mod game;
pub mod header;
pub mod load_order;
pub mod plugin;

// 重新导出主要结构
pub use active_plugins::ActivePlugins;
pub use error::{LoadOrderError, Result};
pub use game::{GameContext, GameId, GameSettings, LoadOrderMethod};
pub use load_order::LoadOrder;
pub use plugin::Plugin;

// 常量定义
pub const SUPPORTED_EXTENSIONS: &[&str] = &["esp", "esm"];

/// 激活插件数量上限
pub const MAX_ACTIVE_PLUGINS: usize = 255;
