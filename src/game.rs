use std::path::{Path, PathBuf};

use crate::active_plugins::ActivePlugins;
use crate::error::{LoadOrderError, Result};
use crate::load_order::LoadOrder;
use crate::plugin::Plugin;

/// 支持的游戏
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameId {
    Morrowind,
    Oblivion,
    Skyrim,
    Fallout3,
    FalloutNV,
    Fallout4,
}

impl GameId {
    /// 稳定的整数游戏编号
    pub fn code(self) -> u32 {
        match self {
            GameId::Morrowind => 1,
            GameId::Oblivion => 2,
            GameId::Skyrim => 3,
            GameId::Fallout3 => 4,
            GameId::FalloutNV => 5,
            GameId::Fallout4 => 6,
        }
    }

    /// 该游戏编码加载顺序的方式
    pub fn load_order_method(self) -> LoadOrderMethod {
        match self {
            GameId::Skyrim | GameId::Fallout4 => LoadOrderMethod::Textfile,
            _ => LoadOrderMethod::Timestamp,
        }
    }

    /// 游戏自带的主文件名
    pub fn default_master_file(self) -> &'static str {
        match self {
            GameId::Morrowind => "Morrowind.esm",
            GameId::Oblivion => "Oblivion.esm",
            GameId::Skyrim => "Skyrim.esm",
            GameId::Fallout3 => "Fallout3.esm",
            GameId::FalloutNV => "FalloutNV.esm",
            GameId::Fallout4 => "Fallout4.esm",
        }
    }
}

/// 加载顺序的持久化方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOrderMethod {
    /// 顺序编码在数据目录各插件文件的修改时间里
    Timestamp,
    /// 顺序记录在单独的文本文件里
    Textfile,
}

impl LoadOrderMethod {
    pub fn code(self) -> u32 {
        match self {
            LoadOrderMethod::Timestamp => 0,
            LoadOrderMethod::Textfile => 1,
        }
    }
}

/// 每个游戏会话不变的参数
///
/// 数据目录、两个状态文件的位置和主文件名。对没有独立顺序文件的游戏，
/// 顺序文件路径可以与激活文件相同。
#[derive(Debug, Clone)]
pub struct GameSettings {
    id: GameId,
    plugins_directory: PathBuf,
    load_order_file: PathBuf,
    active_plugins_file: PathBuf,
    master_file: String,
}

impl GameSettings {
    /// 创建游戏参数
    ///
    /// # 参数
    /// * `id` - 游戏标识
    /// * `plugins_directory` - 插件所在的数据目录（Data / Data Files）
    /// * `load_order_file` - loadorder.txt 的绝对路径
    /// * `active_plugins_file` - plugins.txt 或 Morrowind.ini 的绝对路径
    pub fn new(
        id: GameId,
        plugins_directory: PathBuf,
        load_order_file: PathBuf,
        active_plugins_file: PathBuf,
    ) -> Self {
        GameSettings {
            id,
            plugins_directory,
            load_order_file,
            active_plugins_file,
            master_file: id.default_master_file().to_string(),
        }
    }

    pub fn id(&self) -> GameId {
        self.id
    }

    pub fn load_order_method(&self) -> LoadOrderMethod {
        self.id.load_order_method()
    }

    pub fn plugins_directory(&self) -> &Path {
        &self.plugins_directory
    }

    pub fn load_order_file(&self) -> &Path {
        &self.load_order_file
    }

    pub fn active_plugins_file(&self) -> &Path {
        &self.active_plugins_file
    }

    pub fn master_file(&self) -> &str {
        &self.master_file
    }

    /// 替换主文件名（供全面转换 Mod 使用）
    pub fn set_master_file(&mut self, name: &str) {
        self.master_file = name.to_string();
    }
}

/// 单个游戏的会话状态
///
/// 持有不变参数和两份懒加载的内存缓存。所有高层操作先按需从磁盘刷新
/// 缓存，改完校验，再落盘。
#[derive(Debug)]
pub struct GameContext {
    settings: GameSettings,
    load_order: LoadOrder,
    active_plugins: ActivePlugins,
}

impl GameContext {
    pub fn new(settings: GameSettings) -> Self {
        GameContext {
            settings,
            load_order: LoadOrder::new(),
            active_plugins: ActivePlugins::new(),
        }
    }

    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    /// 替换主文件名（供全面转换 Mod 使用）
    pub fn set_master_file(&mut self, name: &str) {
        self.settings.set_master_file(name);
    }

    /// 当前加载顺序的插件名列表
    pub fn load_order(&mut self) -> Result<Vec<String>> {
        self.refresh_load_order()?;
        Ok(self
            .load_order
            .plugins()
            .iter()
            .map(|p| p.name().to_string())
            .collect())
    }

    /// 用给定列表整体替换加载顺序并保存
    ///
    /// 列表必须满足全部加载顺序不变式，否则返回 INVALID_ARGS 并清空缓存。
    pub fn set_load_order(&mut self, plugin_names: &[&str]) -> Result<Option<String>> {
        if plugin_names.is_empty() {
            return Err(LoadOrderError::InvalidArgs(
                "zero-length plugin list passed".to_string(),
            ));
        }

        let mut candidate = LoadOrder::new();
        candidate.replace(plugin_names.iter().map(|n| Plugin::new(n)).collect());

        if !candidate.is_valid(&self.settings)? {
            self.load_order.clear();
            return Err(LoadOrderError::InvalidArgs(
                "invalid load order supplied".to_string(),
            ));
        }

        self.load_order = candidate;
        self.save_load_order()
    }

    /// 查询插件在加载顺序中的位置
    pub fn plugin_position(&mut self, plugin_name: &str) -> Result<usize> {
        self.refresh_load_order()?;
        self.load_order
            .find(&Plugin::new(plugin_name))
            .ok_or_else(|| LoadOrderError::FileNotFound(plugin_name.to_string()))
    }

    /// 查询指定位置上的插件名
    pub fn plugin_at(&mut self, index: usize) -> Result<String> {
        self.refresh_load_order()?;
        self.load_order
            .plugins()
            .get(index)
            .map(|p| p.name().to_string())
            .ok_or_else(|| {
                LoadOrderError::InvalidArgs(format!(
                    "index {} is beyond the end of the load order",
                    index
                ))
            })
    }

    /// 把插件挪到指定位置并保存
    ///
    /// 挪动后若不变式不再成立，恢复原序列并返回 INVALID_ARGS。
    pub fn set_plugin_position(
        &mut self,
        plugin_name: &str,
        index: usize,
    ) -> Result<Option<String>> {
        self.refresh_load_order()?;

        let previous = self.load_order.clone();
        self.load_order.move_to(index, Plugin::new(plugin_name));

        if !self.load_order.is_valid(&self.settings)? {
            self.load_order = previous;
            return Err(LoadOrderError::InvalidArgs(
                "the operation results in an invalid load order".to_string(),
            ));
        }

        self.save_load_order()
    }

    /// 当前激活插件名列表（顺序不作保证）
    pub fn active_plugins(&mut self) -> Result<Vec<String>> {
        self.refresh_active_plugins()?;
        Ok(self
            .active_plugins
            .plugins()
            .iter()
            .map(|p| p.name().to_string())
            .collect())
    }

    /// 用给定列表整体替换激活集合并保存
    pub fn set_active_plugins(&mut self, plugin_names: &[&str]) -> Result<Option<String>> {
        self.active_plugins.clear();
        for name in plugin_names {
            let plugin = Plugin::new(name);
            if self.active_plugins.contains(&plugin) {
                self.active_plugins.clear();
                return Err(LoadOrderError::InvalidArgs(
                    "the supplied active plugins list contains duplicates".to_string(),
                ));
            }
            if !plugin.exists(&self.settings) {
                self.active_plugins.clear();
                return Err(LoadOrderError::FileNotFound(plugin.name().to_string()));
            }
            self.active_plugins.insert(plugin);
        }

        if !self.active_plugins.is_valid(&self.settings)? {
            self.active_plugins.clear();
            return Err(LoadOrderError::InvalidArgs(
                "invalid active plugins list supplied".to_string(),
            ));
        }

        self.save_active_plugins()
    }

    /// 激活或停用单个插件并保存
    ///
    /// # 参数
    /// * `plugin_name` - 插件文件名（带不带 ".ghost" 都可以）
    /// * `active` - true 激活，false 停用
    ///
    /// # 行为
    /// 激活不存在的插件返回 FILE_NOT_FOUND；激活会先把 ghost 文件改回
    /// 原名；操作导致集合无效时清空缓存并返回 INVALID_ARGS。
    pub fn set_plugin_active(&mut self, plugin_name: &str, active: bool) -> Result<Option<String>> {
        let plugin = Plugin::new(plugin_name);

        if active && !plugin.exists(&self.settings) {
            return Err(LoadOrderError::FileNotFound(plugin.name().to_string()));
        }

        plugin.unghost(&self.settings)?;

        self.refresh_active_plugins()?;

        if active {
            self.active_plugins.insert(plugin);
        } else {
            self.active_plugins.remove(&plugin);
        }

        if !self.active_plugins.is_valid(&self.settings)? {
            self.active_plugins.clear();
            return Err(LoadOrderError::InvalidArgs(
                "the operation results in an invalid active plugins list".to_string(),
            ));
        }

        self.save_active_plugins()
    }

    /// 查询插件是否激活
    pub fn is_plugin_active(&mut self, plugin_name: &str) -> Result<bool> {
        self.refresh_active_plugins()?;
        Ok(self.active_plugins.contains(&Plugin::new(plugin_name)))
    }

    /// 保存加载顺序（文本文件制会连同激活列表一起写）
    pub fn save_load_order(&mut self) -> Result<Option<String>> {
        let GameContext {
            settings,
            load_order,
            active_plugins,
        } = self;
        load_order.save(settings, active_plugins)
    }

    /// 保存激活列表
    ///
    /// 文本文件制下条目按加载顺序写出，先保证顺序缓存是新的。
    pub fn save_active_plugins(&mut self) -> Result<Option<String>> {
        if self.settings.load_order_method() == LoadOrderMethod::Textfile {
            self.refresh_load_order()?;
        }
        let GameContext {
            settings,
            load_order,
            active_plugins,
        } = self;
        active_plugins.save(settings, load_order)
    }

    fn refresh_load_order(&mut self) -> Result<()> {
        if self.load_order.has_changed(&self.settings)? {
            self.load_order.load(&self.settings)?;
        }
        Ok(())
    }

    fn refresh_active_plugins(&mut self) -> Result<()> {
        if self.active_plugins.has_changed(&self.settings)? {
            self.active_plugins.load(&self.settings)?;
        }
        Ok(())
    }
}
