use std::cmp::Ordering;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::{Duration, SystemTime};

use rayon::prelude::*;

use crate::active_plugins::{parse_plugin_lines, ActivePlugins};
use crate::encoding::{is_valid_utf8_file, windows_1252_to_utf8};
use crate::error::{LoadOrderError, Result};
use crate::game::{GameId, GameSettings, LoadOrderMethod};
use crate::plugin::{path_mtime, Plugin};

/// 插件加载顺序
///
/// 有序的插件序列，另缓存一份磁盘修改时间用于过期检测。
/// 缓存的修改时间只在 [`LoadOrder::load`] 和 [`LoadOrder::save`] 时更新。
#[derive(Debug, Clone, Default)]
pub struct LoadOrder {
    plugins: Vec<Plugin>,
    mtime: Option<SystemTime>,
}

impl LoadOrder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前序列
    pub fn plugins(&self) -> &[Plugin] {
        &self.plugins
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn clear(&mut self) {
        self.plugins.clear();
    }

    /// 用给定序列整体替换当前内容（不触盘，调用方负责校验与保存）
    pub fn replace(&mut self, plugins: Vec<Plugin>) {
        self.plugins = plugins;
    }

    /// 从磁盘重建加载顺序
    ///
    /// 文本文件制先读 loadorder.txt（缺失时退回 plugins.txt），再扫描数据
    /// 目录补齐文件里没有的插件；时间戳制只扫目录，最后按修改时间排序。
    pub fn load(&mut self, settings: &GameSettings) -> Result<()> {
        self.plugins.clear();

        if settings.load_order_method() == LoadOrderMethod::Textfile {
            if settings.load_order_file().exists() {
                self.load_from_file(settings, settings.load_order_file())?;
            } else if settings.active_plugins_file().exists() {
                self.load_from_file(settings, settings.active_plugins_file())?;
            }

            if settings.id() == GameId::Skyrim {
                // 游戏硬编码的主文件必须排第一
                self.move_to(0, Plugin::new(settings.master_file()));

                let update = Plugin::new("Update.esm");
                if update.exists(settings) && self.find(&update).is_none() {
                    let pos = self.last_master_pos(settings)?.map_or(0, |p| p + 1);
                    self.move_to(pos, update);
                }
            }
        }

        if settings.plugins_directory().is_dir() {
            self.add_missing_from_directory(settings)?;
        }

        if settings.load_order_method() == LoadOrderMethod::Timestamp {
            self.sort_by_timestamps(settings)?;
        }

        #[cfg(debug_assertions)]
        eprintln!("[load_order] 加载了 {} 个插件", self.plugins.len());

        self.mtime = self.disk_mtime(settings)?;
        Ok(())
    }

    /// 把当前顺序写回磁盘
    ///
    /// 时间戳制改写插件文件的修改时间；文本文件制重写 loadorder.txt，并把
    /// 激活列表一并保存（保存前若内存缓存已过期则先重读）。
    /// 返回值携带 BAD_FILENAME 警告对应的文件名（若有）。
    pub fn save(
        &mut self,
        settings: &GameSettings,
        active_plugins: &mut ActivePlugins,
    ) -> Result<Option<String>> {
        if settings.load_order_method() == LoadOrderMethod::Timestamp {
            self.save_timestamps(settings)?;
            self.mtime = Some(path_mtime(settings.plugins_directory())?);
            return Ok(None);
        }

        let path = settings.load_order_file();
        let file = File::create(path).map_err(|e| LoadOrderError::FileWriteFail {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut writer = BufWriter::new(file);
        for plugin in &self.plugins {
            writeln!(writer, "{}", plugin.name()).map_err(|e| LoadOrderError::FileWriteFail {
                path: path.to_path_buf(),
                source: e,
            })?;
        }
        writer.flush().map_err(|e| LoadOrderError::FileWriteFail {
            path: path.to_path_buf(),
            source: e,
        })?;
        drop(writer);

        // plugins.txt 里激活插件按加载顺序排列，这里顺序变了所以要重写；
        // 内存里的激活集如果落后于磁盘，先重读避免覆盖掉别人的修改
        if active_plugins.has_changed(settings)? {
            active_plugins.load(settings)?;
        }
        let warning = active_plugins.save(settings, self)?;

        // 激活文件的修改时间缓存不动：集合本身无序，只有排列变了
        self.mtime = Some(path_mtime(path)?);
        Ok(warning)
    }

    /// 校验当前序列是否满足全部不变式
    ///
    /// 依次检查：第一项是游戏主文件；主文件都在普通插件之前；每一项都
    /// 存在于磁盘；无重复；每个插件依赖的主文件都排在它前面。
    /// 只查询不修改；校验中的 I/O 错误会向上传播。
    pub fn is_valid(&self, settings: &GameSettings) -> Result<bool> {
        let first = match self.plugins.first() {
            Some(p) => p,
            None => return Ok(false),
        };
        if *first != Plugin::new(settings.master_file()) {
            return Ok(false);
        }

        let mut was_master = true;
        let mut seen: HashSet<Plugin> = HashSet::new();
        for plugin in &self.plugins {
            if !plugin.exists(settings) {
                return Ok(false);
            }
            let is_master = plugin.is_master_file(settings)?;
            if is_master && !was_master {
                return Ok(false);
            }
            if seen.contains(plugin) {
                return Ok(false);
            }
            for master in plugin.masters(settings)? {
                if !seen.contains(&master) {
                    return Ok(false);
                }
            }
            seen.insert(plugin.clone());
            was_master = is_master;
        }
        Ok(true)
    }

    /// 磁盘状态是否比内存缓存新
    pub fn has_changed(&self, settings: &GameSettings) -> Result<bool> {
        if self.plugins.is_empty() {
            return Ok(true);
        }
        let cached = match self.mtime {
            Some(t) => t,
            None => return Ok(true),
        };
        match self.disk_mtime(settings)? {
            Some(current) => Ok(current > cached),
            None => Ok(false),
        }
    }

    /// 把插件挪到指定位置；不在序列中则直接插入
    ///
    /// 位置超出序列长度时插到末尾。
    pub fn move_to(&mut self, new_pos: usize, plugin: Plugin) {
        let mut new_pos = new_pos;
        match self.find(&plugin) {
            None => {
                let pos = new_pos.min(self.plugins.len());
                self.plugins.insert(pos, plugin);
            }
            Some(pos) => {
                if pos < new_pos {
                    new_pos -= 1;
                }
                self.plugins.remove(pos);
                let new_pos = new_pos.min(self.plugins.len());
                self.plugins.insert(new_pos, plugin);
            }
        }
    }

    /// 按大小写不敏感的规则查找插件位置
    pub fn find(&self, plugin: &Plugin) -> Option<usize> {
        self.plugins.iter().position(|p| p == plugin)
    }

    /// 最后一个主文件的下标
    ///
    /// 扫到第一个非主文件为止；序列全是主文件时返回最后一项的下标，
    /// 空序列返回 None。
    pub fn last_master_pos(&self, settings: &GameSettings) -> Result<Option<usize>> {
        for (i, plugin) in self.plugins.iter().enumerate() {
            if !plugin.is_master_file(settings)? {
                return Ok(if i == 0 { None } else { Some(i - 1) });
            }
        }
        Ok(self.plugins.len().checked_sub(1))
    }

    /// 解析文本格式的顺序文件
    ///
    /// loadorder.txt 必须是 UTF-8；退回读 plugins.txt 时按 Windows-1252
    /// 转码。每行一个文件名，空行和 # 开头的行跳过。
    fn load_from_file(&mut self, settings: &GameSettings, file: &Path) -> Result<()> {
        let transcode = file == settings.active_plugins_file();

        if !transcode && !is_valid_utf8_file(file)? {
            return Err(LoadOrderError::FileNotUtf8(file.to_path_buf()));
        }

        let data = fs::read(file).map_err(|_| LoadOrderError::FileParseFail(file.to_path_buf()))?;
        let text = if transcode {
            windows_1252_to_utf8(&data)
        } else {
            String::from_utf8(data).map_err(|_| LoadOrderError::FileNotUtf8(file.to_path_buf()))?
        };

        for name in parse_plugin_lines(&text, settings.id()) {
            self.plugins.push(Plugin::new(&name));
        }
        Ok(())
    }

    /// 扫描数据目录，把序列里缺的有效插件补进来
    ///
    /// 主文件插到已有主文件之后，普通插件追加到末尾。
    fn add_missing_from_directory(&mut self, settings: &GameSettings) -> Result<()> {
        let entries = fs::read_dir(settings.plugins_directory()).map_err(|e| {
            LoadOrderError::FileReadFail {
                path: settings.plugins_directory().to_path_buf(),
                source: e,
            }
        })?;

        let mut insert_pos = self.last_master_pos(settings)?.map_or(0, |p| p + 1);
        for entry in entries {
            let entry = entry.map_err(|e| LoadOrderError::FileReadFail {
                path: settings.plugins_directory().to_path_buf(),
                source: e,
            })?;
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            let filename = entry.file_name();
            let plugin = Plugin::new(&filename.to_string_lossy());
            if !plugin.is_valid() || self.find(&plugin).is_some() {
                continue;
            }
            if plugin.is_master_file(settings)? {
                self.plugins.insert(insert_pos, plugin);
                insert_pos += 1;
            } else {
                self.plugins.push(plugin);
            }
        }
        Ok(())
    }

    /// 按（主文件优先，修改时间升序）重排；相同键保持原有先后
    fn sort_by_timestamps(&mut self, settings: &GameSettings) -> Result<()> {
        let decorated: Result<Vec<(Plugin, bool, SystemTime)>> = self
            .plugins
            .par_iter()
            .map(|p| {
                Ok((
                    p.clone(),
                    p.is_master_file(settings)?,
                    p.modification_time(settings)?,
                ))
            })
            .collect();
        let mut decorated = decorated?;

        decorated.sort_by(|a, b| match (a.1, b.1) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => a.2.cmp(&b.2),
        });

        self.plugins = decorated.into_iter().map(|(p, _, _)| p).collect();
        Ok(())
    }

    /// 把当前顺序编码进文件修改时间
    ///
    /// 以第一项的修改时间为起点向后推进：后一项时间更晚就直接采用，否则
    /// 在运行值上加 60 秒并写回该插件，保证修改时间沿序列单调不降。
    fn save_timestamps(&mut self, settings: &GameSettings) -> Result<()> {
        let first = match self.plugins.first() {
            Some(p) => p,
            None => return Ok(()),
        };
        let mut last_time = first.modification_time(settings)?;
        for plugin in &self.plugins[1..] {
            let this_time = plugin.modification_time(settings)?;
            if this_time > last_time {
                last_time = this_time;
            } else {
                last_time += Duration::from_secs(60);
                plugin.set_modification_time(settings, last_time)?;
            }
        }
        Ok(())
    }

    /// 磁盘侧用于过期比较的修改时间
    ///
    /// 文本文件制且 loadorder.txt 存在时，取它和数据目录中较新的那个；
    /// 否则取数据目录的。两者都不存在时返回 None。
    fn disk_mtime(&self, settings: &GameSettings) -> Result<Option<SystemTime>> {
        let dir = settings.plugins_directory();
        let dir_mtime = if dir.exists() {
            Some(path_mtime(dir)?)
        } else {
            None
        };

        if settings.load_order_method() == LoadOrderMethod::Textfile
            && settings.load_order_file().exists()
        {
            let file_mtime = path_mtime(settings.load_order_file())?;
            return Ok(Some(match dir_mtime {
                Some(d) if d > file_mtime => d,
                _ => file_mtime,
            }));
        }
        Ok(dir_mtime)
    }
}
