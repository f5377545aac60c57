use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::time::SystemTime;

use regex::Regex;

use crate::encoding::{utf8_to_windows_1252, windows_1252_to_utf8};
use crate::error::{LoadOrderError, Result};
use crate::game::{GameId, GameSettings, LoadOrderMethod};
use crate::load_order::LoadOrder;
use crate::plugin::{path_mtime, Plugin};

const GAME_FILES_HEADER: &[u8] = b"[Game Files]";

/// 激活插件集合
///
/// 大小写不敏感的插件集合，另缓存一份激活文件的修改时间用于过期检测。
/// 缓存的修改时间只在 [`ActivePlugins::load`] 和 [`ActivePlugins::save`]
/// 时更新。
#[derive(Debug, Clone, Default)]
pub struct ActivePlugins {
    plugins: HashSet<Plugin>,
    mtime: Option<SystemTime>,
}

impl ActivePlugins {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plugins(&self) -> &HashSet<Plugin> {
        &self.plugins
    }

    pub fn contains(&self, plugin: &Plugin) -> bool {
        self.plugins.contains(plugin)
    }

    pub fn insert(&mut self, plugin: Plugin) {
        self.plugins.insert(plugin);
    }

    pub fn remove(&mut self, plugin: &Plugin) {
        self.plugins.remove(plugin);
    }

    pub fn clear(&mut self) {
        self.plugins.clear();
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// 从激活文件重建集合
    ///
    /// Morrowind 读 Morrowind.ini 的 GameFileN 行，其余游戏读 plugins.txt。
    /// 文件内容按 Windows-1252 转码成 UTF-8。
    pub fn load(&mut self, settings: &GameSettings) -> Result<()> {
        self.plugins.clear();

        let path = settings.active_plugins_file();
        let data =
            fs::read(path).map_err(|_| LoadOrderError::FileParseFail(path.to_path_buf()))?;
        let text = windows_1252_to_utf8(&data);

        for name in parse_plugin_lines(&text, settings.id()) {
            self.plugins.insert(Plugin::new(&name));
        }

        // Skyrim 会无条件加载这两个，缺了就补上
        if settings.id() == GameId::Skyrim {
            let master = Plugin::new(settings.master_file());
            if !self.plugins.contains(&master) {
                self.plugins.insert(master);
            }
            let update = Plugin::new("Update.esm");
            if update.exists(settings) && !self.plugins.contains(&update) {
                self.plugins.insert(update);
            }
        }

        self.mtime = Some(path_mtime(path)?);
        Ok(())
    }

    /// 把集合写回激活文件
    ///
    /// Morrowind 先原样保留 ini 里 [Game Files] 之前的内容再写条目；
    /// 文本文件制游戏的条目按当前加载顺序排列，时间戳制不保证顺序。
    /// 某个名字无法编码为 Windows-1252 时跳过该条目继续写完其余内容，
    /// 最后把最后一个失败的名字放在 `Ok(Some(..))` 里返回。
    pub fn save(
        &mut self,
        settings: &GameSettings,
        load_order: &LoadOrder,
    ) -> Result<Option<String>> {
        let path = settings.active_plugins_file();

        let mut prefix: Vec<u8> = Vec::new();
        if settings.id() == GameId::Morrowind && path.exists() {
            let contents =
                fs::read(path).map_err(|e| LoadOrderError::FileReadFail {
                    path: path.to_path_buf(),
                    source: e,
                })?;
            if let Some(pos) = find_subslice(&contents, GAME_FILES_HEADER) {
                prefix = contents[..pos + GAME_FILES_HEADER.len()].to_vec();
            }
        }

        let write_fail = |e: std::io::Error| LoadOrderError::FileWriteFail {
            path: path.to_path_buf(),
            source: e,
        };

        let file = File::create(path).map_err(write_fail)?;
        let mut writer = BufWriter::new(file);

        if !prefix.is_empty() {
            writer.write_all(&prefix).map_err(write_fail)?;
            writeln!(writer).map_err(write_fail)?;
        }

        let mut bad_filename: Option<String> = None;
        let mut index = 0usize;

        if settings.load_order_method() == LoadOrderMethod::Timestamp {
            // 集合无序，写出顺序不作保证
            for plugin in &self.plugins {
                match utf8_to_windows_1252(plugin.name()) {
                    Ok(encoded) => {
                        if settings.id() == GameId::Morrowind {
                            write!(writer, "GameFile{}=", index).map_err(write_fail)?;
                        }
                        writer.write_all(&encoded).map_err(write_fail)?;
                        writeln!(writer).map_err(write_fail)?;
                        index += 1;
                    }
                    Err(_) => bad_filename = Some(plugin.name().to_string()),
                }
            }
        } else {
            // 按加载顺序写出；Skyrim 的主文件由游戏硬编码，不落盘
            for plugin in load_order.plugins() {
                if !self.plugins.contains(plugin) {
                    continue;
                }
                if settings.id() == GameId::Skyrim
                    && *plugin == Plugin::new(settings.master_file())
                {
                    continue;
                }
                match utf8_to_windows_1252(plugin.name()) {
                    Ok(encoded) => {
                        writer.write_all(&encoded).map_err(write_fail)?;
                        writeln!(writer).map_err(write_fail)?;
                    }
                    Err(_) => bad_filename = Some(plugin.name().to_string()),
                }
            }
        }

        writer.flush().map_err(write_fail)?;
        drop(writer);

        self.mtime = Some(path_mtime(path)?);
        Ok(bad_filename)
    }

    /// 校验集合是否满足全部不变式
    ///
    /// 每个成员都存在于磁盘；成员依赖的主文件也都是成员；总数不超过
    /// 255；Skyrim 另须包含主文件，且磁盘上有 Update.esm 时也须包含它。
    pub fn is_valid(&self, settings: &GameSettings) -> Result<bool> {
        for plugin in &self.plugins {
            if !plugin.exists(settings) {
                return Ok(false);
            }
            for master in plugin.masters(settings)? {
                if !self.plugins.contains(&master) {
                    return Ok(false);
                }
            }
        }

        if self.plugins.len() > crate::MAX_ACTIVE_PLUGINS {
            return Ok(false);
        }

        if settings.id() == GameId::Skyrim {
            if !self.plugins.contains(&Plugin::new(settings.master_file())) {
                return Ok(false);
            }
            let update = Plugin::new("Update.esm");
            if update.exists(settings) && !self.plugins.contains(&update) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// 激活文件是否比内存缓存新
    ///
    /// 集合为空视为过期；文件不存在视为未变。
    pub fn has_changed(&self, settings: &GameSettings) -> Result<bool> {
        if self.plugins.is_empty() {
            return Ok(true);
        }
        let cached = match self.mtime {
            Some(t) => t,
            None => return Ok(true),
        };
        let path = settings.active_plugins_file();
        if !path.exists() {
            return Ok(false);
        }
        Ok(path_mtime(path)? > cached)
    }
}

/// 从文本中解析插件名列表
///
/// 通用格式：每行一个文件名，空行和 # 开头的行跳过。Morrowind 的 ini
/// 只认匹配 GameFileN=xxx.esm/esp 的行，取 = 之后的部分。
pub(crate) fn parse_plugin_lines(text: &str, game_id: GameId) -> Vec<String> {
    let mut names = Vec::new();

    if game_id == GameId::Morrowind {
        let game_file_line = Regex::new(r"(?i)^GameFile[0-9]{1,3}=.+\.es[mp]$").unwrap();
        for line in text.lines() {
            let line = line.trim_end_matches('\r');
            if line.is_empty() || !game_file_line.is_match(line) {
                continue;
            }
            if let Some(eq) = line.find('=') {
                names.push(line[eq + 1..].to_string());
            }
        }
    } else {
        for line in text.lines() {
            let line = line.trim_end_matches('\r');
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            names.push(line.to_string());
        }
    }
    names
}

/// 在字节串里找子串的第一次出现
fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
