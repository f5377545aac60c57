use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use filetime::FileTime;

use crate::error::{LoadOrderError, Result};
use crate::game::GameSettings;
use crate::header;

/// 按文件名标识的插件
///
/// 存储的是规范名：构造时去掉结尾的 ".ghost"。比较与哈希对大小写不敏感，
/// "Blank.esp" 和 "blank.ESP" 指同一个插件。
#[derive(Debug, Clone)]
pub struct Plugin {
    name: String,
}

impl Plugin {
    /// 从文件名创建插件，自动去掉 ".ghost" 后缀
    pub fn new(filename: &str) -> Self {
        let name = match strip_ghost_extension(filename) {
            Some(stem) => stem.to_string(),
            None => filename.to_string(),
        };
        Plugin { name }
    }

    /// 规范文件名（不带 ".ghost"）
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 是否为 .esp / .esm 文件
    pub fn is_valid(&self) -> bool {
        has_extension(&self.name, ".esp") || has_extension(&self.name, ".esm")
    }

    /// 数据目录下是否存在对应的 .ghost 文件
    pub fn is_ghosted(&self, settings: &GameSettings) -> bool {
        settings
            .plugins_directory()
            .join(format!("{}.ghost", self.name))
            .exists()
    }

    /// 插件文件是否存在（普通形式或 ghost 形式）
    pub fn exists(&self, settings: &GameSettings) -> bool {
        settings.plugins_directory().join(&self.name).exists() || self.is_ghosted(settings)
    }

    /// 磁盘上的实际路径（ghost 时带 ".ghost" 后缀）
    pub fn resolved_path(&self, settings: &GameSettings) -> PathBuf {
        if self.is_ghosted(settings) {
            settings
                .plugins_directory()
                .join(format!("{}.ghost", self.name))
        } else {
            settings.plugins_directory().join(&self.name)
        }
    }

    /// 头部是否标记为主文件
    ///
    /// 文件不存在时按普通插件处理。
    pub fn is_master_file(&self, settings: &GameSettings) -> Result<bool> {
        if !self.exists(settings) {
            return Ok(false);
        }
        header::is_master(settings.id(), &self.resolved_path(settings))
    }

    /// 头部的主文件标志与扩展名是否矛盾
    pub fn is_false_flagged(&self, settings: &GameSettings) -> Result<bool> {
        let is_master = self.is_master_file(settings)?;
        Ok(is_master != has_extension(&self.name, ".esm"))
    }

    /// 头部声明的主文件列表
    pub fn masters(&self, settings: &GameSettings) -> Result<Vec<Plugin>> {
        let names = header::masters(settings.id(), &self.resolved_path(settings))?;
        Ok(names.iter().map(|n| Plugin::new(n)).collect())
    }

    /// 读取文件修改时间
    pub fn modification_time(&self, settings: &GameSettings) -> Result<SystemTime> {
        path_mtime(&self.resolved_path(settings))
    }

    /// 设置文件修改时间
    pub fn set_modification_time(
        &self,
        settings: &GameSettings,
        time: SystemTime,
    ) -> Result<()> {
        let path = self.resolved_path(settings);
        filetime::set_file_mtime(&path, FileTime::from_system_time(time))
            .map_err(|e| LoadOrderError::TimestampWriteFail { path, source: e })
    }

    /// 若处于 ghost 状态则重命名回正常文件名
    pub fn unghost(&self, settings: &GameSettings) -> Result<()> {
        if !self.is_ghosted(settings) {
            return Ok(());
        }
        let ghost_path = settings
            .plugins_directory()
            .join(format!("{}.ghost", self.name));
        let plain_path = settings.plugins_directory().join(&self.name);
        std::fs::rename(&ghost_path, &plain_path).map_err(|e| LoadOrderError::FileRenameFail {
            path: ghost_path,
            source: e,
        })
    }
}

impl PartialEq for Plugin {
    fn eq(&self, other: &Self) -> bool {
        self.name.to_lowercase() == other.name.to_lowercase()
    }
}

impl Eq for Plugin {}

impl Hash for Plugin {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.to_lowercase().hash(state);
    }
}

/// 读取任意路径（文件或目录）的修改时间
pub(crate) fn path_mtime(path: &Path) -> Result<SystemTime> {
    let metadata = path
        .metadata()
        .map_err(|e| LoadOrderError::TimestampReadFail {
            path: path.to_path_buf(),
            source: e,
        })?;
    metadata
        .modified()
        .map_err(|e| LoadOrderError::TimestampReadFail {
            path: path.to_path_buf(),
            source: e,
        })
}

/// 去掉结尾的 ".ghost"（大小写不敏感），不匹配时返回 None
fn strip_ghost_extension(filename: &str) -> Option<&str> {
    const GHOST: &[u8] = b".ghost";
    let bytes = filename.as_bytes();
    // 后缀字节全是 ASCII，匹配成功时切分点必然落在字符边界上
    if bytes.len() > GHOST.len() && bytes[bytes.len() - GHOST.len()..].eq_ignore_ascii_case(GHOST)
    {
        Some(&filename[..filename.len() - GHOST.len()])
    } else {
        None
    }
}

fn has_extension(name: &str, extension: &str) -> bool {
    let name = name.as_bytes();
    let extension = extension.as_bytes();
    name.len() > extension.len()
        && name[name.len() - extension.len()..].eq_ignore_ascii_case(extension)
}
