use std::path::PathBuf;
use thiserror::Error;

/// 库内统一的 Result 别名
pub type Result<T> = std::result::Result<T, LoadOrderError>;

/// 自定义错误类型
///
/// 每个变体对应一个稳定的整数错误码（见 [`LoadOrderError::code`]），
/// 宿主程序可以依赖这些数值做跨版本的错误分派。
#[derive(Error, Debug)]
pub enum LoadOrderError {
    /// 插件名无法用 Windows-1252 表示（警告级，保存仍会完成）
    #[error("\"{0}\" cannot be encoded in Windows-1252")]
    BadFilename(String),

    /// loadorder.txt 与 plugins.txt 的共有条目顺序不一致（警告级）
    #[error("The load order in the active plugins file differs from the load order file")]
    LoadOrderMismatch,

    /// 读取文件失败
    #[error("{path:?} could not be read: {source}")]
    FileReadFail {
        path: PathBuf,
        source: std::io::Error,
    },

    /// 打开或写入文件失败
    #[error("{path:?} cannot be written to: {source}")]
    FileWriteFail {
        path: PathBuf,
        source: std::io::Error,
    },

    /// 文件不是有效的 UTF-8
    #[error("{0:?} is not encoded in valid UTF-8")]
    FileNotUtf8(PathBuf),

    /// 找不到插件文件
    #[error("\"{0}\" cannot be found")]
    FileNotFound(String),

    /// 重命名文件失败（ghost / unghost）
    #[error("{path:?} could not be renamed: {source}")]
    FileRenameFail {
        path: PathBuf,
        source: std::io::Error,
    },

    /// 读取文件或目录的修改时间失败
    #[error("the modification time of {path:?} could not be read: {source}")]
    TimestampReadFail {
        path: PathBuf,
        source: std::io::Error,
    },

    /// 设置文件修改时间失败
    #[error("the modification time of {path:?} could not be set: {source}")]
    TimestampWriteFail {
        path: PathBuf,
        source: std::io::Error,
    },

    /// 文件无法打开读取或结构无法解析
    #[error("{0:?} could not be parsed")]
    FileParseFail(PathBuf),

    /// 调用方传入的参数非法（例如会产生无效的加载顺序）
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),
}

impl LoadOrderError {
    /// 返回稳定的整数错误码
    ///
    /// 0 保留给"成功"，这里从 1 起编号。数值一经发布不再变动。
    pub fn code(&self) -> u32 {
        match self {
            LoadOrderError::BadFilename(_) => 1,
            LoadOrderError::LoadOrderMismatch => 2,
            LoadOrderError::FileReadFail { .. } => 3,
            LoadOrderError::FileWriteFail { .. } => 4,
            LoadOrderError::FileNotUtf8(_) => 5,
            LoadOrderError::FileNotFound(_) => 6,
            LoadOrderError::FileRenameFail { .. } => 7,
            LoadOrderError::TimestampReadFail { .. } => 8,
            LoadOrderError::TimestampWriteFail { .. } => 9,
            LoadOrderError::FileParseFail(_) => 10,
            LoadOrderError::InvalidArgs(_) => 12,
        }
    }

    /// 是否为警告级别（操作本身已经完成）
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            LoadOrderError::BadFilename(_) | LoadOrderError::LoadOrderMismatch
        )
    }
}
