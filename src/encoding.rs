use std::fs;
use std::path::Path;

use crate::error::{LoadOrderError, Result};

/// 把 Windows-1252 字节解码为 UTF-8 字符串
///
/// Windows-1252 的 256 个码位全部有映射，解码不会失败。
pub fn windows_1252_to_utf8(data: &[u8]) -> String {
    let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(data);
    decoded.into_owned()
}

/// 把 UTF-8 字符串编码为 Windows-1252 字节
///
/// 遇到 Windows-1252 无法表示的字符时返回 [`LoadOrderError::BadFilename`]，
/// 由调用方决定是跳过该条目还是中止。
pub fn utf8_to_windows_1252(text: &str) -> Result<Vec<u8>> {
    let (encoded, _, had_errors) = encoding_rs::WINDOWS_1252.encode(text);
    if had_errors {
        return Err(LoadOrderError::BadFilename(text.to_string()));
    }
    Ok(encoded.into_owned())
}

/// 检查文件内容是否为有效的 UTF-8
pub fn is_valid_utf8_file(path: &Path) -> Result<bool> {
    let data = fs::read(path).map_err(|e| LoadOrderError::FileReadFail {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(std::str::from_utf8(&data).is_ok())
}
