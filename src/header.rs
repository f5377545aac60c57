use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::encoding::windows_1252_to_utf8;
use crate::error::{LoadOrderError, Result};
use crate::game::GameId;

// 头部记录最多读取这么多字节，主文件列表总在这个范围内
const MAX_HEADER_SIZE: usize = 65536;

// 记录标志位定义
bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RecordFlags: u32 {
        const MASTER_FILE = 0x00000001;  // ESM标志
    }
}

/// 单个头部子记录
struct Subrecord {
    record_type: [u8; 4],
    data: Vec<u8>,
}

/// 解析后的插件头部记录
struct Header {
    flags: u32,
    subrecords: Vec<Subrecord>,
}

/// 查询插件是否为主文件
///
/// TES4 系游戏看头部记录标志的最低位；Morrowind 的头部标志不含该位，
/// 改看 HEDR 子记录中的文件类型字段（1 为 esm）。
/// 文件头无法识别时按普通插件处理，返回 false。
pub fn is_master(game_id: GameId, path: &Path) -> Result<bool> {
    let header = match parse_header(game_id, path)? {
        Some(h) => h,
        None => return Ok(false),
    };

    if game_id == GameId::Morrowind {
        let hedr = header
            .subrecords
            .iter()
            .find(|s| &s.record_type == b"HEDR");
        match hedr {
            Some(s) if s.data.len() >= 8 => {
                let mut cursor = Cursor::new(&s.data[4..8]);
                let file_type = cursor.read_u32::<LittleEndian>().unwrap_or(0);
                Ok(file_type == 1)
            }
            _ => Ok(false),
        }
    } else {
        let flags = RecordFlags::from_bits_truncate(header.flags);
        Ok(flags.contains(RecordFlags::MASTER_FILE))
    }
}

/// 读取插件头部声明的主文件列表
///
/// 逐个收集 MAST 子记录；名字在文件里是 Windows-1252 的 z 字符串。
pub fn masters(game_id: GameId, path: &Path) -> Result<Vec<String>> {
    let header = match parse_header(game_id, path)? {
        Some(h) => h,
        None => return Err(LoadOrderError::FileParseFail(path.to_path_buf())),
    };

    let mut names = Vec::new();
    for subrecord in &header.subrecords {
        if &subrecord.record_type == b"MAST" {
            let null_pos = subrecord
                .data
                .iter()
                .position(|&b| b == 0)
                .unwrap_or(subrecord.data.len());
            names.push(windows_1252_to_utf8(&subrecord.data[..null_pos]));
        }
    }
    Ok(names)
}

/// 解析头部记录，返回 None 表示文件开头不是可识别的插件头
fn parse_header(game_id: GameId, path: &Path) -> Result<Option<Header>> {
    let mut file = File::open(path).map_err(|e| LoadOrderError::FileReadFail {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut buffer = Vec::with_capacity(4096);
    file.by_ref()
        .take(MAX_HEADER_SIZE as u64)
        .read_to_end(&mut buffer)
        .map_err(|e| LoadOrderError::FileReadFail {
            path: path.to_path_buf(),
            source: e,
        })?;

    let header_len = record_header_length(game_id);
    if buffer.len() < header_len {
        return Ok(None);
    }

    let mut cursor = Cursor::new(&buffer[..]);
    let mut record_type = [0u8; 4];
    cursor.read_exact(&mut record_type).ok();

    let expected: &[u8; 4] = if game_id == GameId::Morrowind {
        b"TES3"
    } else {
        b"TES4"
    };
    if &record_type != expected {
        return Ok(None);
    }

    let data_size = cursor
        .read_u32::<LittleEndian>()
        .map_err(|_| LoadOrderError::FileParseFail(path.to_path_buf()))?;

    // Morrowind 的记录头是 类型+大小+未知+标志，TES4 系的标志紧跟大小
    let flags = if game_id == GameId::Morrowind {
        let _unknown = cursor.read_u32::<LittleEndian>().unwrap_or(0);
        cursor.read_u32::<LittleEndian>().unwrap_or(0)
    } else {
        cursor.read_u32::<LittleEndian>().unwrap_or(0)
    };

    let data_start = header_len;
    let data_end = (data_start + data_size as usize).min(buffer.len());
    let subrecords = parse_subrecords(&buffer[data_start..data_end], game_id)
        .ok_or_else(|| LoadOrderError::FileParseFail(path.to_path_buf()))?;

    Ok(Some(Header { flags, subrecords }))
}

/// 扫描头部记录的数据区
///
/// Morrowind 的子记录长度字段是 u32，TES4 系是 u16。
fn parse_subrecords(data: &[u8], game_id: GameId) -> Option<Vec<Subrecord>> {
    let mut subrecords = Vec::new();
    let mut cursor = Cursor::new(data);

    while (cursor.position() as usize) + subrecord_header_length(game_id) <= data.len() {
        let mut record_type = [0u8; 4];
        cursor.read_exact(&mut record_type).ok()?;

        let size = if game_id == GameId::Morrowind {
            cursor.read_u32::<LittleEndian>().ok()? as usize
        } else {
            cursor.read_u16::<LittleEndian>().ok()? as usize
        };

        let start = cursor.position() as usize;
        if start + size > data.len() {
            // 截断的数据区：MAST 条目总在前部，已收集的部分仍可用
            break;
        }

        subrecords.push(Subrecord {
            record_type,
            data: data[start..start + size].to_vec(),
        });
        cursor.set_position((start + size) as u64);
    }

    Some(subrecords)
}

fn record_header_length(game_id: GameId) -> usize {
    match game_id {
        GameId::Morrowind => 16,
        GameId::Oblivion => 20,
        GameId::Skyrim | GameId::Fallout3 | GameId::FalloutNV | GameId::Fallout4 => 24,
    }
}

fn subrecord_header_length(game_id: GameId) -> usize {
    match game_id {
        GameId::Morrowind => 8,
        _ => 6,
    }
}
