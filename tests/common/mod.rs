#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use filetime::FileTime;
use tempfile::TempDir;

use esp_loadorder::{GameId, GameSettings};

/// 一个临时的游戏目录布局
///
/// data/ 放插件，loadorder.txt 和 plugins.txt 与 data 平级。
pub struct GameFixture {
    _tmp_dir: TempDir,
    pub settings: GameSettings,
}

impl GameFixture {
    pub fn new(id: GameId) -> Self {
        let tmp_dir = TempDir::new().unwrap();
        let root = tmp_dir.path();
        let data_dir = root.join("Data");
        fs::create_dir(&data_dir).unwrap();

        let active_file = if id == GameId::Morrowind {
            root.join("Morrowind.ini")
        } else {
            root.join("plugins.txt")
        };

        let settings = GameSettings::new(
            id,
            data_dir,
            root.join("loadorder.txt"),
            active_file,
        );

        GameFixture {
            _tmp_dir: tmp_dir,
            settings,
        }
    }

    pub fn data_dir(&self) -> &Path {
        self.settings.plugins_directory()
    }

    /// 在数据目录写一个带真实头部的插件文件
    pub fn add_plugin(&self, name: &str, is_master: bool, masters: &[&str]) {
        let bytes = plugin_bytes(self.settings.id(), is_master, masters);
        fs::write(self.data_dir().join(name), bytes).unwrap();
    }

    /// 写插件并按 Unix 秒设置修改时间
    pub fn add_plugin_with_mtime(
        &self,
        name: &str,
        is_master: bool,
        masters: &[&str],
        unix_seconds: i64,
    ) {
        self.add_plugin(name, is_master, masters);
        self.set_mtime(name, unix_seconds);
    }

    pub fn set_mtime(&self, name: &str, unix_seconds: i64) {
        filetime::set_file_mtime(
            self.data_dir().join(name),
            FileTime::from_unix_time(unix_seconds, 0),
        )
        .unwrap();
    }

    pub fn mtime_of(&self, name: &str) -> SystemTime {
        self.data_dir().join(name).metadata().unwrap().modified().unwrap()
    }

    pub fn mtime_secs_of(&self, name: &str) -> u64 {
        self.mtime_of(name)
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
    }

    pub fn write_load_order_file(&self, names: &[&str]) {
        let mut content = String::new();
        for name in names {
            content.push_str(name);
            content.push('\n');
        }
        fs::write(self.settings.load_order_file(), content).unwrap();
    }

    /// 以 Windows-1252 编码写激活文件
    pub fn write_active_plugins_file(&self, names: &[&str]) {
        let mut bytes = Vec::new();
        if self.settings.id() == GameId::Morrowind {
            bytes.extend_from_slice(b"[Game Files]\n");
        }
        for (i, name) in names.iter().enumerate() {
            if self.settings.id() == GameId::Morrowind {
                bytes.extend_from_slice(format!("GameFile{}=", i).as_bytes());
            }
            let (encoded, _, _) = encoding_rs::WINDOWS_1252.encode(name);
            bytes.extend_from_slice(&encoded);
            bytes.push(b'\n');
        }
        fs::write(self.settings.active_plugins_file(), bytes).unwrap();
    }

    pub fn read_active_plugins_file(&self) -> Vec<u8> {
        fs::read(self.settings.active_plugins_file()).unwrap()
    }

    pub fn read_load_order_file(&self) -> String {
        fs::read_to_string(self.settings.load_order_file()).unwrap()
    }

    /// 把某个路径的修改时间拨到未来，制造"磁盘上更新"的状态
    pub fn touch_future(&self, path: &Path, seconds_ahead: u64) {
        let future = SystemTime::now() + Duration::from_secs(seconds_ahead);
        filetime::set_file_mtime(path, FileTime::from_system_time(future)).unwrap();
    }
}

/// 构造各游戏布局的插件头部字节
pub fn plugin_bytes(game_id: GameId, is_master: bool, masters: &[&str]) -> Vec<u8> {
    match game_id {
        GameId::Morrowind => tes3_plugin_bytes(is_master, masters),
        GameId::Oblivion => tes4_plugin_bytes(is_master, masters, 20),
        _ => tes4_plugin_bytes(is_master, masters, 24),
    }
}

fn tes4_plugin_bytes(is_master: bool, masters: &[&str], header_len: usize) -> Vec<u8> {
    let mut data_area = Vec::new();
    data_area.extend_from_slice(b"HEDR");
    data_area.extend_from_slice(&12u16.to_le_bytes());
    data_area.extend_from_slice(&1.0f32.to_le_bytes());
    data_area.extend_from_slice(&0u32.to_le_bytes());
    data_area.extend_from_slice(&0x800u32.to_le_bytes());

    for master in masters {
        let (encoded, _, _) = encoding_rs::WINDOWS_1252.encode(master);
        data_area.extend_from_slice(b"MAST");
        data_area.extend_from_slice(&((encoded.len() + 1) as u16).to_le_bytes());
        data_area.extend_from_slice(&encoded);
        data_area.push(0);
        data_area.extend_from_slice(b"DATA");
        data_area.extend_from_slice(&8u16.to_le_bytes());
        data_area.extend_from_slice(&0u64.to_le_bytes());
    }

    let flags: u32 = if is_master { 0x1 } else { 0x0 };
    let mut out = Vec::new();
    out.extend_from_slice(b"TES4");
    out.extend_from_slice(&(data_area.len() as u32).to_le_bytes());
    out.extend_from_slice(&flags.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    if header_len == 24 {
        out.extend_from_slice(&44u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
    }
    out.extend(data_area);
    out
}

fn tes3_plugin_bytes(is_master: bool, masters: &[&str]) -> Vec<u8> {
    let mut data_area = Vec::new();
    data_area.extend_from_slice(b"HEDR");
    data_area.extend_from_slice(&300u32.to_le_bytes());
    let mut hedr = vec![0u8; 300];
    hedr[0..4].copy_from_slice(&1.3f32.to_le_bytes());
    let file_type: u32 = if is_master { 1 } else { 0 };
    hedr[4..8].copy_from_slice(&file_type.to_le_bytes());
    data_area.extend_from_slice(&hedr);

    for master in masters {
        let (encoded, _, _) = encoding_rs::WINDOWS_1252.encode(master);
        data_area.extend_from_slice(b"MAST");
        data_area.extend_from_slice(&((encoded.len() + 1) as u32).to_le_bytes());
        data_area.extend_from_slice(&encoded);
        data_area.push(0);
        data_area.extend_from_slice(b"DATA");
        data_area.extend_from_slice(&8u32.to_le_bytes());
        data_area.extend_from_slice(&0u64.to_le_bytes());
    }

    let mut out = Vec::new();
    out.extend_from_slice(b"TES3");
    out.extend_from_slice(&(data_area.len() as u32).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend(data_area);
    out
}
