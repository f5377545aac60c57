mod common;

use common::GameFixture;
use esp_loadorder::{GameContext, GameId};

fn context(fixture: &GameFixture) -> GameContext {
    GameContext::new(fixture.settings.clone())
}

#[test]
fn load_order_is_populated_lazily() {
    let fixture = GameFixture::new(GameId::Oblivion);
    fixture.add_plugin_with_mtime("Oblivion.esm", true, &[], 100);
    fixture.add_plugin_with_mtime("Blank.esp", false, &[], 200);

    let mut ctx = context(&fixture);
    let order = ctx.load_order().unwrap();
    assert_eq!(order, vec!["Oblivion.esm", "Blank.esp"]);
}

#[test]
fn plugin_position_and_plugin_at_agree() {
    let fixture = GameFixture::new(GameId::Oblivion);
    fixture.add_plugin_with_mtime("Oblivion.esm", true, &[], 100);
    fixture.add_plugin_with_mtime("Blank.esp", false, &[], 200);

    let mut ctx = context(&fixture);
    assert_eq!(ctx.plugin_position("blank.ESP").unwrap(), 1);
    assert_eq!(ctx.plugin_at(1).unwrap(), "Blank.esp");

    let err = ctx.plugin_position("missing.esp").unwrap_err();
    assert_eq!(err.code(), 6);

    let err = ctx.plugin_at(99).unwrap_err();
    assert_eq!(err.code(), 12);
}

#[test]
fn set_load_order_replaces_and_persists() {
    let fixture = GameFixture::new(GameId::Oblivion);
    fixture.add_plugin_with_mtime("Oblivion.esm", true, &[], 100);
    fixture.add_plugin_with_mtime("A.esp", false, &[], 200);
    fixture.add_plugin_with_mtime("B.esp", false, &[], 300);

    let mut ctx = context(&fixture);
    ctx.set_load_order(&["Oblivion.esm", "B.esp", "A.esp"]).unwrap();

    // 时间戳制：保存后时间戳应编码新顺序
    assert!(fixture.mtime_secs_of("B.esp") < fixture.mtime_secs_of("A.esp"));

    let mut ctx2 = context(&fixture);
    assert_eq!(
        ctx2.load_order().unwrap(),
        vec!["Oblivion.esm", "B.esp", "A.esp"]
    );
}

#[test]
fn set_load_order_rejects_invalid_lists() {
    let fixture = GameFixture::new(GameId::Oblivion);
    fixture.add_plugin("Oblivion.esm", true, &[]);
    fixture.add_plugin("Blank.esp", false, &[]);

    let mut ctx = context(&fixture);

    let err = ctx.set_load_order(&[]).unwrap_err();
    assert_eq!(err.code(), 12);

    // 重复项
    let err = ctx
        .set_load_order(&["Oblivion.esm", "Blank.esp", "blank.esp"])
        .unwrap_err();
    assert_eq!(err.code(), 12);

    // 缺失的插件
    let err = ctx
        .set_load_order(&["Oblivion.esm", "missing.esp"])
        .unwrap_err();
    assert_eq!(err.code(), 12);
}

#[test]
fn set_plugin_position_validates_the_result() {
    let fixture = GameFixture::new(GameId::Oblivion);
    fixture.add_plugin_with_mtime("Oblivion.esm", true, &[], 100);
    fixture.add_plugin_with_mtime("Blank.esm", true, &[], 150);
    fixture.add_plugin_with_mtime("Blank.esp", false, &[], 200);

    let mut ctx = context(&fixture);

    // 把普通插件挪到主文件前面应被拒绝，原顺序保留
    let err = ctx.set_plugin_position("Blank.esp", 0).unwrap_err();
    assert_eq!(err.code(), 12);
    assert_eq!(
        ctx.load_order().unwrap(),
        vec!["Oblivion.esm", "Blank.esm", "Blank.esp"]
    );

    // 主文件区内部移动合法
    ctx.set_plugin_position("Blank.esm", 1).unwrap();
    assert_eq!(ctx.plugin_position("Blank.esm").unwrap(), 1);
}

#[test]
fn set_plugin_active_updates_the_file() {
    let fixture = GameFixture::new(GameId::Oblivion);
    fixture.add_plugin("Oblivion.esm", true, &[]);
    fixture.add_plugin("Blank.esp", false, &[]);
    fixture.write_active_plugins_file(&["Oblivion.esm"]);

    let mut ctx = context(&fixture);
    assert!(!ctx.is_plugin_active("Blank.esp").unwrap());

    ctx.set_plugin_active("Blank.esp", true).unwrap();
    assert!(ctx.is_plugin_active("Blank.esp").unwrap());

    let text = String::from_utf8(fixture.read_active_plugins_file()).unwrap();
    assert!(text.contains("Blank.esp"));
    assert!(text.contains("Oblivion.esm"));

    ctx.set_plugin_active("Blank.esp", false).unwrap();
    assert!(!ctx.is_plugin_active("Blank.esp").unwrap());
    let text = String::from_utf8(fixture.read_active_plugins_file()).unwrap();
    assert!(!text.contains("Blank.esp"));
}

#[test]
fn activating_a_ghosted_plugin_unghosts_it() {
    let fixture = GameFixture::new(GameId::Oblivion);
    fixture.add_plugin("Oblivion.esm", true, &[]);
    fixture.add_plugin("Hidden.esp.ghost", false, &[]);
    fixture.write_active_plugins_file(&["Oblivion.esm"]);

    let mut ctx = context(&fixture);
    ctx.set_plugin_active("Hidden.esp", true).unwrap();

    assert!(fixture.data_dir().join("Hidden.esp").exists());
    assert!(!fixture.data_dir().join("Hidden.esp.ghost").exists());
    assert!(ctx.is_plugin_active("Hidden.esp").unwrap());
}

#[test]
fn deactivating_a_ghosted_plugin_also_unghosts_it() {
    // 停用路径同样先恢复 ghost 文件，和激活路径一致
    let fixture = GameFixture::new(GameId::Oblivion);
    fixture.add_plugin("Oblivion.esm", true, &[]);
    fixture.add_plugin("Hidden.esp.ghost", false, &[]);
    fixture.write_active_plugins_file(&["Oblivion.esm"]);

    let mut ctx = context(&fixture);
    ctx.set_plugin_active("Hidden.esp", false).unwrap();

    assert!(fixture.data_dir().join("Hidden.esp").exists());
    assert!(!fixture.data_dir().join("Hidden.esp.ghost").exists());
    assert!(!ctx.is_plugin_active("Hidden.esp").unwrap());
}

#[test]
fn activating_a_missing_plugin_fails() {
    let fixture = GameFixture::new(GameId::Oblivion);
    fixture.add_plugin("Oblivion.esm", true, &[]);
    fixture.write_active_plugins_file(&["Oblivion.esm"]);

    let mut ctx = context(&fixture);
    let err = ctx.set_plugin_active("missing.esp", true).unwrap_err();
    assert_eq!(err.code(), 6);
}

#[test]
fn set_active_plugins_replaces_the_set() {
    let fixture = GameFixture::new(GameId::Oblivion);
    fixture.add_plugin("Oblivion.esm", true, &[]);
    fixture.add_plugin("A.esp", false, &[]);
    fixture.add_plugin("B.esp", false, &[]);
    fixture.write_active_plugins_file(&["Oblivion.esm", "A.esp"]);

    let mut ctx = context(&fixture);
    ctx.set_active_plugins(&["Oblivion.esm", "B.esp"]).unwrap();

    let mut current = ctx.active_plugins().unwrap();
    current.sort();
    assert_eq!(current, vec!["B.esp", "Oblivion.esm"]);

    // 重复项被拒绝
    let err = ctx
        .set_active_plugins(&["A.esp", "a.ESP"])
        .unwrap_err();
    assert_eq!(err.code(), 12);

    // 缺失的插件被拒绝
    let err = ctx.set_active_plugins(&["missing.esp"]).unwrap_err();
    assert_eq!(err.code(), 6);
}

#[test]
fn skyrim_context_keeps_loadorder_and_plugins_txt_in_step() {
    let fixture = GameFixture::new(GameId::Skyrim);
    fixture.add_plugin("Skyrim.esm", true, &[]);
    fixture.add_plugin("Blank.esp", false, &["Skyrim.esm"]);
    fixture.write_active_plugins_file(&["Skyrim.esm", "Blank.esp"]);

    let mut ctx = context(&fixture);
    ctx.set_load_order(&["Skyrim.esm", "Blank.esp"]).unwrap();

    // loadorder.txt 完整记录顺序
    let lines = fixture.read_load_order_file();
    assert_eq!(lines.lines().collect::<Vec<_>>(), vec!["Skyrim.esm", "Blank.esp"]);

    // plugins.txt 不含硬编码的主文件
    let text = String::from_utf8(fixture.read_active_plugins_file()).unwrap();
    assert_eq!(text.lines().collect::<Vec<_>>(), vec!["Blank.esp"]);
}

#[test]
fn external_changes_are_picked_up_on_next_query() {
    let fixture = GameFixture::new(GameId::Oblivion);
    fixture.add_plugin("Oblivion.esm", true, &[]);
    fixture.add_plugin("Blank.esp", false, &[]);
    fixture.write_active_plugins_file(&["Oblivion.esm"]);

    let mut ctx = context(&fixture);
    assert!(!ctx.is_plugin_active("Blank.esp").unwrap());

    // 外部工具改写激活文件
    fixture.write_active_plugins_file(&["Oblivion.esm", "Blank.esp"]);
    fixture.touch_future(fixture.settings.active_plugins_file(), 120);

    assert!(ctx.is_plugin_active("Blank.esp").unwrap());
}
