//! Drive the wizard end to end with a scripted user and a recording SD card.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use sunxi_bootsetup::{
    config::Settings,
    dialog::{MenuItems, Presenter},
    hardware::{HardwareInfo, SocType},
    install::{install_uboot, Outcome, CANCEL, PROCEED},
    menu::{run_main_menu, MenuExit, INSTALL, ROOT_SHELL},
    sdcard::BootTarget,
};
use tempfile::TempDir;

/// What the fake user was shown
#[derive(Debug, Clone, PartialEq, Eq)]
enum Shown {
    Menu { keys: Vec<String> },
    Message { title: String, text: String },
}

/// A user who answers every menu from a script. An answer of `None` backs out.
#[derive(Debug, Default)]
struct ScriptedUser {
    answers: VecDeque<Option<&'static str>>,
    shown: Vec<Shown>,
}

impl ScriptedUser {
    fn answering(answers: &[Option<&'static str>]) -> Self {
        Self {
            answers: answers.iter().copied().collect(),
            shown: Vec::new(),
        }
    }

    fn menus_shown(&self) -> usize {
        self.shown
            .iter()
            .filter(|shown| matches!(shown, Shown::Menu { .. }))
            .count()
    }
}

impl Presenter for ScriptedUser {
    fn choose(
        &mut self,
        _title: &str,
        _text: &str,
        items: &MenuItems,
        _default_key: Option<&str>,
    ) -> anyhow::Result<Option<String>> {
        self.shown.push(Shown::Menu {
            keys: items.keys().cloned().collect(),
        });
        let answer = self
            .answers
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("user has run out of answers"))?;
        Ok(answer
            .filter(|key| items.contains_key(*key))
            .map(String::from))
    }

    fn notify(&mut self, title: &str, text: &str) -> anyhow::Result<()> {
        self.shown.push(Shown::Message {
            title: title.into(),
            text: text.into(),
        });
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Write(PathBuf),
    Sync,
    Reboot,
}

#[derive(Debug, Default)]
struct RecordingCard {
    calls: Vec<Call>,
    fail_write: bool,
    fail_reboot: bool,
}

impl BootTarget for RecordingCard {
    fn write_bootloader(&mut self, image: &Path) -> anyhow::Result<()> {
        self.calls.push(Call::Write(image.to_path_buf()));
        anyhow::ensure!(!self.fail_write, "No medium found");
        Ok(())
    }

    fn sync(&mut self) -> anyhow::Result<()> {
        self.calls.push(Call::Sync);
        Ok(())
    }

    fn reboot(&mut self) -> anyhow::Result<()> {
        self.calls.push(Call::Reboot);
        anyhow::ensure!(!self.fail_reboot, "reboot: not found");
        Ok(())
    }
}

fn sun5i_512() -> HardwareInfo {
    HardwareInfo {
        soc_type: Some(SocType::Sun5i),
        soc_name: Some("Allwinner A13"),
        dram_clock: Some(408),
        mbus_clock: None,
        dram_size: Some(512),
        dram_bus_width: Some(16),
        summary: "SoC: Allwinner A13, DRAM: 512 MiB, 16-bit, 408 MHz".into(),
    }
}

/// An U-Boot directory with a catalog and binaries for the given boards
fn uboot_dir(catalog: Option<&str>, binaries: &[&str]) -> (TempDir, Settings) {
    let dir = tempfile::tempdir().unwrap();
    let settings = Settings {
        uboot_dir: dir.path().join("u-boot-binaries"),
        boot_script: dir.path().join("boot/boot.scr"),
        target_device: "/dev/mmcblk0".into(),
        ..Default::default()
    };

    fs::create_dir(&settings.uboot_dir).unwrap();
    fs::write(settings.description_path(), "u-boot for sunxi").unwrap();
    if let Some(catalog) = catalog {
        fs::write(settings.catalog_path(), catalog).unwrap();
    }
    for board in binaries {
        fs::write(settings.binary_path(board), [0xEAu8; 32]).unwrap();
    }

    (dir, settings)
}

const CATALOG: &str = "\
# name     soc    dram
board-x    sun5i  512MiB (16-bit)
board-y    sun5i  256MiB (16-bit)
board-z    sun4i  512MiB (16-bit)
";

#[test]
fn test_install_selected_board() {
    let (_dir, settings) = uboot_dir(Some(CATALOG), &["board-x"]);
    let mut user = ScriptedUser::answering(&[Some("board-x"), Some(PROCEED)]);
    let mut card = RecordingCard::default();

    let outcome = install_uboot(&settings, &sun5i_512(), &mut user, &mut card).unwrap();

    assert_eq!(outcome, Outcome::Rebooting);
    assert_eq!(
        card.calls,
        [
            Call::Write(
                settings
                    .uboot_dir
                    .join("u-boot-sunxi-with-spl-board-x.bin")
            ),
            Call::Sync,
            Call::Reboot,
        ]
    );
    assert_eq!(
        user.shown,
        [
            Shown::Menu {
                keys: vec!["board-x".into()]
            },
            Shown::Menu {
                keys: vec![CANCEL.into(), PROCEED.into()]
            },
        ]
    );
}

#[test]
fn test_missing_catalog() {
    let (_dir, settings) = uboot_dir(None, &[]);
    let mut user = ScriptedUser::default();
    let mut card = RecordingCard::default();

    let outcome = install_uboot(&settings, &sun5i_512(), &mut user, &mut card).unwrap();

    assert_eq!(outcome, Outcome::CatalogUnavailable);
    assert_eq!(user.menus_shown(), 0);
    assert_eq!(
        user.shown,
        [Shown::Message {
            title: sun5i_512().summary,
            text: format!("Error: can't load '{}'", settings.catalog_path().display()),
        }]
    );
    assert!(card.calls.is_empty());
}

#[test]
fn test_no_compatible_boards() {
    let (_dir, settings) = uboot_dir(Some(CATALOG), &[]);
    let hardware = HardwareInfo {
        soc_type: Some(SocType::Sun7i),
        ..sun5i_512()
    };
    let mut user = ScriptedUser::default();
    let mut card = RecordingCard::default();

    let outcome = install_uboot(&settings, &hardware, &mut user, &mut card).unwrap();

    assert_eq!(outcome, Outcome::NoMatchingBoards);
    assert_eq!(user.menus_shown(), 0);
    assert!(matches!(&user.shown[..], [Shown::Message { text, .. }]
        if text.contains("can't possibly match any of the supported devices")));
}

#[test]
fn test_unknown_hardware_offers_everything() {
    let (_dir, settings) = uboot_dir(Some(CATALOG), &[]);
    let mut user = ScriptedUser::answering(&[None]);
    let mut card = RecordingCard::default();

    let outcome =
        install_uboot(&settings, &HardwareInfo::default(), &mut user, &mut card).unwrap();

    assert_eq!(outcome, Outcome::Cancelled);
    assert_eq!(
        user.shown,
        [Shown::Menu {
            keys: vec!["board-x".into(), "board-y".into(), "board-z".into()]
        }]
    );
}

#[test]
fn test_missing_binary_returns_silently() {
    let (_dir, settings) = uboot_dir(Some(CATALOG), &[]);
    let mut user = ScriptedUser::answering(&[Some("board-x")]);
    let mut card = RecordingCard::default();

    let outcome = install_uboot(&settings, &sun5i_512(), &mut user, &mut card).unwrap();

    assert_eq!(outcome, Outcome::MissingBinary("board-x".into()));
    assert_eq!(user.shown.len(), 1);
    assert!(card.calls.is_empty());
}

#[test]
fn test_cancel_confirmation() {
    let (_dir, settings) = uboot_dir(Some(CATALOG), &["board-x"]);
    for answer in [Some(CANCEL), None] {
        let mut user = ScriptedUser::answering(&[Some("board-x"), answer]);
        let mut card = RecordingCard::default();

        let outcome = install_uboot(&settings, &sun5i_512(), &mut user, &mut card).unwrap();

        assert_eq!(outcome, Outcome::Cancelled);
        assert!(card.calls.is_empty());
    }
}

#[test]
fn test_write_failure_is_reported() {
    let (_dir, settings) = uboot_dir(Some(CATALOG), &["board-x"]);
    let mut user = ScriptedUser::answering(&[Some("board-x"), Some(PROCEED)]);
    let mut card = RecordingCard {
        fail_write: true,
        ..Default::default()
    };

    let outcome = install_uboot(&settings, &sun5i_512(), &mut user, &mut card).unwrap();

    assert_eq!(outcome, Outcome::Failed);
    assert_eq!(card.calls.len(), 1);
    assert!(matches!(user.shown.last(), Some(Shown::Message { text, .. })
        if text.contains("No medium found")));
}

#[test]
fn test_reboot_failure_still_ends_the_wizard() {
    let (_dir, settings) = uboot_dir(Some(CATALOG), &["board-x"]);
    let mut user = ScriptedUser::answering(&[
        Some(INSTALL),
        Some("board-x"),
        Some(PROCEED),
        Some(INSTALL),
        Some("board-x"),
        Some(PROCEED),
        Some(ROOT_SHELL),
    ]);
    let mut card = RecordingCard {
        fail_reboot: true,
        ..Default::default()
    };

    let exit = run_main_menu(&settings, &sun5i_512(), &mut user, &mut card).unwrap();

    assert_eq!(exit, MenuExit::Rebooting);
    assert_eq!(
        card.calls,
        [
            Call::Write(settings.binary_path("board-x")),
            Call::Sync,
            Call::Reboot,
        ]
    );
    assert_eq!(user.menus_shown(), 3);
    assert!(!user
        .shown
        .iter()
        .any(|shown| matches!(shown, Shown::Message { .. })));
}

#[test]
fn test_main_menu_returns_after_cancel() {
    let (_dir, settings) = uboot_dir(Some(CATALOG), &["board-x"]);
    let mut user = ScriptedUser::answering(&[
        Some(INSTALL),
        Some("board-x"),
        Some(CANCEL),
        Some("bogus"),
        Some(INSTALL),
        Some("board-x"),
        Some(PROCEED),
    ]);
    let mut card = RecordingCard::default();

    let exit = run_main_menu(&settings, &sun5i_512(), &mut user, &mut card).unwrap();

    assert_eq!(exit, MenuExit::Rebooting);
    assert_eq!(user.menus_shown(), 7);
    assert_eq!(card.calls.len(), 3);
}

#[test]
fn test_main_menu_root_shell() {
    let (_dir, settings) = uboot_dir(None, &[]);
    let mut user = ScriptedUser::answering(&[Some(INSTALL), Some(ROOT_SHELL)]);
    let mut card = RecordingCard::default();

    let exit = run_main_menu(&settings, &sun5i_512(), &mut user, &mut card).unwrap();

    // The missing catalog is reported, then the main menu comes back
    assert_eq!(exit, MenuExit::RootShell);
    assert_eq!(user.menus_shown(), 2);
    assert!(matches!(user.shown[1], Shown::Message { .. }));
}

#[test]
fn test_main_menu_without_binaries() {
    let dir = tempfile::tempdir().unwrap();
    let settings = Settings {
        uboot_dir: dir.path().join("nowhere"),
        ..Default::default()
    };
    // Installing isn't on offer, so this answer is as good as a cancel
    let mut user = ScriptedUser::answering(&[Some(INSTALL), Some(ROOT_SHELL)]);
    let mut card = RecordingCard::default();

    let exit = run_main_menu(&settings, &sun5i_512(), &mut user, &mut card).unwrap();

    assert_eq!(exit, MenuExit::RootShell);
    assert_eq!(
        user.shown,
        [
            Shown::Menu {
                keys: vec![ROOT_SHELL.into()]
            },
            Shown::Menu {
                keys: vec![ROOT_SHELL.into()]
            },
        ]
    );
}
