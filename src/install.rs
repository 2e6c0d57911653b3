//! The U-Boot installation wizard: pick a board among the compatible ones, confirm, write, reboot.

use tracing::{info, warn};

use crate::boards::{self, BoardQuery};
use crate::config::Settings;
use crate::dialog::{MenuItems, Presenter};
use crate::hardware::HardwareInfo;
use crate::sdcard::{BootTarget, BOOTLOADER_SECTOR, SECTOR_SIZE};

pub const CANCEL: &str = "cancel";
pub const PROCEED: &str = "proceed";

const SELECT_TEXT: &str = "\
Please select your device from the list below. This list has been already partially reduced by \
weeding out some of the incompatible devices (based on the automatically detected Allwinner SoC \
variant, DRAM size and bus width).

\\Zb\\Z1Warning: if you don't see the exact name of your device in the list, at least please \
don't try to make some random choice. Using incorrect settings is a bad idea, in the worst case \
this may even damage the hardware.";

const NO_MATCH_TEXT: &str =
    "Looks like your hardware can't possibly match any of the supported devices.";

const NO_OS_TEXT: &str = "\
After reboot, the installed u-boot is expected to search for the '/boot/boot.scr' file in the \
first ext4 formatted partition of the SD card to find the information about the linux kernel to \
load. It appears that this particular SD card still does not have a complete linux system \
installed.\n\n";

const NO_WAY_BACK_TEXT: &str = "\
\\Zb\\Z1Warning: there is no way back and this installation wizard will be replaced by the newly \
installed u-boot. Be sure to make the right choice here:\n";

/// How the wizard ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The board catalog could not be read
    CatalogUnavailable,
    /// Nothing in the catalog is compatible with the hardware
    NoMatchingBoards,
    /// The user backed out
    Cancelled,
    /// No binary was shipped for the selected board
    MissingBinary(String),
    /// Writing the bootloader failed; the user has been told
    Failed,
    /// The bootloader has been written and a reboot requested (even if the request failed)
    Rebooting,
}

fn confirmation_text(settings: &Settings, board_name: &str) -> String {
    let binary = settings.binary_path(board_name);
    let mut text = format!(
        "We are about to install the u-boot bootloader, compiled for the '{board_name}' board. \
         The installation is done to the SD card by executing the following commands:\n\
         \n\
         \\Zb\\Z6# dd if={} \\\n     of={} bs={SECTOR_SIZE} seek={BOOTLOADER_SECTOR}\n\
         # sync && reboot\n\
         \n\\Zn",
        binary.display(),
        settings.target_device.display(),
    );

    if !settings.boot_script.exists() {
        text += NO_OS_TEXT;
    }

    text += NO_WAY_BACK_TEXT;
    text
}

fn confirmation_items(board_name: &str) -> MenuItems {
    MenuItems::from([
        (
            CANCEL.to_string(),
            "Cancel and return to the main menu".to_string(),
        ),
        (
            PROCEED.to_string(),
            format!("Yes, please do it. I'm sure that my hardware is '{board_name}'"),
        ),
    ])
}

/// Run the installation wizard.
///
/// Errors are only returned if the user could not be talked to at all; every other problem is
/// shown to the user and reported through the [`Outcome`]. After [`Outcome::Rebooting`] the caller
/// should wait for the system to go down.
pub fn install_uboot(
    settings: &Settings,
    hardware: &HardwareInfo,
    ui: &mut impl Presenter,
    target: &mut impl BootTarget,
) -> anyhow::Result<Outcome> {
    let title = &hardware.summary;
    let catalog = settings.catalog_path();

    let boards = match boards::find_matches(&catalog, &BoardQuery::from(hardware)) {
        Ok(boards) => boards,
        Err(error) => {
            ui.notify(title, &format!("Error: {error}"))?;
            return Ok(Outcome::CatalogUnavailable);
        }
    };

    if boards.is_empty() {
        ui.notify(title, NO_MATCH_TEXT)?;
        return Ok(Outcome::NoMatchingBoards);
    }

    let Some(board_name) = ui.choose(title, SELECT_TEXT, &boards, None)? else {
        return Ok(Outcome::Cancelled);
    };

    let binary = settings.binary_path(&board_name);
    if !binary.exists() {
        warn!(path = %binary.display(), "no U-Boot binary for the selected board");
        return Ok(Outcome::MissingBinary(board_name));
    }

    let text = confirmation_text(settings, &board_name);
    match ui
        .choose(title, &text, &confirmation_items(&board_name), None)?
        .as_deref()
    {
        Some(PROCEED) => (),
        _ => return Ok(Outcome::Cancelled),
    }

    info!(board = %board_name, "installing U-Boot");
    if let Err(error) = target.write_bootloader(&binary) {
        warn!("installation failed: {error:#}");
        ui.notify(title, &format!("Error: installation failed:\n\n{error:#}"))?;
        return Ok(Outcome::Failed);
    }

    // The card holds the new U-Boot from here on, so never go back to the menu
    if let Err(error) = target.sync() {
        warn!("sync failed: {error:#}");
    }
    if let Err(error) = target.reboot() {
        warn!("reboot request failed: {error:#}");
    }

    Ok(Outcome::Rebooting)
}

#[test]
fn test_confirmation_text() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = Settings {
        uboot_dir: "/mnt/u-boot".into(),
        boot_script: dir.path().join("boot.scr"),
        ..Default::default()
    };

    let text = confirmation_text(&settings, "Cubietruck");
    assert!(text.contains("compiled for the 'Cubietruck' board"));
    assert!(text.contains(
        "# dd if=/mnt/u-boot/u-boot-sunxi-with-spl-Cubietruck.bin \\\n     of=/dev/mmcblk0 bs=1024 seek=8\n"
    ));
    assert!(text.contains("does not have a complete linux system"));
    assert!(text.ends_with("Be sure to make the right choice here:\n"));

    std::fs::write(&settings.boot_script, "").unwrap();
    let text = confirmation_text(&settings, "Cubietruck");
    assert!(!text.contains("does not have a complete linux system"));

    settings.target_device = "/dev/sdb".into();
    assert!(confirmation_text(&settings, "Cubietruck").contains("of=/dev/sdb bs=1024"));
}

#[test]
fn test_confirmation_items() {
    let items = confirmation_items("board-x");
    assert_eq!(items.keys().collect::<Vec<_>>(), [CANCEL, PROCEED]);
    assert!(items[PROCEED].contains("'board-x'"));
}
