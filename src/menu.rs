//! The main menu shown when the setup image boots.

use std::fs;

use tracing::info;

use crate::config::Settings;
use crate::dialog::{MenuItems, Presenter};
use crate::hardware::{HardwareInfo, SocType};
use crate::install::{self, Outcome};
use crate::sdcard::BootTarget;

pub const INSTALL: &str = "1";
pub const ROOT_SHELL: &str = "2";

const LCD_TEXT: &str = "\
Right now your device is running in a 'lowest common denominator' hardware configuration with \
just a minimal set of peripherals enabled: SD card, UART serial console, HDMI video output and \
partial USB host support. The CPU and DRAM clock speeds are also much lower than normal.";

const USB_A10_A20_TEXT: &str = "\
If there are \\Zb\\Z6USB host ports\\Zn in your device, then some of them might be already \
functional. You can try to plug a USB keyboard and use it for navigating in this menu. Allwinner \
A10/A20 devices typically use PH03/PH06 GPIO pins to control the switches, which enable/disable \
the USB power. But some of the A10/A20 devices may be still using different GPIO pins. If none of \
the USB host ports works, please also consider trying a powered USB hub before giving up.";

const USB_A13_A10S_TEXT: &str = "\
If you have \\Zb\\Z6USB host ports\\Zn in your device, then some of them might work, albeit with \
a little bit of hassle. You can try to plug a powered USB hub to the USB host port in your \
device. And also plug a USB keyboard to this powered USB hub. Then use the keyboard for \
navigating in this menu. Note: the powered USB hub may be only needed at this point because we \
don't know which GPIO pins to use for enabling the USB power (and these pins are very \
board-specific on A13/A10s hardware).";

const FEL_TEXT: &str = "\
Even if there are no USB host ports or they don't work properly in this configuration, please \
don't give up yet. It is alternatively possible to use \\Zb\\Z6the FEL button\\Zn (if your device \
has one). Short button press means ARROW DOWN. Long button press means ENTER.";

const UART_TEXT: &str = "\
And even if none of the USB/FEL input methods work, the same menu should be also accessible on \
the UART serial console.";

/// How the main menu was left; both ways are final
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuExit {
    /// U-Boot was installed and the system is going down
    Rebooting,
    /// The user asked for a root shell
    RootShell,
}

/// Explain the situation, and how to get around in the menu without a UART console
pub fn intro_text(uart_console: bool, soc_type: Option<SocType>) -> String {
    let mut paragraphs = vec![LCD_TEXT];

    if !uart_console {
        match soc_type {
            Some(SocType::Sun4i | SocType::Sun7i) => paragraphs.push(USB_A10_A20_TEXT),
            Some(SocType::Sun5i) => paragraphs.push(USB_A13_A10S_TEXT),
            _ => (),
        }
        paragraphs.extend([FEL_TEXT, UART_TEXT]);
    }

    let mut text = String::new();
    for paragraph in paragraphs {
        text += paragraph;
        text += "\n\n";
    }
    text
}

/// Build the main menu for this run, returning the intro text and the menu items.
///
/// Installation is only offered if the U-Boot directory carries a `description.txt`.
pub fn main_menu(settings: &Settings, hardware: &HardwareInfo) -> (String, MenuItems) {
    let mut text = intro_text(settings.uart_console, hardware.soc_type);
    let mut items = MenuItems::new();

    match fs::read(settings.description_path()) {
        Ok(description) => {
            let description = String::from_utf8_lossy(&description);
            items.insert(INSTALL.into(), format!("Install {}", description.trim_end()));
        }
        Err(_) => {
            text += &format!(
                "Warning: missing proper directory with u-boot binaries at {}\n\n",
                settings.uboot_dir.display()
            );
        }
    }

    items.insert(
        ROOT_SHELL.into(),
        "Login as 'root' to the initramfs busybox shell".into(),
    );
    text += "Select your action:\n";

    (text, items)
}

/// Show the main menu until the user either installs U-Boot or asks for a shell.
pub fn run_main_menu(
    settings: &Settings,
    hardware: &HardwareInfo,
    ui: &mut impl Presenter,
    target: &mut impl BootTarget,
) -> anyhow::Result<MenuExit> {
    let (text, items) = main_menu(settings, hardware);

    loop {
        match ui.choose(&hardware.summary, &text, &items, None)?.as_deref() {
            Some(INSTALL) => {
                let outcome = install::install_uboot(settings, hardware, ui, target)?;
                info!(?outcome, "installer finished");
                if outcome == Outcome::Rebooting {
                    return Ok(MenuExit::Rebooting);
                }
            }
            Some(ROOT_SHELL) => return Ok(MenuExit::RootShell),
            _ => (),
        }
    }
}

#[test]
fn test_intro_text_uart() {
    let text = intro_text(true, Some(SocType::Sun4i));
    assert!(text.starts_with("Right now your device"));
    assert!(!text.contains("USB host ports"));
    assert!(!text.contains("FEL button"));
    assert!(text.ends_with("much lower than normal.\n\n"));
}

#[test]
fn test_intro_text_soc_specific() {
    for soc in [SocType::Sun4i, SocType::Sun7i] {
        let text = intro_text(false, Some(soc));
        assert!(text.contains("PH03/PH06"));
        assert!(text.contains("FEL button"));
    }

    let text = intro_text(false, Some(SocType::Sun5i));
    assert!(text.contains("A13/A10s hardware"));
    assert!(!text.contains("PH03/PH06"));

    for soc in [Some(SocType::Sun6i), Some(SocType::Sun8i), None] {
        let text = intro_text(false, soc);
        assert!(!text.contains("USB host ports\\Zn in your device"));
        assert!(text.contains("FEL button"));
        assert!(text.contains("UART serial console."));
    }
}

#[test]
fn test_main_menu_items() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let settings = Settings {
        uboot_dir: dir.path().to_path_buf(),
        uart_console: true,
        ..Default::default()
    };

    let (text, items) = main_menu(&settings, &HardwareInfo::default());
    assert_eq!(items.keys().collect::<Vec<_>>(), [ROOT_SHELL]);
    assert!(text.contains("Warning: missing proper directory with u-boot binaries at"));
    assert!(text.ends_with("Select your action:\n"));

    fs::write(settings.description_path(), "u-boot v2014.04 for sunxi\n")?;
    let (text, items) = main_menu(&settings, &HardwareInfo::default());
    assert_eq!(items[INSTALL], "Install u-boot v2014.04 for sunxi");
    assert!(items.contains_key(ROOT_SHELL));
    assert!(!text.contains("Warning"));
    Ok(())
}
