//! Locations of everything the installer touches.
//!
//! The defaults describe the SD card setup image: the first partition of the card is mounted at
//! `/mnt/mmcblk0p1` and carries the prebuilt U-Boot binaries, and the bootloader itself is written
//! to the raw card device.

use std::path::{Path, PathBuf};

use clap::Args;

pub const UBOOT_DIR: &str = "/mnt/mmcblk0p1/boot/setup/u-boot-binaries";
pub const BOOT_SCRIPT_PATH: &str = "/mnt/mmcblk0p1/boot/boot.scr";
pub const TARGET_DEVICE: &str = "/dev/mmcblk0";
pub const CPUINFO_PATH: &str = "/proc/cpuinfo";

pub const CATALOG_NAME: &str = "sunxi-boards.cfg";
pub const DESCRIPTION_NAME: &str = "description.txt";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Directory holding `sunxi-boards.cfg`, `description.txt` and the per-board binaries
    pub uboot_dir: PathBuf,

    /// Boot script that the installed U-Boot will look for; only used to warn the user
    pub boot_script: PathBuf,

    /// Block device receiving the bootloader
    pub target_device: PathBuf,

    /// Source of the `Hardware` identification line
    pub cpuinfo: PathBuf,

    pub devmem_program: String,
    pub meminfo_program: String,
    pub dialog_program: String,
    pub reboot_program: String,

    /// Set when the user is already talking to us over the UART console, in which case there is
    /// no need to explain the alternative input methods
    pub uart_console: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            uboot_dir: UBOOT_DIR.into(),
            boot_script: BOOT_SCRIPT_PATH.into(),
            target_device: TARGET_DEVICE.into(),
            cpuinfo: CPUINFO_PATH.into(),
            devmem_program: "devmem2".into(),
            meminfo_program: "a10-meminfo".into(),
            dialog_program: "dialog".into(),
            reboot_program: "reboot".into(),
            uart_console: false,
        }
    }
}

impl Settings {
    pub fn catalog_path(&self) -> PathBuf {
        self.uboot_dir.join(CATALOG_NAME)
    }

    pub fn description_path(&self) -> PathBuf {
        self.uboot_dir.join(DESCRIPTION_NAME)
    }

    /// Path of the prebuilt U-Boot (with SPL) for the named board
    pub fn binary_path(&self, board_name: &str) -> PathBuf {
        binary_path(&self.uboot_dir, board_name)
    }
}

pub fn binary_path(uboot_dir: &Path, board_name: &str) -> PathBuf {
    uboot_dir.join(format!("u-boot-sunxi-with-spl-{board_name}.bin"))
}

/// Command-line overrides for [`Settings`], each with an environment variable fallback
#[derive(Args, Debug, Default, Clone)]
pub struct SettingsArgs {
    /// The menu is being shown on the UART serial console
    #[clap(long, env = "SUNXI_BOOTSETUP_UART_CONSOLE")]
    pub uart_console: bool,

    /// Directory with `sunxi-boards.cfg`, `description.txt` and the U-Boot binaries
    #[clap(long, env = "SUNXI_BOOTSETUP_UBOOT_DIR")]
    pub uboot_dir: Option<PathBuf>,

    /// Block device to install U-Boot onto
    #[clap(long, env = "SUNXI_BOOTSETUP_DEVICE")]
    pub device: Option<PathBuf>,

    /// Boot script whose absence means no OS is installed on the card yet
    #[clap(long, env = "SUNXI_BOOTSETUP_BOOT_SCRIPT")]
    pub boot_script: Option<PathBuf>,

    /// File to read the `Hardware` identification line from
    #[clap(long, env = "SUNXI_BOOTSETUP_CPUINFO")]
    pub cpuinfo: Option<PathBuf>,

    /// The register access program (`devmem2`)
    #[clap(long, env = "SUNXI_BOOTSETUP_DEVMEM")]
    pub devmem: Option<String>,

    /// The DRAM controller report program (`a10-meminfo`)
    #[clap(long, env = "SUNXI_BOOTSETUP_MEMINFO")]
    pub meminfo: Option<String>,

    /// The `dialog` program to render menus with
    #[clap(long, env = "SUNXI_BOOTSETUP_DIALOG")]
    pub dialog: Option<String>,

    /// The program run to reboot once U-Boot is installed
    #[clap(long, env = "SUNXI_BOOTSETUP_REBOOT")]
    pub reboot: Option<String>,
}

impl From<SettingsArgs> for Settings {
    fn from(args: SettingsArgs) -> Self {
        let defaults = Settings::default();
        Self {
            uboot_dir: args.uboot_dir.unwrap_or(defaults.uboot_dir),
            boot_script: args.boot_script.unwrap_or(defaults.boot_script),
            target_device: args.device.unwrap_or(defaults.target_device),
            cpuinfo: args.cpuinfo.unwrap_or(defaults.cpuinfo),
            devmem_program: args.devmem.unwrap_or(defaults.devmem_program),
            meminfo_program: args.meminfo.unwrap_or(defaults.meminfo_program),
            dialog_program: args.dialog.unwrap_or(defaults.dialog_program),
            reboot_program: args.reboot.unwrap_or(defaults.reboot_program),
            uart_console: args.uart_console,
        }
    }
}

#[test]
fn test_settings_paths() {
    let settings = Settings::default();
    assert_eq!(
        settings.catalog_path(),
        Path::new("/mnt/mmcblk0p1/boot/setup/u-boot-binaries/sunxi-boards.cfg")
    );
    assert_eq!(
        settings.binary_path("Cubieboard"),
        Path::new("/mnt/mmcblk0p1/boot/setup/u-boot-binaries/u-boot-sunxi-with-spl-Cubieboard.bin")
    );
}

#[test]
fn test_settings_args() {
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct Cli {
        #[clap(flatten)]
        settings: SettingsArgs,
    }

    let settings: Settings = Cli::try_parse_from(["sunxi-bootsetup"])
        .unwrap()
        .settings
        .into();
    assert_eq!(settings, Settings::default());

    let settings: Settings = Cli::try_parse_from([
        "sunxi-probe",
        "--cpuinfo",
        "/tmp/cpuinfo",
        "--devmem",
        "/opt/bin/devmem2",
        "--meminfo",
        "/opt/bin/a10-meminfo",
        "--reboot",
        "/bin/true",
        "--uart-console",
    ])
    .unwrap()
    .settings
    .into();
    assert_eq!(settings.cpuinfo, Path::new("/tmp/cpuinfo"));
    assert_eq!(settings.devmem_program, "/opt/bin/devmem2");
    assert_eq!(settings.meminfo_program, "/opt/bin/a10-meminfo");
    assert_eq!(settings.reboot_program, "/bin/true");
    assert!(settings.uart_console);
    assert_eq!(settings.uboot_dir, Path::new(UBOOT_DIR));
}
