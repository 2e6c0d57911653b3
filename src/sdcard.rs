//! The destructive part: putting U-Boot on the SD card and restarting into it.

use std::fs;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::Context;
use tracing::info;

/// `dd` block size used when describing the write to the user
pub const SECTOR_SIZE: u64 = 1024;

/// Boot ROM looks for the SPL 8 KiB into the card, so this will never change
pub const BOOTLOADER_SECTOR: u64 = 8;

pub const BOOTLOADER_OFFSET: u64 = BOOTLOADER_SECTOR * SECTOR_SIZE;

/// The operations that install and activate a bootloader, in the order they are performed.
pub trait BootTarget {
    /// Copy `image` onto the boot device at [`BOOTLOADER_OFFSET`]
    fn write_bootloader(&mut self, image: &Path) -> anyhow::Result<()>;

    /// Flush all filesystem and block device buffers
    fn sync(&mut self) -> anyhow::Result<()>;

    /// Ask for a reboot. Normally this returns before the system actually goes down.
    fn reboot(&mut self) -> anyhow::Result<()>;
}

/// The SD card the system booted from
#[derive(Debug, Clone)]
pub struct SdCard {
    device: PathBuf,
    reboot_program: String,
}

impl SdCard {
    pub fn new(device: impl Into<PathBuf>, reboot_program: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            reboot_program: reboot_program.into(),
        }
    }
}

/// Write `image` into `device` at the bootloader offset, leaving everything else alone.
pub fn write_image_at_offset(device: &Path, image: &Path) -> anyhow::Result<u64> {
    let data = fs::read(image).with_context(|| image.display().to_string())?;

    let mut dev = fs::File::options()
        .write(true)
        .open(device)
        .with_context(|| device.display().to_string())?;
    dev.seek(SeekFrom::Start(BOOTLOADER_OFFSET))?;
    dev.write_all(&data)
        .with_context(|| format!("writing {}", device.display()))?;
    dev.sync_all()?;

    Ok(data.len() as u64)
}

impl BootTarget for SdCard {
    fn write_bootloader(&mut self, image: &Path) -> anyhow::Result<()> {
        let written = write_image_at_offset(&self.device, image)?;
        info!(
            image = %image.display(),
            device = %self.device.display(),
            bytes = written,
            offset = BOOTLOADER_OFFSET,
            "bootloader written"
        );
        Ok(())
    }

    fn sync(&mut self) -> anyhow::Result<()> {
        nix::unistd::sync();
        Ok(())
    }

    fn reboot(&mut self) -> anyhow::Result<()> {
        let status = Command::new(&self.reboot_program)
            .status()
            .with_context(|| format!("running {}", self.reboot_program))?;
        anyhow::ensure!(status.success(), "{} failed: {status}", self.reboot_program);
        Ok(())
    }
}

#[test]
fn test_write_image_at_offset() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let device = dir.path().join("mmcblk0");
    let image = dir.path().join("u-boot-sunxi-with-spl-board-x.bin");

    // A "card" with a partition table in the first sector and data after the bootloader area
    let mut card = vec![0x11u8; 64 * 1024];
    card[..512].fill(0x55);
    fs::write(&device, &card)?;
    fs::write(&image, [0xEAu8; 3000])?;

    assert_eq!(write_image_at_offset(&device, &image)?, 3000);

    let result = fs::read(&device)?;
    assert_eq!(result.len(), card.len());
    assert!(result[..512].iter().all(|&x| x == 0x55));
    assert!(result[512..8192].iter().all(|&x| x == 0x11));
    assert!(result[8192..8192 + 3000].iter().all(|&x| x == 0xEA));
    assert!(result[8192 + 3000..].iter().all(|&x| x == 0x11));
    Ok(())
}

#[test]
fn test_write_missing_image() {
    let dir = tempfile::tempdir().unwrap();
    let device = dir.path().join("mmcblk0");
    fs::write(&device, [0u8; 16]).unwrap();

    assert!(write_image_at_offset(&device, &dir.path().join("missing.bin")).is_err());
    assert_eq!(fs::read(&device).unwrap(), [0u8; 16]);
}
