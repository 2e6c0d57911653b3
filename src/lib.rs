//! Setup wizard for Allwinner (sunxi) boards booted from a generic SD card image.
//!
//! The image boots with a "lowest common denominator" configuration that works on any board of a
//! given SoC family. This crate detects the SoC and DRAM setup, narrows down the list of boards it
//! could be, lets the user pick the right one, and installs the matching U-Boot onto the card.

pub mod boards;
pub mod config;
pub mod dialog;
pub mod hardware;
pub mod initramfs;
pub mod install;
pub mod menu;
pub mod sdcard;
