//! The setup wizard that runs when a sunxi setup SD card image boots.
//!
//! This usually runs as the last step of the initramfs init script, on whatever console the user
//! is likely to be looking at. Exiting would leave the user at a dead screen (or panic the kernel,
//! if we are PID 1), so errors are reported and then we wait.
use clap::Parser;
use sunxi_bootsetup::{
    config::{Settings, SettingsArgs},
    dialog::Dialog,
    hardware::{self, SystemHardware},
    initramfs::{login_root_shell, wait_forever},
    menu::{run_main_menu, MenuExit},
    sdcard::SdCard,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Cli {
    #[clap(flatten)]
    settings: SettingsArgs,
}

/// Logs go to stderr, which is the console `dialog` draws on, so stay quiet unless asked
fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn main() -> ! {
    init_logging();
    let settings = Settings::from(Cli::parse().settings);

    let hardware = hardware::probe(&mut SystemHardware::new(&settings));
    let mut dialog = Dialog::new(settings.dialog_program.clone());
    let mut sdcard = SdCard::new(
        settings.target_device.clone(),
        settings.reboot_program.clone(),
    );

    let error = match run_main_menu(&settings, &hardware, &mut dialog, &mut sdcard) {
        Ok(MenuExit::Rebooting) => {
            eprintln!("[+] U-Boot installed, rebooting...");
            wait_forever();
        }
        Ok(MenuExit::RootShell) => match login_root_shell() {
            Ok(never) => match never {},
            Err(error) => error,
        },
        Err(error) => error,
    };

    eprintln!("[-] The setup wizard has failed:\n{error:#}");
    wait_forever()
}
