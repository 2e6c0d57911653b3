//! Process-level helpers for running as the init program of the setup initramfs.

use std::convert::Infallible;
use std::thread;
use std::time::Duration;

use anyhow::Context;

/// Sleep until the reboot takes us down, or the user cuts power.
pub fn wait_forever() -> ! {
    loop {
        thread::sleep(Duration::from_secs(3600));
    }
}

/// Replace this process with a root login session on the initramfs shell.
///
/// Only returns if the `exec` itself failed.
pub fn login_root_shell() -> anyhow::Result<Infallible> {
    let argv = [c"login", c"-f", c"root"];
    nix::unistd::execvp(argv[0], &argv).context("starting the root login shell")
}
