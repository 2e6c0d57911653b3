//! Text-mode menus, rendered by the external `dialog` program.
//!
//! `dialog` draws on the terminal and reports the chosen menu tag on its stderr, which is captured
//! in a temporary file and read back once the program exits.

use std::collections::BTreeMap;
use std::io::{Read, Seek, SeekFrom};
use std::process::{Command, Stdio};

use anyhow::Context;
use tracing::debug;

/// Menu entries: choice key to label. Keys are unique and the menu is shown sorted by key.
pub type MenuItems = BTreeMap<String, String>;

/// Blocking, modal user interaction.
pub trait Presenter {
    /// Let the user pick one of `items`.
    ///
    /// Returns `Ok(None)` if the user backed out or nothing recognizable was selected. Errors are
    /// reserved for failing to show the menu at all.
    fn choose(
        &mut self,
        title: &str,
        text: &str,
        items: &MenuItems,
        default_key: Option<&str>,
    ) -> anyhow::Result<Option<String>>;

    /// Show a message and wait for the user to acknowledge it.
    fn notify(&mut self, title: &str, text: &str) -> anyhow::Result<()>;
}

const MENU_SIZE: [&str; 3] = ["30", "110", "30"];
const MSGBOX_SIZE: [&str; 2] = ["30", "90"];

/// Command-line arguments for a `--menu` dialog
pub fn menu_args(
    title: &str,
    text: &str,
    items: &MenuItems,
    default_key: Option<&str>,
) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(default_key) = default_key {
        args.extend(["--default-item".to_string(), default_key.to_string()]);
    }

    args.extend(
        ["--clear", "--no-cancel", "--colors", "--title", title]
            .into_iter()
            .map(String::from),
    );
    args.extend(["--menu".to_string(), format!("\n{text}")]);
    args.extend(MENU_SIZE.into_iter().map(String::from));

    for (key, label) in items {
        args.extend([key.clone(), label.clone()]);
    }

    args
}

/// Command-line arguments for a `--msgbox` dialog
pub fn msgbox_args(title: &str, text: &str) -> Vec<String> {
    let mut args: Vec<String> = ["--clear", "--no-cancel", "--title", title]
        .into_iter()
        .map(String::from)
        .collect();
    args.extend(["--msgbox".to_string(), format!("\n{text}")]);
    args.extend(MSGBOX_SIZE.into_iter().map(String::from));
    args
}

/// Map the renderer's output back to one of the menu keys.
pub fn resolve_selection(output: &str, items: &MenuItems) -> Option<String> {
    let output = output.trim_end_matches(['\r', '\n']);
    items.contains_key(output).then(|| output.to_string())
}

/// [`Presenter`] backed by the `dialog` program
#[derive(Debug, Clone)]
pub struct Dialog {
    program: String,
}

impl Dialog {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Run `dialog`, returning what it printed on stderr
    fn run(&self, args: &[String]) -> anyhow::Result<String> {
        let mut capture = tempfile::tempfile().context("creating dialog output file")?;

        let status = Command::new(&self.program)
            .args(args)
            .stderr(Stdio::from(capture.try_clone()?))
            .status()
            .with_context(|| format!("running {}", self.program))?;
        debug!(program = %self.program, %status, "dialog exited");

        let mut output = String::new();
        capture.seek(SeekFrom::Start(0))?;
        capture.read_to_string(&mut output)?;
        Ok(output)
    }
}

impl Presenter for Dialog {
    fn choose(
        &mut self,
        title: &str,
        text: &str,
        items: &MenuItems,
        default_key: Option<&str>,
    ) -> anyhow::Result<Option<String>> {
        let output = self.run(&menu_args(title, text, items, default_key))?;
        Ok(resolve_selection(&output, items))
    }

    fn notify(&mut self, title: &str, text: &str) -> anyhow::Result<()> {
        self.run(&msgbox_args(title, text))?;
        Ok(())
    }
}

#[cfg(test)]
fn items(pairs: &[(&str, &str)]) -> MenuItems {
    pairs
        .iter()
        .map(|&(key, label)| (key.to_string(), label.to_string()))
        .collect()
}

#[test]
fn test_menu_args() {
    let menu = items(&[("2", "Login"), ("1", "Install")]);

    assert_eq!(
        menu_args("SoC: Allwinner A10", "Select:", &menu, None),
        [
            "--clear",
            "--no-cancel",
            "--colors",
            "--title",
            "SoC: Allwinner A10",
            "--menu",
            "\nSelect:",
            "30",
            "110",
            "30",
            "1",
            "Install",
            "2",
            "Login",
        ]
    );

    let args = menu_args("t", "x", &menu, Some("2"));
    assert_eq!(args[..3], ["--default-item", "2", "--clear"]);
}

#[test]
fn test_msgbox_args() {
    assert_eq!(
        msgbox_args("Unknown hardware", "Error"),
        [
            "--clear",
            "--no-cancel",
            "--title",
            "Unknown hardware",
            "--msgbox",
            "\nError",
            "30",
            "90",
        ]
    );
}

#[test]
fn test_resolve_selection() {
    let menu = items(&[("cancel", "Cancel"), ("proceed", "Do it")]);

    assert_eq!(resolve_selection("proceed", &menu), Some("proceed".into()));
    assert_eq!(resolve_selection("cancel\n", &menu), Some("cancel".into()));
    assert_eq!(resolve_selection("", &menu), None);
    assert_eq!(resolve_selection("Do it", &menu), None);
    assert_eq!(resolve_selection("proceed and more", &menu), None);
}

#[test]
fn test_dialog_captures_stderr() -> anyhow::Result<()> {
    // Stand in for `dialog` with a shell that reports a selection on stderr
    let dialog = Dialog::new("sh");
    let output = dialog.run(&["-c".into(), "printf board-x >&2".into()])?;
    assert_eq!(output, "board-x");

    assert!(Dialog::new("/nonexistent/dialog").run(&[]).is_err());
    Ok(())
}
