//! Terminal styling shared by every printed report

use colored::{ColoredString, Colorize};

pub struct Theme;

impl Theme {
    pub fn header(text: &str) -> ColoredString {
        text.bold().cyan()
    }

    pub fn divider(width: usize) -> ColoredString {
        "─".repeat(width).dimmed()
    }

    pub fn divider_bold(width: usize) -> ColoredString {
        "━".repeat(width).cyan()
    }

    pub fn primary(text: &str) -> ColoredString {
        text.bold()
    }

    pub fn muted(text: &str) -> ColoredString {
        text.dimmed()
    }

    pub fn success(text: &str) -> ColoredString {
        text.green().bold()
    }

    pub fn warning(text: &str) -> ColoredString {
        text.yellow().bold()
    }

    pub fn value(text: &str) -> ColoredString {
        text.bold()
    }

    pub fn size(text: &str) -> ColoredString {
        text.cyan()
    }

    pub fn folder(text: &str) -> ColoredString {
        text.blue().bold()
    }
}
