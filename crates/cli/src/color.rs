// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal color handling shared by `gateway list`/`gateway status` output.

use std::io::IsTerminal;

use clap::builder::styling::{Ansi256Color, Color, Style, Styles};

pub mod codes {
    pub const HEADER: u8 = 74;
    pub const LITERAL: u8 = 250;
    pub const MUTED: u8 = 240;
}

/// Priority: `NO_COLOR=1` disables, `COLOR=1` forces, else a TTY check.
pub fn should_colorize() -> bool {
    if std::env::var("NO_COLOR").is_ok_and(|v| v == "1") {
        return false;
    }
    if std::env::var("COLOR").is_ok_and(|v| v == "1") {
        return true;
    }
    std::io::stdout().is_terminal()
}

/// Clap `Styles` using the same palette as table/status output.
pub fn styles() -> Styles {
    if !should_colorize() {
        return Styles::plain();
    }
    Styles::styled()
        .usage(Style::new().fg_color(Some(Color::Ansi256(Ansi256Color(codes::HEADER)))))
        .header(Style::new().fg_color(Some(Color::Ansi256(Ansi256Color(codes::HEADER)))))
        .literal(Style::new().fg_color(Some(Color::Ansi256(Ansi256Color(codes::LITERAL)))))
}

const RESET: &str = "\x1b[0m";

fn fg256(code: u8) -> String {
    format!("\x1b[38;5;{code}m")
}

pub fn apply_header(text: &str) -> String {
    format!("{}{text}{}", fg256(codes::HEADER), RESET)
}

pub fn apply_muted(text: &str) -> String {
    format!("{}{text}{}", fg256(codes::MUTED), RESET)
}

/// Colorize a gateway/conversation status word: green for live/healthy
/// states, yellow for transitional ones, red for failure states.
pub fn apply_status(text: &str) -> String {
    let lower = text.trim_start().to_lowercase();
    let first_word = lower.split(|c: char| !c.is_alphabetic()).next().unwrap_or("");
    let code = match first_word {
        "running" | "live" | "started" | "completed" => "\x1b[32m",
        "starting" | "needs" | "pending" | "adopted" => "\x1b[33m",
        "exited" | "failed" | "stopped" | "dead" => "\x1b[31m",
        _ => return text.to_string(),
    };
    format!("{code}{text}{RESET}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_and_muted_wrap_in_escapes() {
        assert!(apply_header("x").starts_with("\x1b[38;5;74m"));
        assert!(apply_muted("x").starts_with("\x1b[38;5;240m"));
    }

    #[test]
    fn status_colors_by_first_word() {
        assert!(apply_status("running").starts_with("\x1b[32m"));
        assert!(apply_status("starting").starts_with("\x1b[33m"));
        assert!(apply_status("exited: crash").starts_with("\x1b[31m"));
        assert_eq!(apply_status("unknown"), "unknown");
    }
}
