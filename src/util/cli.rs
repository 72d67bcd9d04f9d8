use std::future::Future;
use std::io::{Read, Write};

use anyhow::{Context, Result};
use dialoguer::theme::Theme;

pub fn parse_optional_input(data: Option<String>) -> Result<String> {
    match data {
        Some(data) => Ok(data),
        None => {
            let mut data = String::new();
            std::io::stdin()
                .read_to_string(&mut data)
                .context("failed to read from stdin")?;
            Ok(data)
        }
    }
}

pub fn confirm<T>(theme: &dyn Theme, default: bool, text: T) -> std::io::Result<bool>
where
    T: Into<String>,
{
    dialoguer::Confirm::with_theme(theme)
        .with_prompt(text)
        .default(default)
        .interact()
}

pub fn print_output<T: std::fmt::Display>(arg: T) {
    let _ = if is_terminal() {
        writeln!(std::io::stdout(), "{arg:#}")
    } else {
        write!(std::io::stdout(), "{arg}")
    };
}

pub fn print_error(text: impl std::fmt::Display) {
    if is_terminal() {
        eprintln!("{}", console::style(format!("✘ {text}")).red().bold());
    } else {
        eprintln!("Error: {text}");
    }
}

pub fn note(text: impl std::fmt::Display) -> impl std::fmt::Display {
    console::style(format!("({text})")).dim()
}

pub struct Steps {
    total: usize,
    current: usize,
}

impl Steps {
    pub fn new(total: usize) -> Self {
        Self { total, current: 0 }
    }

    pub fn next(&mut self, text: impl std::fmt::Display) {
        if is_terminal() {
            eprintln!(
                "{} {text}",
                console::style(format!("[{}/{}]", self.current, self.total))
                    .bold()
                    .dim()
            );
        } else {
            eprintln!("[{}/{}] {text}", self.current, self.total);
        }
        self.current += 1;
    }
}

pub fn is_terminal() -> bool {
    use once_cell::race::OnceBox;

    static IS_TERMINAL: OnceBox<bool> = OnceBox::new();
    *IS_TERMINAL.get_or_init(|| Box::new(console::user_attended()))
}

/// Runs an interactive command, treating an interrupted prompt as a normal exit.
pub async fn invoke_as_cli<F>(f: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    f.await.or_else(ignore_interrupt)
}

fn ignore_interrupt(e: anyhow::Error) -> Result<()> {
    if !is_terminal() {
        return Err(e);
    }

    if let Some(e) = e.downcast_ref::<std::io::Error>() {
        if e.kind() == std::io::ErrorKind::Interrupted {
            let _ = console::Term::stderr().show_cursor();
            eprintln!();
            return Ok(());
        }
    }

    Err(e)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_input_is_used_verbatim() {
        let input = parse_optional_input(Some("abandon about".to_owned())).unwrap();
        assert_eq!(input, "abandon about");
    }

    #[test]
    fn non_interrupt_errors_propagate() {
        let err = anyhow::anyhow!("boom");
        assert!(ignore_interrupt(err).is_err());
    }
}
