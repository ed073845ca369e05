//! Human-readable progress output.

use crate::amount::Amount;
use crate::client::TxResult;

/// Sink for the walkthrough's console narrative.
pub trait Reporter {
    fn section(&mut self, title: &str);

    fn line(&mut self, text: &str);

    fn balance(&mut self, label: &str, amount: &Amount) {
        self.line(&format!("{}: {}", label, amount));
    }

    /// Report a confirmed transaction, linking it when `explorer_base` is set.
    fn transaction(&mut self, tx: &TxResult, explorer_base: Option<&str>) {
        self.line(&format!("Tx Hash: {:?}", tx.hash));
        if let Some(base) = explorer_base {
            self.line(&format!("View Transaction: {}", tx.explorer_url(base)));
        }
    }
}

/// Prints to stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn section(&mut self, title: &str) {
        println!("\n--- {} ---", title);
    }

    fn line(&mut self, text: &str) {
        println!("{}", text);
    }
}

/// Keeps every emitted line in memory.
#[derive(Debug, Clone, Default)]
pub struct CapturedReporter {
    lines: Vec<String>,
}

impl CapturedReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// First line starting with `prefix`.
    pub fn find(&self, prefix: &str) -> Option<&str> {
        self.lines
            .iter()
            .find(|line| line.starts_with(prefix))
            .map(String::as_str)
    }
}

impl Reporter for CapturedReporter {
    fn section(&mut self, title: &str) {
        self.lines.push(format!("--- {} ---", title));
    }

    fn line(&mut self, text: &str) {
        self.lines.push(text.to_string());
    }
}
