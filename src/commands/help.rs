//! `.halp`: private list of commands.

use async_trait::async_trait;

use super::{CommandError, CommandHandler, Invocation, Reply};

/// Usage line of `.halp` itself.
pub const USAGE: &str = ".halp: Show all available commands";

/// Replies privately with every command's usage.
#[derive(Debug, Clone)]
pub struct Halp {
    text: String,
}

impl Halp {
    /// Build the help text from usage lines.
    pub fn new(lines: &[&str]) -> Self {
        let mut text = String::from("Available commands:");
        for line in lines {
            text.push('\n');
            text.push_str(line);
        }
        Self { text }
    }

    /// The full help text.
    pub fn text(&self) -> &str {
        &self.text
    }
}

#[async_trait]
impl CommandHandler for Halp {
    fn name(&self) -> &'static str {
        ".halp"
    }

    fn usage(&self) -> &'static str {
        USAGE
    }

    async fn handle(&self, _invocation: &Invocation, reply: &Reply) -> Result<(), CommandError> {
        reply.send_private(self.text.clone()).await;
        Ok(())
    }
}
