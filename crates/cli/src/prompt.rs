use std::io::IsTerminal;
use std::sync::Arc;

use scenewatch_sync::{AssumeYes, Confirm};

/// Asks on the terminal. Declines when stdin or stdout is not a terminal.
pub struct PromptConfirm;

impl Confirm for PromptConfirm {
    fn confirm(&self, message: &str) -> bool {
        let can_prompt = std::io::stdin().is_terminal() && std::io::stdout().is_terminal();
        if !can_prompt {
            eprintln!("{message} (declined: not a terminal, pass --yes to confirm)");
            return false;
        }

        dialoguer::Confirm::new()
            .with_prompt(message)
            .default(false)
            .interact()
            .unwrap_or(false)
    }
}

pub fn confirmer(assume_yes: bool) -> Arc<dyn Confirm> {
    if assume_yes {
        Arc::new(AssumeYes)
    } else {
        Arc::new(PromptConfirm)
    }
}
