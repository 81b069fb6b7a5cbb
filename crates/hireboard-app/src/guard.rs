// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};

/// What a page must answer before the guard lets navigation leave it.
pub trait PendingChanges {
    fn has_form_changed(&self) -> bool;
    fn has_pending_drafts(&self) -> bool;
    fn clear_drafts_for_current_type(&mut self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveChoice {
    Stay,
    Keep,
    Discard,
}

impl LeaveChoice {
    pub const ALL: [Self; 3] = [Self::Stay, Self::Keep, Self::Discard];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Stay => "stay on this page",
            Self::Keep => "leave and keep the draft",
            Self::Discard => "leave and discard the draft",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeavePrompt {
    pub title: &'static str,
    pub message: &'static str,
    pub choices: [LeaveChoice; 3],
}

impl Default for LeavePrompt {
    fn default() -> Self {
        Self {
            title: "Unsaved changes",
            message: "This page has changes that are not saved yet.",
            choices: LeaveChoice::ALL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardCheck {
    Allow,
    AskUser(LeavePrompt),
    Blocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GuardState {
    #[default]
    Idle,
    AwaitingChoice,
}

/// Modal that resolves a [`LeavePrompt`] to one choice.
pub trait LeaveDialog {
    fn choose(&mut self, prompt: &LeavePrompt) -> Result<LeaveChoice>;
}

/// Two-phase navigation interceptor: `attempt` decides whether the user has
/// to be asked, `resolve` turns the answer into allow/deny.
#[derive(Debug, Default)]
pub struct LeaveGuard {
    state: GuardState,
}

impl LeaveGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn state(&self) -> GuardState {
        self.state
    }

    pub fn attempt(&mut self, page: &dyn PendingChanges) -> GuardCheck {
        if self.state == GuardState::AwaitingChoice {
            return GuardCheck::Blocked;
        }
        if !page.has_form_changed() && !page.has_pending_drafts() {
            return GuardCheck::Allow;
        }
        self.state = GuardState::AwaitingChoice;
        GuardCheck::AskUser(LeavePrompt::default())
    }

    /// Returns `true` when navigation may proceed.
    pub fn resolve(&mut self, page: &mut dyn PendingChanges, choice: LeaveChoice) -> Result<bool> {
        if self.state != GuardState::AwaitingChoice {
            bail!("no navigation is waiting for a leave decision");
        }
        self.state = GuardState::Idle;
        match choice {
            LeaveChoice::Stay => Ok(false),
            LeaveChoice::Keep => Ok(true),
            LeaveChoice::Discard => {
                page.clear_drafts_for_current_type()?;
                Ok(true)
            }
        }
    }

    /// Abandons a pending decision, e.g. when the dialog is dismissed.
    pub fn cancel(&mut self) {
        self.state = GuardState::Idle;
    }

    /// Runs both phases, opening `dialog` only when something is pending.
    pub fn can_deactivate(
        &mut self,
        page: &mut dyn PendingChanges,
        dialog: &mut dyn LeaveDialog,
    ) -> Result<bool> {
        match self.attempt(page) {
            GuardCheck::Allow => Ok(true),
            GuardCheck::Blocked => Ok(false),
            GuardCheck::AskUser(prompt) => {
                let choice = match dialog.choose(&prompt) {
                    Ok(choice) => choice,
                    Err(error) => {
                        self.cancel();
                        return Err(error);
                    }
                };
                self.resolve(page, choice)
            }
        }
    }
}
