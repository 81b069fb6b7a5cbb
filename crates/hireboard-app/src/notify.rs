// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::sync::mpsc::{self, Receiver, Sender};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateChanged {
    Table,
    Draft,
    List,
    Guard,
}

/// Fan-out of "something changed, re-render" notifications.
#[derive(Debug, Default)]
pub struct ChangeNotifier {
    subscribers: Vec<Sender<StateChanged>>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> Receiver<StateChanged> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn publish(&mut self, change: StateChanged) {
        self.subscribers
            .retain(|subscriber| subscriber.send(change).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}
