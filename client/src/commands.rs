//! Sequencing and buffering of outbound commands

use shared::{Command, CommandFrame};

/// Commands sent to the server but not yet acknowledged
///
/// Every issued command gets the next sequence number (starting at 1) and is
/// kept until a snapshot's `lastAcknowledgedSequence` reaches it.
#[derive(Debug)]
pub struct PendingCommands {
    next_sequence: u32,
    client_id: String,
    pending: Vec<CommandFrame>,
}

impl PendingCommands {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            next_sequence: 1,
            client_id: client_id.into(),
            pending: Vec::new(),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Sequence the next issued command will get.
    pub fn next_sequence(&self) -> u32 {
        self.next_sequence
    }

    pub fn issue(&mut self, command: Command) -> CommandFrame {
        let frame = CommandFrame {
            sequence: self.next_sequence,
            client_id: self.client_id.clone(),
            command,
        };
        self.next_sequence += 1;
        self.pending.push(frame.clone());
        frame
    }

    /// Drops and returns every pending command with `sequence <= last_acknowledged`.
    pub fn acknowledge(&mut self, last_acknowledged: u32) -> Vec<CommandFrame> {
        let (acked, still_pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|frame| frame.sequence <= last_acknowledged);
        self.pending = still_pending;
        acked
    }

    pub fn pending(&self) -> &[CommandFrame] {
        &self.pending
    }

    /// Forgets pending commands. Sequence numbering keeps counting up.
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
