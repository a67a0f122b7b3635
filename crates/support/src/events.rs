use tokio::sync::broadcast;

const SIGNAL_CHANNEL_CAPACITY: usize = 8;

/// Process-wide "open the assistant" request, raised by any part of the app.
#[derive(Debug, Clone)]
pub struct OpenAssistantSignal {
    sender: broadcast::Sender<()>,
}

impl Default for OpenAssistantSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenAssistantSignal {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(SIGNAL_CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Returns how many listeners were reached.
    pub fn raise(&self) -> usize {
        self.sender.send(()).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.sender.subscribe()
    }
}
