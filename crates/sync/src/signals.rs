use std::path::PathBuf;
use std::sync::Arc;

use scratchpad_project::ScratchTree;
use tokio::sync::mpsc;
use tracing::trace;

/// 提供給介面元件的通知。 / Notifications for the presentation layer.
#[derive(Debug, Clone)]
pub enum ScratchSignal {
    /// A fresh snapshot is ready; redraw.
    TreeChanged(Arc<ScratchTree>),
    /// The rebuild that carried this selection has been published.
    SelectPath(PathBuf),
    /// Content was persisted, but the buffer should keep reading as a scratch artifact.
    AutoSaved(PathBuf),
}

pub type SignalSender = mpsc::UnboundedSender<ScratchSignal>;
pub type SignalReceiver = mpsc::UnboundedReceiver<ScratchSignal>;

pub fn channel() -> (SignalSender, SignalReceiver) {
    mpsc::unbounded_channel()
}

/// Sends without failing when the receiving side is gone.
pub(crate) fn emit(sender: &SignalSender, signal: ScratchSignal) {
    if sender.send(signal).is_err() {
        trace!("signal receiver dropped");
    }
}
