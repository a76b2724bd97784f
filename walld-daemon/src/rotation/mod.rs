pub mod engine;
pub mod scheduler;

use tokio::sync::oneshot;

use walld_core::ipc::{IpcRequest, IpcResponse};

pub enum DaemonCommand {
    /// A client request; the engine answers on `respond`.
    Request {
        request: IpcRequest,
        respond: oneshot::Sender<IpcResponse>,
    },
    /// Rotate now, as if the timer fired.
    Rotate,
}
