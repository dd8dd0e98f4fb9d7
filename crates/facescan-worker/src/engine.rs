use facescan_core::{EncodeError, FaceDescriptor, FaceEncoder};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error("engine thread exited")]
    ChannelClosed,
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Messages sent from the runner to the engine thread.
enum EngineRequest {
    Encode {
        path: PathBuf,
        reply: oneshot::Sender<Result<FaceDescriptor, EncodeError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Encode one image file on the engine thread and wait for the descriptor.
    pub async fn encode(&self, path: &Path) -> Result<FaceDescriptor, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Encode {
                path: path.to_path_buf(),
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        Ok(reply_rx.await.map_err(|_| EngineError::ChannelClosed)??)
    }
}

/// Spawn the encoder on a dedicated OS thread.
///
/// Inference is CPU-bound and the ONNX sessions need `&mut`, so the encoder
/// lives on its own thread and serves one request at a time. The thread exits
/// once every handle has been dropped.
pub fn spawn_engine<E>(mut encoder: E) -> Result<EngineHandle, EngineError>
where
    E: FaceEncoder + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(1);

    std::thread::Builder::new()
        .name("facescan-engine".into())
        .spawn(move || {
            tracing::debug!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Encode { path, reply } => {
                        let result = encoder.encode(&path);
                        if let Err(err) = &result {
                            tracing::debug!(path = %path.display(), error = %err, "encode failed");
                        }
                        let _ = reply.send(result);
                    }
                }
            }
            tracing::debug!("engine thread exiting");
        })
        .map_err(EngineError::Spawn)?;

    Ok(EngineHandle { tx })
}
