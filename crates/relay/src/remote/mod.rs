pub mod stage_client;

pub use stage_client::{RemoteDispatchStage, RemotePatternStage, RemoteSignalStage, StageClient, remote_stages};
