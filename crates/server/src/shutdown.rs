use std::future::Future;

use tracing::{error, info};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShutdownSignal {
    Interrupt,
    Terminate,
}

impl ShutdownSignal {
    fn as_str(self) -> &'static str {
        match self {
            Self::Interrupt => "SIGINT",
            Self::Terminate => "SIGTERM",
        }
    }
}

/// Resolves on ctrl-c or, on unix, SIGTERM.
pub async fn wait_for_shutdown() -> ShutdownSignal {
    let signal = first_signal(interrupt(), terminate()).await;
    info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        signal = signal.as_str(),
        "shutdown requested"
    );
    signal
}

async fn first_signal<I, T>(interrupt: I, terminate: T) -> ShutdownSignal
where
    I: Future<Output = ()>,
    T: Future<Output = ()>,
{
    tokio::select! {
        () = interrupt => ShutdownSignal::Interrupt,
        () = terminate => ShutdownSignal::Terminate,
    }
}

async fn interrupt() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        error!(
            event_name = "system.server.signal_error",
            correlation_id = "shutdown",
            signal = "SIGINT",
            error = %error,
            "could not listen for shutdown signal"
        );
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut stream) => {
            if stream.recv().await.is_none() {
                std::future::pending::<()>().await;
            }
        }
        Err(error) => {
            error!(
                event_name = "system.server.signal_error",
                correlation_id = "shutdown",
                signal = "SIGTERM",
                error = %error,
                "could not listen for shutdown signal"
            );
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
