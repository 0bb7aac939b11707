// ABOUTME: HTTP accept loops on unix sockets and TCP, one task per connection.
// ABOUTME: Serves the axum router through hyper with upgrades enabled for websockets.

use axum::Router;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use nonempty::NonEmpty;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, UnixListener};
use tower::Service;

use crate::config::ListenAddress;
use crate::error::{Error, Result};

enum Listener {
    Unix(UnixListener),
    Tcp(TcpListener),
}

async fn bind(address: &ListenAddress) -> Result<Listener> {
    match address {
        ListenAddress::Unix(path) => {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            Ok(Listener::Unix(UnixListener::bind(path)?))
        }
        ListenAddress::Tcp { host, port } => {
            Ok(Listener::Tcp(TcpListener::bind((host.as_str(), *port)).await?))
        }
    }
}

fn serve_connection<S>(app: Router, stream: S)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let hyper_service = hyper::service::service_fn(move |request: hyper::Request<Incoming>| {
            app.clone().call(request)
        });

        if let Err(err) = http1::Builder::new()
            .serve_connection(TokioIo::new(stream), hyper_service)
            .with_upgrades()
            .await
        {
            let err_str = err.to_string().to_lowercase();
            if !err_str.contains("connection reset") && !err_str.contains("broken pipe") {
                tracing::warn!("error serving connection: {}", err);
            }
        }
    });
}

async fn accept_loop(app: Router, listener: Listener) -> Result<()> {
    loop {
        match &listener {
            Listener::Unix(l) => {
                let (stream, _) = l.accept().await?;
                serve_connection(app.clone(), stream);
            }
            Listener::Tcp(l) => {
                let (stream, peer) = l.accept().await?;
                tracing::debug!(%peer, "accepted connection");
                serve_connection(app.clone(), stream);
            }
        }
    }
}

/// Serve `app` on every address until interrupted.
pub async fn serve(app: Router, addresses: &NonEmpty<ListenAddress>) -> Result<()> {
    let mut loops = tokio::task::JoinSet::new();
    for address in addresses.iter() {
        let listener = bind(address).await?;
        tracing::info!(%address, "listening");
        loops.spawn(accept_loop(app.clone(), listener));
    }

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
            Ok(())
        }
        Some(joined) = loops.join_next() => match joined {
            Ok(result) => result,
            Err(e) => Err(Error::internal(e.to_string())),
        },
    }
}
