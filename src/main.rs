use std::{path::Path, process};

use futures::StreamExt;
use spindle::{
    application::{document, error::AppError},
    config::{self, RenderArgs, Settings},
    infra::{
        error::InfraError,
        http::{self, HttpState},
        telemetry,
    },
    render::{PageSource, Props, RenderContext, Slots, flatten, render_page},
};
use tokio::{io::AsyncWriteExt, sync::oneshot};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli().map_err(|err| {
        AppError::from(InfraError::configuration(format!(
            "failed to load configuration: {err}"
        )))
    })?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Render(args) => run_render(settings, args).await,
    }
}

async fn run_serve(settings: Settings) -> Result<(), AppError> {
    let router = http::build_router(HttpState::from_settings(&settings));
    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "spindle::serve",
        addr = %settings.server.addr,
        pages_dir = %settings.render.pages_dir.display(),
        mode = ?settings.render.mode,
        "Listening"
    );

    let (signalled_tx, signalled_rx) = oneshot::channel();
    let server = axum::serve(listener, router.into_make_service()).with_graceful_shutdown(
        async move {
            wait_for_shutdown_signal().await;
            let _ = signalled_tx.send(());
        },
    );
    let mut server = tokio::spawn(async move { server.await });

    let joined = tokio::select! {
        joined = &mut server => joined,
        _ = signalled_rx => {
            match tokio::time::timeout(settings.server.graceful_shutdown, &mut server).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!(
                        target = "spindle::serve",
                        timeout_secs = settings.server.graceful_shutdown.as_secs(),
                        "Graceful shutdown timed out; dropping open connections"
                    );
                    server.abort();
                    return Ok(());
                }
            }
        }
    };

    joined
        .map_err(|err| AppError::unexpected(format!("server task failed: {err}")))?
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
    info!(target = "spindle::serve", "Server stopped");
    Ok(())
}

async fn wait_for_shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!(target = "spindle::serve", "Shutdown signal received"),
        Err(err) => {
            warn!(
                target = "spindle::serve",
                error = %err,
                "Failed to listen for shutdown signal; waiting indefinitely"
            );
            std::future::pending::<()>().await;
        }
    }
}

async fn run_render(settings: Settings, args: RenderArgs) -> Result<(), AppError> {
    let text = tokio::fs::read_to_string(&args.file)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    let root = document::parse(&text)?;

    let cx = RenderContext::builder(pathname_for(&args.file))
        .pool(settings.queue)
        .compress_html(settings.render.compress_html)
        .build();
    let queue = flatten(root, &cx).await?;
    let response = render_page(
        PageSource::Queue(queue),
        Props::new(),
        Slots::new(),
        settings.render.mode,
        &cx,
    )
    .await?;

    if !response.status().is_success() {
        warn!(
            target = "spindle::render",
            status = %response.status(),
            "Page bubbled a non-success response"
        );
    }

    let mut stdout = tokio::io::stdout();
    let mut body = response.into_body().into_data_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|err| AppError::unexpected(format!("render failed: {err}")))?;
        stdout
            .write_all(&chunk)
            .await
            .map_err(|err| AppError::from(InfraError::from(err)))?;
        stdout
            .flush()
            .await
            .map_err(|err| AppError::from(InfraError::from(err)))?;
    }

    info!(
        target = "spindle::render",
        file = %args.file.display(),
        mode = ?settings.render.mode,
        "Render completed"
    );
    Ok(())
}

fn pathname_for(file: &Path) -> String {
    let stem = file
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or_default();
    if stem == "index" {
        "/".to_string()
    } else {
        format!("/{stem}")
    }
}
