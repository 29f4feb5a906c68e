//! Main app runner for recording

use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::application::ports::{ConfigStore, DeviceSource};
use crate::application::AudioRecorderService;
use crate::domain::config::AppConfig;
use crate::infrastructure::{CpalDeviceSource, OggOpusFactory, SyntheticDeviceSource, XdgConfigStore};

use super::args::RecordOptions;
use super::presenter::Presenter;
use super::signals::ShutdownSignal;

/// Exit codes
pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_ERROR: u8 = 1;
pub const EXIT_USAGE_ERROR: u8 = 2;

/// Load the config file and merge CLI overrides on top
pub async fn load_merged_config(cli_config: AppConfig) -> AppConfig {
    let store = XdgConfigStore::new();
    let file_config = store.load().await.unwrap_or_else(|e| {
        warn!("ignoring config file: {e}");
        AppConfig::empty()
    });
    file_config.merge(cli_config)
}

/// Run one recording with the configured device source
pub async fn run_record(options: RecordOptions) -> ExitCode {
    if options.synth {
        record_with(SyntheticDeviceSource::sine(440.0), options).await
    } else {
        record_with(CpalDeviceSource::new(), options).await
    }
}

async fn record_with<D: DeviceSource>(device: D, options: RecordOptions) -> ExitCode {
    let mut presenter = Presenter::new();
    let mut service = AudioRecorderService::new(device, Arc::new(OggOpusFactory::new()));

    let shutdown = ShutdownSignal::new();
    shutdown.setup();

    if let Err(e) = service.start(Some(options.constraints.clone())).await {
        presenter.error(&e.to_string());
        return ExitCode::from(EXIT_ERROR);
    }
    presenter.start_spinner("Recording...");

    if options.pause_demo {
        let half = options.duration / 2;
        run_segment(&service, &presenter, &shutdown, half).await;

        if !shutdown.is_shutdown() {
            if let Err(e) = service.pause(true).await {
                presenter.spinner_fail(&e.to_string());
                return ExitCode::from(EXIT_ERROR);
            }
            if let Some(preview) = service.artifact() {
                presenter.update_spinner(&format!(
                    "Paused (preview {})",
                    preview.human_readable_size()
                ));
            }
            tokio::time::sleep(Duration::from_secs(1)).await;

            if let Err(e) = service.resume().await {
                presenter.spinner_fail(&e.to_string());
                return ExitCode::from(EXIT_ERROR);
            }
            run_segment(&service, &presenter, &shutdown, options.duration - half).await;
        }
    } else {
        run_segment(&service, &presenter, &shutdown, options.duration).await;
    }

    if let Err(e) = service.stop().await {
        presenter.spinner_fail(&e.to_string());
        return ExitCode::from(EXIT_ERROR);
    }

    let Some(artifact) = service.artifact() else {
        presenter.spinner_fail("No audio was produced");
        return ExitCode::from(EXIT_ERROR);
    };
    presenter.spinner_success(&format!(
        "Recorded {} in {}",
        artifact.human_readable_size(),
        Presenter::format_elapsed(service.elapsed_secs())
    ));

    if let Err(e) = tokio::fs::write(&options.output, artifact.data()).await {
        presenter.error(&format!(
            "Failed to write {}: {e}",
            options.output.display()
        ));
        return ExitCode::from(EXIT_ERROR);
    }
    presenter.success(&format!(
        "Saved {} ({})",
        options.output.display(),
        artifact.mime_type()
    ));

    ExitCode::from(EXIT_SUCCESS)
}

/// Wait out one recording segment, ticking the elapsed display
async fn run_segment<D: DeviceSource>(
    service: &AudioRecorderService<D>,
    presenter: &Presenter,
    shutdown: &ShutdownSignal,
    segment: Duration,
) {
    let deadline = Instant::now() + segment;
    while Instant::now() < deadline && !shutdown.is_shutdown() {
        tokio::time::sleep(Duration::from_millis(250)).await;
        presenter.update_spinner(&format!(
            "Recording... {}",
            Presenter::format_elapsed(service.elapsed_secs())
        ));
    }
}
