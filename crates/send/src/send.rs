//! The send batch driver.
//!
//! One invocation owns one connection: connect, write-test the transfer
//! root, then walk the file list in order, skipping files the device
//! already has, retrying transient upload failures with a reconnect in
//! between, and sending companion images, before closing on every path
//! out. Per-file failures never abort the batch; only connect and
//! write-test failures do.

use std::sync::{Arc, Mutex};
use std::thread;

use romhoard_device::{Device, sanitize_filename};
use romhoard_transfer::{
    KeepaliveGuard, SharedClient, TransferClient, make_client, parent_directory,
};
use tracing::{error, info, warn};

use crate::error::SendError;
use crate::source::{ImageRenderer, RomSource};
use crate::types::{
    FileResult, ImageResult, ProgressSink, RomFile, SendOptions, SendProgress, SendReport,
};

/// Name of the artifact written by the pre-batch write test.
pub const WRITE_TEST_FILE: &str = ".romhoard_test";

/// Sends a batch of ROMs (and companion images) to a device.
///
/// The item list is used exactly as given; choosing which ROM set
/// represents a game is the caller's concern. Returns `Err` only when
/// the whole batch could not start; individual file failures land in the
/// report's `failed` list.
pub fn send_to_device(
    device: &Device,
    items: &[RomFile],
    source: &dyn RomSource,
    renderer: Option<&dyn ImageRenderer>,
    progress_sink: Option<ProgressSink<'_>>,
    options: &SendOptions,
) -> Result<SendReport, SendError> {
    let client = make_client(device)?;
    send_with_client(client, device, items, source, renderer, progress_sink, options)
}

/// Like [`send_to_device`] but with a caller-supplied client, for tests
/// and embeddings with custom transports.
pub fn send_with_client(
    mut client: Box<dyn TransferClient>,
    device: &Device,
    items: &[RomFile],
    source: &dyn RomSource,
    renderer: Option<&dyn ImageRenderer>,
    mut sink: Option<ProgressSink<'_>>,
    options: &SendOptions,
) -> Result<SendReport, SendError> {
    let mut report = SendReport::default();
    if items.is_empty() {
        return Ok(report);
    }

    let mut files_total = items.len();
    if device.include_images {
        files_total += items
            .iter()
            .filter(|rom| {
                device
                    .effective_image_path(&rom.system_slug, &rom.file_name)
                    .is_some()
            })
            .count();
    }
    let bytes_total: u64 = items.iter().map(|rom| rom.file_size).sum();
    let mut progress = SendProgress {
        files_total,
        bytes_total,
        ..SendProgress::default()
    };

    if let Err(e) = client.connect() {
        client.close();
        return Err(SendError::Connect(e.to_string()));
    }

    // Fail fast before touching any real file: wrong credentials or a
    // read-only mount should not cost a whole batch of attempts.
    let test_path = device.effective_transfer_path(WRITE_TEST_FILE);
    if let Err(e) = client.test_write(&test_path) {
        client.close();
        return Err(SendError::WriteTest(e.to_string()));
    }

    info!(
        host = %device.transfer_host,
        protocol = %device.transfer_protocol,
        files = items.len(),
        "connected to device"
    );

    let client: SharedClient = Arc::new(Mutex::new(client));
    let keepalive = KeepaliveGuard::spawn(Arc::clone(&client), options.keepalive_interval);

    for rom in items {
        progress.current_file = rom.file_name.clone();

        let opened = source.open_rom(rom).and_then(|local| {
            let size = std::fs::metadata(local.path())?.len();
            Ok((local, size))
        });
        let (local, local_size) = match opened {
            Ok(pair) => pair,
            Err(e) => {
                error!(file = %rom.file_name, error = %e, "cannot access local file");
                report.failed.push(FileResult {
                    game_id: rom.game_id,
                    file_name: rom.file_name.clone(),
                    remote_path: String::new(),
                    success: false,
                    skipped: false,
                    error: Some(e.to_string()),
                    bytes: 0,
                });
                progress.files_failed += 1;
                notify(&mut sink, &progress);
                continue;
            }
        };

        let file_name = sanitize_filename(local.file_name());
        let game_name = sanitize_filename(&rom.game_name);
        let system_folder = device.system_folder(&rom.system_slug);
        let relative = if device.game_folders_for_system(&rom.system_slug) {
            format!("{system_folder}/{game_name}/{file_name}")
        } else {
            format!("{system_folder}/{file_name}")
        };
        let remote_path = device.effective_transfer_path(&relative);

        // Re-runs of a large batch should be cheap: same size remotely
        // means the file is already there.
        let remote_size = client.lock().unwrap().remote_size(&remote_path);
        if remote_size == Some(local_size) {
            info!(file = %local.file_name(), "skipped (same size)");
            report.skipped.push(FileResult {
                game_id: rom.game_id,
                file_name: local.file_name().to_string(),
                remote_path: remote_path.clone(),
                success: true,
                skipped: true,
                error: None,
                bytes: local_size,
            });
            progress.files_skipped += 1;

            // The image still goes out even when the ROM was skipped.
            if let Some(image) =
                upload_rom_image(&client, device, renderer, rom, local.file_name(), &mut progress)
            {
                report.images.push(image);
                notify(&mut sink, &progress);
            }
            notify(&mut sink, &progress);
            continue;
        }

        if let Some(parent) = parent_directory(&remote_path) {
            client.lock().unwrap().ensure_directory(parent);
        }

        let mut last_error = String::new();
        let mut uploaded = false;
        for attempt in 0..options.max_retries {
            if attempt > 0 {
                thread::sleep(options.retry_pause);
                let mut c = client.lock().unwrap();
                if !c.is_connected() {
                    warn!(host = %device.transfer_host, "connection lost, reconnecting");
                    if let Err(e) = c.reconnect() {
                        last_error = format!("reconnect failed: {e}");
                        break;
                    }
                }
            }

            let bytes_before = progress.bytes_uploaded;
            let result = {
                let mut on_chunk = |sent: u64, _total: u64| {
                    progress.bytes_uploaded = bytes_before + sent;
                    if let Some(cb) = sink.as_deref_mut() {
                        cb(&progress);
                    }
                };
                client
                    .lock()
                    .unwrap()
                    .upload_file(local.path(), &remote_path, Some(&mut on_chunk))
            };

            match result {
                Ok(()) => {
                    progress.bytes_uploaded = bytes_before + local_size;
                    uploaded = true;
                    break;
                }
                Err(e) => {
                    last_error = e.to_string();
                    warn!(
                        attempt = attempt + 1,
                        max_retries = options.max_retries,
                        file = %local.file_name(),
                        error = %last_error,
                        "upload attempt failed"
                    );
                }
            }
        }

        if uploaded {
            info!(file = %local.file_name(), remote = %remote_path, "uploaded");
            report.uploaded.push(FileResult {
                game_id: rom.game_id,
                file_name: local.file_name().to_string(),
                remote_path: remote_path.clone(),
                success: true,
                skipped: false,
                error: None,
                bytes: local_size,
            });
            progress.files_uploaded += 1;

            if let Some(image) =
                upload_rom_image(&client, device, renderer, rom, local.file_name(), &mut progress)
            {
                report.images.push(image);
                notify(&mut sink, &progress);
            }
        } else {
            error!(file = %local.file_name(), error = %last_error, "upload failed");
            report.failed.push(FileResult {
                game_id: rom.game_id,
                file_name: local.file_name().to_string(),
                remote_path: remote_path.clone(),
                success: false,
                skipped: false,
                error: Some(last_error),
                bytes: 0,
            });
            progress.files_failed += 1;
        }
        notify(&mut sink, &progress);
    }

    // Join the keepalive before tearing the connection down.
    drop(keepalive);
    client.lock().unwrap().close();

    Ok(report)
}

fn notify(sink: &mut Option<ProgressSink<'_>>, progress: &SendProgress) {
    if let Some(cb) = sink.as_deref_mut() {
        cb(progress);
    }
}

/// Uploads the companion image for one ROM, if the device wants one.
///
/// `None` means no image outcome applies (images disabled, no path
/// computable, or no renderer supplied). Image failures are recorded in
/// the returned result and never affect the ROM's own outcome.
fn upload_rom_image(
    client: &SharedClient,
    device: &Device,
    renderer: Option<&dyn ImageRenderer>,
    rom: &RomFile,
    rom_file_name: &str,
    progress: &mut SendProgress,
) -> Option<ImageResult> {
    if !device.include_images {
        return None;
    }
    let remote_path = device.effective_image_path(&rom.system_slug, rom_file_name)?;
    let renderer = renderer?;

    let Some(image) = renderer.render(rom, device.image_kind, device.image_max_width) else {
        progress.images_skipped += 1;
        return Some(ImageResult {
            game_id: rom.game_id,
            rom_file_name: rom_file_name.to_string(),
            remote_path,
            success: false,
            skipped: true,
            error: Some("no image available".into()),
            bytes: 0,
        });
    };

    let data_size = image.data.len() as u64;
    let mut c = client.lock().unwrap();

    if c.remote_size(&remote_path) == Some(data_size) {
        progress.images_skipped += 1;
        return Some(ImageResult {
            game_id: rom.game_id,
            rom_file_name: rom_file_name.to_string(),
            remote_path,
            success: true,
            skipped: true,
            error: None,
            bytes: data_size,
        });
    }

    if let Some(parent) = parent_directory(&remote_path) {
        c.ensure_directory(parent);
    }

    match c.upload_data(&image.data, &remote_path) {
        Ok(()) => {
            progress.images_uploaded += 1;
            info!(game = %rom.game_name, remote = %remote_path, "uploaded image");
            Some(ImageResult {
                game_id: rom.game_id,
                rom_file_name: rom_file_name.to_string(),
                remote_path,
                success: true,
                skipped: false,
                error: None,
                bytes: data_size,
            })
        }
        Err(e) => {
            progress.images_failed += 1;
            error!(game = %rom.game_name, error = %e, "image upload failed");
            Some(ImageResult {
                game_id: rom.game_id,
                rom_file_name: rom_file_name.to_string(),
                remote_path,
                success: false,
                skipped: false,
                error: Some(e.to_string()),
                bytes: 0,
            })
        }
    }
}
