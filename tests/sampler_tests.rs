// SPDX-License-Identifier: MPL-2.0

//! Integration tests for the decode loop

mod common;

use barcode_scanner::backends::camera::CameraPlatform;
use barcode_scanner::backends::camera::types::StreamConstraints;
use barcode_scanner::backends::virtual_camera::{VirtualDevice, VirtualPlatform};
use barcode_scanner::scanner::{
    ActiveSource, DecodeLoop, SamplerConfig, ScanEvent, ScanHistory, TickOutcome,
};
use barcode_scanner::{DecodeError, DecoderHandle};
use common::{ScriptedDecoder, qr};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

struct Harness {
    platform: VirtualPlatform,
    source: ActiveSource,
    decoder: Arc<ScriptedDecoder>,
    history: Arc<Mutex<ScanHistory>>,
    events: broadcast::Receiver<ScanEvent>,
    decode_loop: DecodeLoop,
}

fn harness(decoder: ScriptedDecoder, handle_ready: bool) -> Harness {
    let platform = VirtualPlatform::new(vec![VirtualDevice::camera("back", "Back Camera")]);
    let source = ActiveSource::new();
    let decoder = Arc::new(decoder);
    let handle = if handle_ready {
        DecoderHandle::ready(decoder.clone())
    } else {
        DecoderHandle::empty()
    };
    let config = SamplerConfig::default();
    let history = Arc::new(Mutex::new(config.new_history()));
    let (tx, events) = broadcast::channel(16);
    let decode_loop = DecodeLoop::new(source.clone(), handle, config, history.clone(), tx);

    Harness {
        platform,
        source,
        decoder,
        history,
        events,
        decode_loop,
    }
}

fn bind(h: &Harness) {
    let stream = h
        .platform
        .get_user_media(&StreamConstraints::exact_device("back"))
        .unwrap();
    h.source.bind(stream);
}

#[tokio::test]
async fn test_unbound_source_is_not_ready() {
    let h = harness(ScriptedDecoder::always("x"), true);
    assert_eq!(h.decode_loop.tick().await, TickOutcome::NotReady);
    assert_eq!(h.decoder.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_warming_source_is_not_decoded() {
    let h = harness(ScriptedDecoder::always("x"), true);
    h.platform.set_warmup(Duration::from_millis(300));
    bind(&h);

    assert_eq!(h.decode_loop.tick().await, TickOutcome::NotReady);
    assert_eq!(h.decoder.calls(), 0);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(matches!(h.decode_loop.tick().await, TickOutcome::Surfaced(_)));
}

#[tokio::test]
async fn test_missing_frame_is_not_ready() {
    let h = harness(ScriptedDecoder::always("x"), true);
    bind(&h);
    h.platform.set_frame("back", None);

    assert_eq!(h.decode_loop.tick().await, TickOutcome::NotReady);
    assert_eq!(h.decoder.calls(), 0);
}

#[tokio::test]
async fn test_pending_decoder_skips_tick() {
    let h = harness(ScriptedDecoder::always("x"), false);
    bind(&h);

    assert_eq!(h.decode_loop.tick().await, TickOutcome::DecoderPending);
    assert_eq!(h.decoder.calls(), 0);
}

#[tokio::test]
async fn test_decoder_receives_cropped_band() {
    let h = harness(ScriptedDecoder::new(vec![]), true);
    bind(&h);

    assert_eq!(h.decode_loop.tick().await, TickOutcome::NoResult);
    // 640x480 frame, 70% width, 30% height
    assert_eq!(h.decoder.last_input(), Some((448 * 144 * 4, 448, 144)));
}

#[tokio::test]
async fn test_repeats_are_suppressed() {
    let mut h = harness(ScriptedDecoder::always("hello"), true);
    bind(&h);

    let first = h.decode_loop.tick().await;
    let TickOutcome::Surfaced(record) = first else {
        panic!("expected a surfaced result, got {:?}", first);
    };
    assert_eq!(record.text, "hello");
    assert_eq!(record.device_id.as_deref(), Some("back"));
    assert_eq!(record.to_string(), "QRCode: hello");

    assert_eq!(h.decode_loop.tick().await, TickOutcome::Duplicate);
    assert_eq!(h.history.lock().unwrap().len(), 1);

    assert_eq!(h.events.try_recv().unwrap(), ScanEvent::Decoded(record));
    assert!(h.events.try_recv().is_err(), "Duplicate must not be broadcast");
}

#[tokio::test]
async fn test_decode_errors_are_swallowed() {
    let h = harness(
        ScriptedDecoder::new(vec![
            Err(DecodeError::Failed("corrupt".into())),
            Ok(Some(qr("after error"))),
        ]),
        true,
    );
    bind(&h);

    assert_eq!(h.decode_loop.tick().await, TickOutcome::Failed);
    assert!(matches!(
        h.decode_loop.tick().await,
        TickOutcome::Surfaced(r) if r.text == "after error"
    ));
}

#[tokio::test]
async fn test_empty_text_is_ignored() {
    let h = harness(ScriptedDecoder::new(vec![Ok(Some(qr("")))]), true);
    bind(&h);

    assert_eq!(h.decode_loop.tick().await, TickOutcome::NoResult);
    assert!(h.history.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_run_stops_on_cancel() {
    let mut h = harness(ScriptedDecoder::always("loop"), true);
    bind(&h);

    let cancel = CancellationToken::new();
    let task = tokio::spawn(h.decode_loop.clone().run(cancel.clone()));

    let event = tokio::time::timeout(Duration::from_secs(5), h.events.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(event, ScanEvent::Decoded(r) if r.text == "loop"));

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .unwrap()
        .unwrap();

    let calls = h.decoder.calls();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.decoder.calls(), calls, "No ticks after cancellation");
}

#[tokio::test]
async fn test_run_keeps_polling_until_source_binds() {
    let mut h = harness(ScriptedDecoder::always("late"), true);

    let cancel = CancellationToken::new();
    let task = tokio::spawn(h.decode_loop.clone().run(cancel.clone()));

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(h.decoder.calls(), 0);

    bind(&h);
    let event = tokio::time::timeout(Duration::from_secs(5), h.events.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(event, ScanEvent::Decoded(r) if r.text == "late"));

    cancel.cancel();
    task.await.unwrap();
}
