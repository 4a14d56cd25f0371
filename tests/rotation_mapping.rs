//! The rotation service mirrors its east/west axis. These tests pin the
//! correction down end to end, from a raw service payload to saved labels.

use image::{Rgba, RgbaImage};
use serde_json::{json, Value};
use spritegen::{
    backend::{
        pixellab::DEFAULT_VIEW, HttpReply, RecordingSleeper, ResponseArchive, RotationService,
        ScriptedTransport,
    },
    imaging::png_base64,
    rotation::{self, CORRECTED_ORDER},
    PixelLabClient, RotationSet,
};
use std::sync::Arc;

const SERVICE_LABELS: [&str; 8] = ["s", "sw", "w", "nw", "n", "ne", "e", "se"];
const CANONICAL: [&str; 8] = ["s", "se", "e", "ne", "n", "nw", "w", "sw"];

fn marker(index: u8) -> RgbaImage {
    RgbaImage::from_pixel(8, 8, Rgba([index * 20, 0, 0, 255]))
}

fn rotation_payload() -> Value {
    let entries: Vec<Value> = SERVICE_LABELS
        .iter()
        .enumerate()
        .map(|(i, label)| {
            json!({"direction": label, "image": {"base64": png_base64(&marker(i as u8)).unwrap()}})
        })
        .collect();
    json!({"status": "completed", "last_response": {"rotation_images": entries}})
}

#[tokio::test]
async fn service_order_is_relabeled_to_canonical() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(ScriptedTransport::new(vec![
        HttpReply::json(200, &json!({"background_job_id": "rot-1"})),
        HttpReply::json(200, &rotation_payload()),
    ]));
    let client = PixelLabClient::new(
        transport.clone(),
        "https://pixellab.test/v2",
        "",
        Arc::new(RecordingSleeper::new()),
        ResponseArchive::new(dir.path()),
    );

    let set = client
        .rotate_8(&RgbaImage::new(64, 64), DEFAULT_VIEW)
        .await
        .unwrap();

    assert_eq!(set.labels(), CANONICAL.to_vec());
    assert_eq!(set.entries()[1].label, "se");
    assert_ne!(set.entries()[1].label, "sw");
    // the image itself stays where the service put it
    assert_eq!(set.entries()[1].image.get_pixel(0, 0)[0], 20);
    assert_eq!(transport.requests()[1].url, "https://pixellab.test/v2/background-jobs/rot-1");
}

#[test]
fn canonical_table_is_a_permutation_of_service_labels() {
    let mut corrected: Vec<&str> = CORRECTED_ORDER.iter().map(|d| d.as_str()).collect();
    let mut service = SERVICE_LABELS.to_vec();
    corrected.sort_unstable();
    service.sort_unstable();
    assert_eq!(corrected, service);
}

#[test]
fn short_sets_are_relabeled_by_position() {
    let set = RotationSet::from_service_order((0..3).map(marker).collect());
    let corrected = rotation::correct(set);
    assert_eq!(corrected.labels(), vec!["s", "se", "e"]);
}

#[test]
fn entries_past_the_table_keep_service_labels() {
    let set = RotationSet::from_service_order((0..9).map(marker).collect());
    let corrected = rotation::correct(set);
    assert_eq!(corrected.labels()[7], "sw");
    assert_eq!(corrected.labels()[8], "dir8");
}
