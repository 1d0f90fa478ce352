use focuskit::vision::{FrameHub, FrameSource};
use focuskit::ImageReplay;
use image::{Rgb, RgbImage};
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::timeout;

fn write_frame(dir: &TempDir, name: &str, shade: u8) {
    RgbImage::from_pixel(8, 6, Rgb([shade, 0, 0]))
        .save(dir.path().join(name))
        .expect("save frame");
}

#[test]
fn test_collects_sorted_images_only() {
    let dir = TempDir::new().expect("tempdir");
    write_frame(&dir, "b.png", 20);
    write_frame(&dir, "a.png", 10);
    std::fs::write(dir.path().join("notes.txt"), "not an image").expect("write");

    let replay = ImageReplay::from_dir(dir.path(), 25.0).expect("replay");
    let names: Vec<_> = replay
        .frames()
        .iter()
        .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
        .collect();
    assert_eq!(names, vec!["a.png", "b.png"]);
    assert_eq!(replay.period(), Duration::from_millis(40));
}

#[test]
fn test_rejects_empty_dir_and_bad_rate() {
    let dir = TempDir::new().expect("tempdir");
    assert!(ImageReplay::from_dir(dir.path(), 10.0).is_err());

    write_frame(&dir, "a.png", 10);
    assert!(ImageReplay::from_dir(dir.path(), 0.0).is_err());
}

#[tokio::test]
async fn test_frames_reach_the_hub() {
    let dir = TempDir::new().expect("tempdir");
    write_frame(&dir, "a.png", 200);

    let hub = FrameHub::new();
    let mut frames = hub.subscribe();
    let task = ImageReplay::from_dir(dir.path(), 50.0)
        .expect("replay")
        .spawn(hub.clone());

    let ready = timeout(Duration::from_secs(2), frames.frame_ready())
        .await
        .expect("frame in time");
    assert!(ready);

    let frame = frames.snapshot().expect("frame");
    assert_eq!((frame.width(), frame.height()), (8, 6));
    assert_eq!(frame.image().get_pixel(0, 0), &Rgb([200, 0, 0]));

    task.abort();
}
