use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("trail_tester_{name}_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn exits_at_end_of_stream_while_stdin_stays_open() {
    let root = scratch_dir("shutdown");
    let input = root.join("in");
    let output = root.join("out");
    std::fs::create_dir_all(&input).unwrap();
    image::GrayImage::from_pixel(32, 32, image::Luma([255]))
        .save(input.join("frame_000.png"))
        .unwrap();

    let mut child = Command::new(env!("CARGO_BIN_EXE_trail_tester"))
        .arg(&input)
        .arg(&output)
        .current_dir(&root)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    // Keep the write end alive for the whole wait, like an idle terminal.
    let stdin = child.stdin.take();

    let deadline = Instant::now() + Duration::from_secs(10);
    let status = loop {
        if let Some(status) = child.try_wait().unwrap() {
            break Some(status);
        }
        if Instant::now() > deadline {
            let _ = child.kill();
            let _ = child.wait();
            break None;
        }
        thread::sleep(Duration::from_millis(20));
    };
    drop(stdin);

    let status = status.expect("driver kept running after the last frame");
    assert!(status.success());
    assert!(output.join("marked_00000.png").exists());
    assert!(output.join("mask_00000.png").exists());
    assert!(output.join("segmented_00000.png").exists());
    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn unreadable_source_is_fatal() {
    let root = scratch_dir("no_source");
    let status = Command::new(env!("CARGO_BIN_EXE_trail_tester"))
        .arg(root.join("missing"))
        .arg(root.join("out"))
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .unwrap();
    assert!(!status.success());
    let _ = std::fs::remove_dir_all(&root);
}
