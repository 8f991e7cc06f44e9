//! # Motion Capture Module
//!
//! Records rigid-body poses delivered by a motion-capture client, one CSV
//! file per rigid body.
//!
//! The capture SDK invokes the frame callback on its own network thread, so
//! [`MocapRecorder`] is `Sync` and only touches shared state through the
//! destination table's locks.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::error::IngestError;
use crate::record::FlatRecord;
use crate::telemetry::session::timestamped_record;
use crate::telemetry::DestinationTable;

/// Pose of one tracked rigid body
#[derive(Debug, Clone, PartialEq)]
pub struct RigidBodyPose {
    /// Asset name as configured on the capture server
    pub name: String,

    /// Position
    pub x: f32,
    pub y: f32,
    pub z: f32,

    /// Orientation quaternion
    pub qx: f32,
    pub qy: f32,
    pub qz: f32,
    pub qw: f32,
}

/// One frame of capture data
#[derive(Debug, Clone, PartialEq)]
pub struct MocapFrame {
    pub frame_id: i32,

    /// Server-side timestamp in seconds
    pub timestamp: f64,

    pub rigid_bodies: Vec<RigidBodyPose>,
}

/// Destination key for a rigid body: `rigid_body_<name>.csv`
///
/// Characters that are unsafe in file names are replaced with `_`.
pub fn rigid_body_key(name: &str) -> String {
    let safe: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("rigid_body_{}.csv", safe)
}

/// CSV row for one pose:
/// `arrival_time_us, name, timestamp, x, y, z, qx, qy, qz, qw`
pub fn pose_record(frame: &MocapFrame, pose: &RigidBodyPose, arrival: DateTime<Utc>) -> FlatRecord {
    let mut record = timestamped_record(arrival);
    record.insert("name", pose.name.as_str());
    record.insert("timestamp", frame.timestamp);
    record.insert("x", pose.x);
    record.insert("y", pose.y);
    record.insert("z", pose.z);
    record.insert("qx", pose.qx);
    record.insert("qy", pose.qy);
    record.insert("qz", pose.qz);
    record.insert("qw", pose.qw);
    record
}

/// Frame callback target for a motion-capture client
#[derive(Debug)]
pub struct MocapRecorder {
    table: Arc<DestinationTable>,
    running: AtomicBool,
    frames: AtomicU64,
}

impl MocapRecorder {
    pub fn new(table: Arc<DestinationTable>) -> Self {
        Self {
            table,
            running: AtomicBool::new(true),
            frames: AtomicU64::new(0),
        }
    }

    /// Handle one frame; returns the number of rows written
    ///
    /// Called from the capture client's thread. A rigid body whose file
    /// cannot be written is logged and skipped; the rest of the frame is
    /// still recorded.
    pub fn on_frame(&self, frame: &MocapFrame) -> usize {
        if !self.is_running() {
            return 0;
        }

        let arrival = Utc::now();
        self.frames.fetch_add(1, Ordering::Relaxed);
        debug!(
            "Frame {} with {} rigid bodies",
            frame.frame_id,
            frame.rigid_bodies.len()
        );

        let mut written = 0;
        for pose in &frame.rigid_bodies {
            let record = pose_record(frame, pose, arrival);
            match self.table.write(&rigid_body_key(&pose.name), &record) {
                Ok(()) => written += 1,
                Err(IngestError::LoggerClosed) => {
                    self.stop();
                    break;
                }
                Err(e) => error!("Failed to log rigid body '{}': {}", pose.name, e),
            }
        }

        written
    }

    /// Stop accepting frames; later callbacks return immediately
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            info!(
                "Motion capture recorder stopped after {} frames",
                self.frames.load(Ordering::Relaxed)
            );
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Frames received while running
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::thread;
    use tempfile::TempDir;

    fn pose(name: &str, x: f32) -> RigidBodyPose {
        RigidBodyPose {
            name: name.to_string(),
            x,
            y: 0.25,
            z: -1.0,
            qx: 0.0,
            qy: 0.0,
            qz: 0.0,
            qw: 1.0,
        }
    }

    fn frame(frame_id: i32, bodies: Vec<RigidBodyPose>) -> MocapFrame {
        MocapFrame {
            frame_id,
            timestamp: frame_id as f64 / 100.0,
            rigid_bodies: bodies,
        }
    }

    #[test]
    fn test_rigid_body_key_sanitizes() {
        assert_eq!(rigid_body_key("drone_1"), "rigid_body_drone_1.csv");
        assert_eq!(rigid_body_key("../etc/x y"), "rigid_body____etc_x_y.csv");
    }

    #[test]
    fn test_one_file_per_rigid_body() {
        let dir = TempDir::new().unwrap();
        let table = Arc::new(DestinationTable::new(dir.path()));
        let recorder = MocapRecorder::new(Arc::clone(&table));

        assert_eq!(recorder.on_frame(&frame(1, vec![pose("a", 1.0), pose("b", 2.0)])), 2);
        assert_eq!(recorder.on_frame(&frame(2, vec![pose("a", 3.0)])), 1);

        assert_eq!(
            table.destination_keys(),
            vec!["rigid_body_a.csv", "rigid_body_b.csv"]
        );

        let contents = fs::read_to_string(table.path_for("rigid_body_a.csv")).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(
            lines[0],
            "\"arrival_time_us\",\"name\",\"timestamp\",\"x\",\"y\",\"z\",\"qx\",\"qy\",\"qz\",\"qw\""
        );
        assert!(lines[1].ends_with(",\"a\",0.01,1.0,0.25,-1.0,0.0,0.0,0.0,1.0"));
        assert!(lines[2].contains(",\"a\",0.02,3.0,"));
        assert_eq!(recorder.frames(), 2);
    }

    #[test]
    fn test_stopped_recorder_ignores_frames() {
        let dir = TempDir::new().unwrap();
        let table = Arc::new(DestinationTable::new(dir.path()));
        let recorder = MocapRecorder::new(Arc::clone(&table));

        recorder.stop();
        assert_eq!(recorder.on_frame(&frame(1, vec![pose("a", 1.0)])), 0);
        assert!(table.destination_keys().is_empty());
    }

    #[test]
    fn test_closed_table_stops_recorder() {
        let dir = TempDir::new().unwrap();
        let table = Arc::new(DestinationTable::new(dir.path()));
        let recorder = MocapRecorder::new(Arc::clone(&table));

        table.close().unwrap();
        assert_eq!(recorder.on_frame(&frame(1, vec![pose("a", 1.0)])), 0);
        assert!(!recorder.is_running());
    }

    #[test]
    fn test_unwritable_body_does_not_block_others() {
        let dir = TempDir::new().unwrap();
        // A directory where the file should be makes that one body fail
        fs::create_dir(dir.path().join(rigid_body_key("blocked"))).unwrap();

        let table = Arc::new(DestinationTable::new(dir.path()));
        let recorder = MocapRecorder::new(Arc::clone(&table));

        let written = recorder.on_frame(&frame(1, vec![pose("blocked", 1.0), pose("ok", 2.0)]));
        assert_eq!(written, 1);
        assert!(table.path_for(&rigid_body_key("ok")).is_file());
    }

    #[test]
    fn test_callback_thread_and_shutdown_race() {
        let dir = TempDir::new().unwrap();
        let table = Arc::new(DestinationTable::new(dir.path()));
        let recorder = Arc::new(MocapRecorder::new(Arc::clone(&table)));

        let sdk_thread = {
            let recorder = Arc::clone(&recorder);
            thread::spawn(move || {
                for id in 0..500 {
                    recorder.on_frame(&frame(id, vec![pose("a", id as f32), pose("b", 0.5)]));
                }
            })
        };

        thread::sleep(std::time::Duration::from_millis(5));
        table.close().unwrap();
        sdk_thread.join().unwrap();

        for key in ["rigid_body_a.csv", "rigid_body_b.csv"] {
            let path = table.path_for(key);
            if !path.exists() {
                continue;
            }
            let contents = fs::read_to_string(path).unwrap();
            assert!(contents.is_empty() || contents.ends_with('\n'));
            for line in contents.lines() {
                assert_eq!(line.split(',').count(), 10, "truncated row in {}: {}", key, line);
            }
        }
    }
}
