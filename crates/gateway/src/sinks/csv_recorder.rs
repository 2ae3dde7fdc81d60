//! Writes one row per `(frame, sensor)` pair to a CSV file for offline
//! capture, mirroring the teacher's `csv_recorder` plugin.

use csv::Writer;
use mash_wire::sync_frame::SyncFrameMsg;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use tracing::{info, warn};

pub struct CsvRecorderSink {
    writer: Option<Writer<File>>,
    path: PathBuf,
}

impl CsvRecorderSink {
    pub fn new(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut writer = Writer::from_path(&path)?;
        writer.write_record([
            "frame_seq",
            "sync_timestamp_us",
            "sensor_id",
            "qw",
            "qx",
            "qy",
            "qz",
            "ax",
            "ay",
            "az",
            "gx",
            "gy",
            "gz",
            "flags",
        ])?;
        writer.flush()?;
        info!(path = %path.display(), "csv recorder sink opened");
        Ok(Self {
            writer: Some(writer),
            path,
        })
    }

    pub fn write_frame(&mut self, frame: &SyncFrameMsg) -> io::Result<()> {
        let Some(writer) = self.writer.as_mut() else {
            return Ok(());
        };
        for record in &frame.records {
            writer.write_record(&[
                frame.frame_seq.to_string(),
                frame.sync_timestamp_us.to_string(),
                record.sensor_id.0.to_string(),
                record.quaternion.0[0].to_string(),
                record.quaternion.0[1].to_string(),
                record.quaternion.0[2].to_string(),
                record.quaternion.0[3].to_string(),
                record.accel.0[0].to_string(),
                record.accel.0[1].to_string(),
                record.accel.0[2].to_string(),
                record.gyro.0[0].to_string(),
                record.gyro.0[1].to_string(),
                record.gyro.0[2].to_string(),
                record.flags.0.to_string(),
            ])?;
        }
        if let Err(err) = writer.flush() {
            warn!(path = %self.path.display(), %err, "csv recorder flush failed");
            return Err(err);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mash_types::{Quaternion, SampleFlags, SensorId, Vec3};
    use mash_wire::sync_frame::SyncFrameRecord;

    #[test]
    fn writes_header_and_one_row_per_sensor() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frames.csv");
        let mut sink = CsvRecorderSink::new(&path).unwrap();
        let frame = SyncFrameMsg {
            frame_seq: 1,
            sync_timestamp_us: 5_000,
            records: vec![SyncFrameRecord {
                sensor_id: SensorId(10),
                quaternion: Quaternion([1.0, 0.0, 0.0, 0.0]),
                accel: Vec3([0.0, 0.0, 1.0]),
                gyro: Vec3::default(),
                flags: SampleFlags::NONE,
            }],
        };
        sink.write_frame(&frame).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }
}
