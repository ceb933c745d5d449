//! Trajectory sinks.
//!
//! Every sampled frame is handed to a [`TrajectoryWriter`]. Formats that carry a frame
//! count in their header (binary, bincode) are told the count up front and refuse to
//! finish with a different number of frames.

use abp_common::{OutputFormat, Snapshot};
use crate::error::{Result, SimError};
use log::debug;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use zerocopy::{Immutable, IntoBytes};

pub const CSV_HEADER: [&str; 8] = [
    "Particles",
    "x-position",
    "y-position",
    "z-position",
    "ex-orientation",
    "ey-orientation",
    "ez-orientation",
    "time",
];

pub trait TrajectoryWriter {
    fn write_frame(&mut self, frame: &Snapshot) -> Result<()>;

    /// Flushes buffered output. Must be called once after the last frame.
    fn finish(&mut self) -> Result<()>;
}

/// Path of the trajectory file for `base` in `format`.
pub fn trajectory_path(base: &str, format: OutputFormat) -> PathBuf {
    PathBuf::from(format!("{}_trajectory.{}", base, format.extension()))
}

/// Path of the optional final-state table.
pub fn final_state_path(base: &str) -> PathBuf {
    PathBuf::from(format!("{}_final_state.csv", base))
}

/// Opens a buffered file writer for `format` at `path`.
pub fn open_writer(
    format: OutputFormat,
    path: &Path,
    num_particles: usize,
    frames: u32,
    total_steps: u32,
) -> Result<Box<dyn TrajectoryWriter>> {
    let file = BufWriter::new(File::create(path)?);
    let writer: Box<dyn TrajectoryWriter> = match format {
        OutputFormat::Csv => Box::new(CsvTrajectoryWriter::new(file)?),
        OutputFormat::Binary => Box::new(BinaryTrajectoryWriter::new(file, num_particles, frames, total_steps)?),
        OutputFormat::Json => Box::new(JsonLinesWriter::new(file)),
        OutputFormat::Bincode => Box::new(BincodeWriter::new(file, frames)?),
        OutputFormat::MessagePack => Box::new(MessagePackWriter::new(file)),
    };
    Ok(writer)
}

fn encode_err(e: impl std::fmt::Display) -> SimError {
    SimError::Encode(e.to_string())
}

fn check_frame_count(expected: u32, written: u32) -> Result<()> {
    if expected != written {
        return Err(SimError::Encode(format!("header announced {expected} frames, {written} written")));
    }
    Ok(())
}

/// One row per particle per frame: `Particles<k>` with `k` counted from zero, the six
/// components, and the integer step in the `time` column.
pub struct CsvTrajectoryWriter<W: Write> {
    inner: csv::Writer<W>,
}

impl<W: Write> CsvTrajectoryWriter<W> {
    pub fn new(sink: W) -> Result<Self> {
        let mut inner = csv::Writer::from_writer(sink);
        inner.write_record(CSV_HEADER).map_err(encode_err)?;
        Ok(Self { inner })
    }

    pub fn into_inner(self) -> Result<W> {
        self.inner.into_inner().map_err(|e| SimError::Encode(e.to_string()))
    }
}

impl<W: Write> TrajectoryWriter for CsvTrajectoryWriter<W> {
    fn write_frame(&mut self, frame: &Snapshot) -> Result<()> {
        let step = frame.step.to_string();
        for k in 0..frame.particle_count() {
            self.inner
                .write_record([
                    format!("Particles{k}"),
                    frame.x[k].to_string(),
                    frame.y[k].to_string(),
                    frame.z[k].to_string(),
                    frame.ex[k].to_string(),
                    frame.ey[k].to_string(),
                    frame.ez[k].to_string(),
                    step.clone(),
                ])
                .map_err(encode_err)?;
        }
        debug!("Wrote CSV frame for step {}", frame.step);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, IntoBytes, Immutable)]
struct BinaryHeader {
    particles: i32,
    frames: i32,
}

/// Native-endian header `i32 particles, i32 frames`, then per frame an `i32` step and the
/// six component arrays in the order x, y, z, ex, ey, ez.
pub struct BinaryTrajectoryWriter<W: Write> {
    inner: W,
    num_particles: usize,
    frames: u32,
    written: u32,
}

impl<W: Write> BinaryTrajectoryWriter<W> {
    /// Fails before writing anything when a step label up to `total_steps` would not fit the
    /// `i32` step field.
    pub fn new(mut inner: W, num_particles: usize, frames: u32, total_steps: u32) -> Result<Self> {
        if i32::try_from(total_steps).is_err() {
            return Err(SimError::Encode(format!(
                "{total_steps} steps exceed the i32 step field of the binary format"
            )));
        }
        let header = BinaryHeader {
            particles: i32::try_from(num_particles).map_err(encode_err)?,
            frames: i32::try_from(frames).map_err(encode_err)?,
        };
        inner.write_all(header.as_bytes())?;
        Ok(Self { inner, num_particles, frames, written: 0 })
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> TrajectoryWriter for BinaryTrajectoryWriter<W> {
    fn write_frame(&mut self, frame: &Snapshot) -> Result<()> {
        if frame.particle_count() != self.num_particles {
            return Err(SimError::LengthMismatch { expected: self.num_particles, found: frame.particle_count() });
        }
        let step = i32::try_from(frame.step).map_err(encode_err)?;
        self.inner.write_all(step.as_bytes())?;
        for column in [&frame.x, &frame.y, &frame.z, &frame.ex, &frame.ey, &frame.ez] {
            self.inner.write_all(column.as_slice().as_bytes())?;
        }
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.inner.flush()?;
        check_frame_count(self.frames, self.written)
    }
}

/// One JSON object per line.
pub struct JsonLinesWriter<W: Write> {
    inner: W,
}

impl<W: Write> JsonLinesWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> TrajectoryWriter for JsonLinesWriter<W> {
    fn write_frame(&mut self, frame: &Snapshot) -> Result<()> {
        serde_json::to_writer(&mut self.inner, frame).map_err(encode_err)?;
        self.inner.write_all(b"\n")?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }
}

/// A `u32` frame count followed by the bincode-encoded frames.
pub struct BincodeWriter<W: Write> {
    inner: W,
    frames: u32,
    written: u32,
}

impl<W: Write> BincodeWriter<W> {
    pub fn new(mut inner: W, frames: u32) -> Result<Self> {
        bincode::serialize_into(&mut inner, &frames).map_err(encode_err)?;
        Ok(Self { inner, frames, written: 0 })
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> TrajectoryWriter for BincodeWriter<W> {
    fn write_frame(&mut self, frame: &Snapshot) -> Result<()> {
        bincode::serialize_into(&mut self.inner, frame).map_err(encode_err)?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.inner.flush()?;
        check_frame_count(self.frames, self.written)
    }
}

/// Concatenated MessagePack frames.
pub struct MessagePackWriter<W: Write> {
    inner: W,
}

impl<W: Write> MessagePackWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> TrajectoryWriter for MessagePackWriter<W> {
    fn write_frame(&mut self, frame: &Snapshot) -> Result<()> {
        rmp_serde::encode::write(&mut self.inner, frame).map_err(encode_err)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }
}

/// Writes the last state as a CSV table with the trajectory header.
pub fn write_final_state(path: &Path, frame: &Snapshot) -> Result<()> {
    let mut writer = CsvTrajectoryWriter::new(BufWriter::new(File::create(path)?))?;
    writer.write_frame(frame)?;
    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(step: u32) -> Snapshot {
        Snapshot {
            step,
            time: step as f64 * 0.5,
            x: vec![1.0, -1.0],
            y: vec![2.0, -2.0],
            z: vec![3.0, -3.0],
            ex: vec![1.0, 0.0],
            ey: vec![0.0, 1.0],
            ez: vec![0.0, 0.0],
        }
    }

    #[test]
    fn csv_rows_follow_header() {
        let mut writer = CsvTrajectoryWriter::new(Vec::new()).unwrap();
        writer.write_frame(&frame(4)).unwrap();
        writer.finish().unwrap();
        let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], CSV_HEADER.join(","));
        assert_eq!(lines[1], "Particles0,1,2,3,1,0,0,4");
        assert_eq!(lines[2], "Particles1,-1,-2,-3,0,1,0,4");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn binary_layout() {
        let mut writer = BinaryTrajectoryWriter::new(Vec::new(), 2, 1, 10).unwrap();
        writer.write_frame(&frame(7)).unwrap();
        writer.finish().unwrap();
        let bytes = writer.into_inner();
        assert_eq!(bytes.len(), 8 + 4 + 6 * 2 * 8);

        let i32_at = |at: usize| i32::from_ne_bytes(bytes[at..at + 4].try_into().unwrap());
        let f64_at = |at: usize| f64::from_ne_bytes(bytes[at..at + 8].try_into().unwrap());
        assert_eq!(i32_at(0), 2);
        assert_eq!(i32_at(4), 1);
        assert_eq!(i32_at(8), 7);
        // x then y, each two particles wide
        assert_eq!(f64_at(12), 1.0);
        assert_eq!(f64_at(20), -1.0);
        assert_eq!(f64_at(28), 2.0);
        // last value is ez of particle 1
        assert_eq!(f64_at(12 + 11 * 8), 0.0);
    }

    #[test]
    fn binary_rejects_wrong_frame_count() {
        let mut writer = BinaryTrajectoryWriter::new(Vec::new(), 2, 3, 10).unwrap();
        writer.write_frame(&frame(1)).unwrap();
        assert!(matches!(writer.finish(), Err(SimError::Encode(_))));
    }

    #[test]
    fn binary_rejects_wrong_particle_count() {
        let mut writer = BinaryTrajectoryWriter::new(Vec::new(), 3, 1, 10).unwrap();
        assert!(matches!(writer.write_frame(&frame(1)), Err(SimError::LengthMismatch { expected: 3, found: 2 })));
    }

    #[test]
    fn binary_refuses_step_counts_beyond_i32_before_writing() {
        let mut sink = Vec::new();
        let too_many = i32::MAX as u32 + 1;
        let err = BinaryTrajectoryWriter::new(&mut sink, 2, 1, too_many).err().unwrap();
        assert!(matches!(err, SimError::Encode(_)));
        assert!(sink.is_empty());

        assert!(BinaryTrajectoryWriter::new(&mut sink, 2, 1, i32::MAX as u32).is_ok());
        assert_eq!(sink.len(), 8);
    }

    #[test]
    fn json_lines_keep_every_bit_of_f64() {
        let mut exact = frame(1);
        exact.x = vec![3.9021868923627396, 0.1 + 0.2];
        let mut writer = JsonLinesWriter::new(Vec::new());
        writer.write_frame(&exact).unwrap();
        let text = String::from_utf8(writer.into_inner()).unwrap();
        let back: Snapshot = serde_json::from_str(text.trim_end()).unwrap();
        assert_eq!(back.x[0].to_bits(), exact.x[0].to_bits());
        assert_eq!(back.x[1].to_bits(), exact.x[1].to_bits());
    }

    #[test]
    fn json_lines_read_back() {
        let mut writer = JsonLinesWriter::new(Vec::new());
        writer.write_frame(&frame(1)).unwrap();
        writer.write_frame(&frame(2)).unwrap();
        writer.finish().unwrap();
        let text = String::from_utf8(writer.into_inner()).unwrap();
        let frames: Vec<Snapshot> = text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(frames, vec![frame(1), frame(2)]);
    }

    #[test]
    fn bincode_count_then_frames() {
        let mut writer = BincodeWriter::new(Vec::new(), 2).unwrap();
        writer.write_frame(&frame(1)).unwrap();
        writer.write_frame(&frame(2)).unwrap();
        writer.finish().unwrap();
        let bytes = writer.into_inner();
        let mut reader = bytes.as_slice();
        let count: u32 = bincode::deserialize_from(&mut reader).unwrap();
        assert_eq!(count, 2);
        let first: Snapshot = bincode::deserialize_from(&mut reader).unwrap();
        let second: Snapshot = bincode::deserialize_from(&mut reader).unwrap();
        assert_eq!((first, second), (frame(1), frame(2)));
    }

    #[test]
    fn messagepack_stream_reads_back() {
        let mut writer = MessagePackWriter::new(Vec::new());
        writer.write_frame(&frame(3)).unwrap();
        writer.write_frame(&frame(6)).unwrap();
        writer.finish().unwrap();
        let bytes = writer.into_inner();
        let mut de = rmp_serde::Deserializer::new(bytes.as_slice());
        let a: Snapshot = serde::Deserialize::deserialize(&mut de).unwrap();
        let b: Snapshot = serde::Deserialize::deserialize(&mut de).unwrap();
        assert_eq!((a, b), (frame(3), frame(6)));
    }

    #[test]
    fn output_paths() {
        assert_eq!(trajectory_path("run", OutputFormat::Binary), PathBuf::from("run_trajectory.bin"));
        assert_eq!(trajectory_path("out/a", OutputFormat::Json), PathBuf::from("out/a_trajectory.jsonl"));
        assert_eq!(final_state_path("run"), PathBuf::from("run_final_state.csv"));
    }
}
