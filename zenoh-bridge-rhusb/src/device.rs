//! RH-USB device access: poll commands out, line frames in.
//!
//! The sensor answers each `PA\r\n` command with one line of the form
//! `<humidity>,<temperature>`, optionally wrapped in `>`/`<` markers.
//! Humidity always comes first.

use chrono::{DateTime, Utc};
use sensorbridge_common::Reading;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio_serial::SerialStream;
use tracing::{debug, info};

/// Default command requesting one reading.
pub const DEFAULT_POLL_COMMAND: &[u8] = b"PA\r\n";

/// Default framing characters stripped from each line.
pub const DEFAULT_FRAME_MARKERS: &str = "<>";

/// Errors raised by the device transport.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("Failed to open device {path}: {message}")]
    OpenFailed { path: String, message: String },
    #[error("Failed to write poll command: {0}")]
    Write(#[source] std::io::Error),
    #[error("Failed to read from device: {0}")]
    Read(#[source] std::io::Error),
    #[error("Device stream closed")]
    Closed,
}

/// A frame that could not be decoded into a reading.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Malformed frame {frame:?}: {reason}")]
    MalformedFrame { frame: String, reason: &'static str },
}

impl ParseError {
    fn malformed(frame: &str, reason: &'static str) -> Self {
        Self::MalformedFrame {
            frame: frame.to_string(),
            reason,
        }
    }
}

/// Decodes `humidity,temperature` frames.
#[derive(Debug, Clone)]
pub struct FrameParser {
    markers: Vec<char>,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_MARKERS)
    }
}

impl FrameParser {
    /// Create a parser stripping every character of `markers` from frame ends.
    pub fn new(markers: &str) -> Self {
        Self {
            markers: markers.chars().collect(),
        }
    }

    /// Parse a frame, stamping the reading with the current time.
    pub fn parse(&self, line: &str) -> Result<Reading, ParseError> {
        self.parse_at(line, Utc::now())
    }

    /// Parse a frame taken at `timestamp`.
    pub fn parse_at(&self, line: &str, timestamp: DateTime<Utc>) -> Result<Reading, ParseError> {
        let body = line
            .trim()
            .trim_matches(|c: char| self.markers.contains(&c))
            .trim();

        let fields: Vec<&str> = body.split(',').map(str::trim).collect();
        if fields.len() < 2 {
            return Err(ParseError::malformed(
                line,
                "expected <humidity>,<temperature>",
            ));
        }

        let (humidity, temperature) = (fields[0], fields[1]);
        if humidity.is_empty() || temperature.is_empty() {
            return Err(ParseError::malformed(line, "empty field"));
        }

        Ok(Reading::new(timestamp, humidity, temperature))
    }
}

/// Owns the sensor byte stream.
///
/// Generic over the stream so a serial port and in-memory streams are
/// driven the same way.
pub struct DeviceReader<S> {
    name: String,
    stream: BufReader<S>,
    poll_command: Vec<u8>,
    parser: FrameParser,
    buf: Vec<u8>,
}

impl DeviceReader<SerialStream> {
    /// Open a serial device (8N1, no flow control).
    pub fn open(path: &str, baud_rate: u32) -> Result<Self, DeviceError> {
        let builder = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None);

        let serial = SerialStream::open(&builder).map_err(|e| DeviceError::OpenFailed {
            path: path.to_string(),
            message: e.to_string(),
        })?;

        info!(device = %path, baud_rate, "Serial port opened");

        Ok(Self::new(path, serial))
    }
}

impl<S> DeviceReader<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an already opened stream.
    pub fn new(name: impl Into<String>, stream: S) -> Self {
        Self {
            name: name.into(),
            stream: BufReader::new(stream),
            poll_command: DEFAULT_POLL_COMMAND.to_vec(),
            parser: FrameParser::default(),
            buf: Vec::new(),
        }
    }

    /// Replace the poll command.
    pub fn with_poll_command(mut self, command: impl Into<Vec<u8>>) -> Self {
        self.poll_command = command.into();
        self
    }

    /// Replace the framing markers.
    pub fn with_frame_markers(mut self, markers: &str) -> Self {
        self.parser = FrameParser::new(markers);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Request one reading.
    pub async fn send_poll_command(&mut self) -> Result<(), DeviceError> {
        self.stream
            .write_all(&self.poll_command)
            .await
            .map_err(DeviceError::Write)?;
        self.stream.flush().await.map_err(DeviceError::Write)?;

        debug!(device = %self.name, "Poll command sent");
        Ok(())
    }

    /// Wait for the next `\n`-terminated frame.
    ///
    /// Returns `Ok(None)` at end of stream. Cancel safe: bytes of a partially
    /// received frame are kept and completed on the next call.
    pub async fn next_frame(&mut self) -> Result<Option<String>, DeviceError> {
        let n = self
            .stream
            .read_until(b'\n', &mut self.buf)
            .await
            .map_err(DeviceError::Read)?;

        if n == 0 && self.buf.is_empty() {
            return Ok(None);
        }

        let frame = String::from_utf8_lossy(&self.buf).into_owned();
        self.buf.clear();
        Ok(Some(frame))
    }

    /// Decode a received frame into a reading.
    pub fn on_line(&self, line: &str) -> Result<Reading, ParseError> {
        self.parser.parse(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tokio_test::io::Builder;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_plain_frame() {
        let reading = FrameParser::default().parse_at("45,22", ts()).unwrap();
        assert_eq!(reading.humidity(), "45");
        assert_eq!(reading.temperature(), "22");
        assert_eq!(reading.timestamp(), ts());
    }

    #[test]
    fn test_parse_marker_wrapped_frame() {
        let parser = FrameParser::default();
        for line in [">45,22<", ">45,22", "45,22<", "  >45,22<\r\n", "> 45 , 22 <\n"] {
            let reading = parser.parse(line).unwrap();
            assert_eq!(reading.humidity(), "45", "line {:?}", line);
            assert_eq!(reading.temperature(), "22", "line {:?}", line);
        }
    }

    #[test]
    fn test_parse_keeps_text_verbatim() {
        let reading = FrameParser::default().parse(">41.7,-3.10\r\n").unwrap();
        assert_eq!(reading.humidity(), "41.7");
        assert_eq!(reading.temperature(), "-3.10");
    }

    #[test]
    fn test_parse_ignores_extra_fields() {
        let reading = FrameParser::default().parse("45,22,F").unwrap();
        assert_eq!(reading.humidity(), "45");
        assert_eq!(reading.temperature(), "22");
    }

    #[test]
    fn test_parse_too_few_fields() {
        let parser = FrameParser::default();
        for line in ["", ">", "45", ">45<", "garbage\r\n"] {
            assert!(
                matches!(parser.parse(line), Err(ParseError::MalformedFrame { .. })),
                "line {:?}",
                line
            );
        }
    }

    #[test]
    fn test_parse_empty_field() {
        let parser = FrameParser::default();
        assert!(parser.parse(",22").is_err());
        assert!(parser.parse("45,").is_err());
        assert!(parser.parse(">,<").is_err());
    }

    #[test]
    fn test_custom_markers() {
        let parser = FrameParser::new("[]");
        let reading = parser.parse("[45,22]").unwrap();
        assert_eq!(reading.temperature(), "22");

        // '>' is no longer a marker and stays part of the field
        let reading = parser.parse(">45,22").unwrap();
        assert_eq!(reading.humidity(), ">45");
    }

    #[test]
    fn test_blank_and_marker_only_frames_are_malformed() {
        let parser = FrameParser::default();
        for line in ["\r\n", ">\r\n", "><", " > \n"] {
            assert!(
                matches!(parser.parse(line), Err(ParseError::MalformedFrame { .. })),
                "line {:?}",
                line
            );
        }
    }

    #[tokio::test]
    async fn test_poll_and_read_frame() {
        let mock = Builder::new()
            .write(b"PA\r\n")
            .read(b">45,22<\r\n")
            .build();

        let mut device = DeviceReader::new("mock", mock);
        device.send_poll_command().await.unwrap();

        let frame = device.next_frame().await.unwrap().unwrap();
        assert_eq!(frame, ">45,22<\r\n");

        let reading = device.on_line(&frame).unwrap();
        assert_eq!(reading.humidity(), "45");
        assert_eq!(reading.temperature(), "22");
    }

    #[tokio::test]
    async fn test_frame_split_across_reads() {
        let mock = Builder::new().read(b">45,").read(b"22<\n").build();

        let mut device = DeviceReader::new("mock", mock);
        let frame = device.next_frame().await.unwrap().unwrap();
        assert_eq!(frame, ">45,22<\n");
    }

    #[tokio::test]
    async fn test_end_of_stream() {
        let mock = Builder::new().read(b"45,22\n").build();

        let mut device = DeviceReader::new("mock", mock);
        assert!(device.next_frame().await.unwrap().is_some());
        assert!(device.next_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_lossy() {
        let mock = Builder::new().read(b"4\xff5,22\n").build();

        let mut device = DeviceReader::new("mock", mock);
        let frame = device.next_frame().await.unwrap().unwrap();
        assert!(frame.ends_with("5,22\n"));
    }

    #[tokio::test]
    async fn test_custom_poll_command() {
        let mock = Builder::new().write(b"READ\n").build();

        let mut device = DeviceReader::new("mock", mock).with_poll_command(b"READ\n".to_vec());
        device.send_poll_command().await.unwrap();
    }

    #[tokio::test]
    async fn test_open_missing_device() {
        let result = DeviceReader::open("/nonexistent/ttyRHUSB", 9600);
        match result {
            Err(DeviceError::OpenFailed { path, .. }) => {
                assert_eq!(path, "/nonexistent/ttyRHUSB")
            }
            Err(e) => panic!("Expected OpenFailed, got {}", e),
            Ok(_) => panic!("Expected OpenFailed, device opened"),
        }
    }
}
