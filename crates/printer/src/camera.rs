//! Chamber-camera stream client.
//!
//! The printer exposes its chamber camera as a raw TCP service: after an
//! 80-byte authentication preamble the device pushes length-prefixed JPEG
//! frames for as long as the socket stays open.  [`FrameReader`] is generic
//! over the transport so the framing can be tested without a device.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// TCP port of the chamber stream service.
pub const DEFAULT_CAMERA_PORT: u16 = 6000;

/// Fixed username for the chamber stream; the access code acts as password.
const CAMERA_USERNAME: &str = "bblp";

const AUTH_PACKET_LEN: usize = 80;
const FRAME_HEADER_LEN: usize = 16;

/// Anything larger than this is a corrupt header, not a JPEG.
const MAX_FRAME_LEN: u32 = 4 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum CameraError {
    #[error("camera stream I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("camera announced an implausible frame length of {0} bytes")]
    InvalidFrameLength(u32),
}

/// Where and how to reach the chamber stream.
#[derive(Debug, Clone)]
pub struct CameraConfig {
    pub host: String,
    pub port: u16,
    pub access_code: String,
}

impl CameraConfig {
    /// Connect, authenticate, and hand back a frame reader.
    pub async fn connect(&self) -> Result<FrameReader<TcpStream>, CameraError> {
        let mut stream = TcpStream::connect((self.host.as_str(), self.port)).await?;
        stream.write_all(&self.auth_packet()).await?;
        Ok(FrameReader::new(stream))
    }

    /// The 80-byte preamble the device expects before it starts streaming:
    /// two little-endian magic words, eight reserved zero bytes, then the
    /// username and access code in 32-byte zero-padded fields.
    pub fn auth_packet(&self) -> [u8; AUTH_PACKET_LEN] {
        let mut packet = [0u8; AUTH_PACKET_LEN];
        packet[0..4].copy_from_slice(&0x40u32.to_le_bytes());
        packet[4..8].copy_from_slice(&0x3000u32.to_le_bytes());
        write_padded(&mut packet[16..48], CAMERA_USERNAME);
        write_padded(&mut packet[48..80], &self.access_code);
        packet
    }
}

/// Copy `value` into `field`, truncating if it does not fit.
fn write_padded(field: &mut [u8], value: &str) {
    let bytes = value.as_bytes();
    let len = bytes.len().min(field.len());
    field[..len].copy_from_slice(&bytes[..len]);
}

/// Reads length-prefixed JPEG frames from an authenticated stream.
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Read the next JPEG frame.
    ///
    /// Each frame is announced by a 16-byte header whose first four bytes
    /// are the little-endian payload length; the remaining twelve are
    /// reserved and ignored.
    pub async fn next_frame(&mut self) -> Result<Vec<u8>, CameraError> {
        let mut header = [0u8; FRAME_HEADER_LEN];
        self.inner.read_exact(&mut header).await?;

        let len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        if len == 0 || len > MAX_FRAME_LEN {
            return Err(CameraError::InvalidFrameLength(len));
        }

        let mut frame = vec![0u8; len as usize];
        self.inner.read_exact(&mut frame).await?;
        Ok(frame)
    }
}
