//! Framing layer: length-prefixed frames over an ordered byte stream.
//!
//! Each frame is its payload prefixed by an unsigned 32-bit
//! little-endian length that excludes the prefix itself. A clean end
//! of stream between frames is a regular end of input; an end of
//! stream inside a prefix or payload is a [`TruncatedFrame`] failure,
//! since a corrupt length prefix cannot be resynchronized.
//!
//! [`TruncatedFrame`]: crate::Error::TruncatedFrame

use std::io;

use tracing::trace;

use crate::{Config, Error, Result};

/// Read a single frame payload; `None` at a clean end of stream.
pub fn read_frame<R>(reader: R, config: &Config) -> Result<Option<Vec<u8>>>
where
    R: io::Read,
{
    read_frame_at(reader, config, 0)
}

/// Write a single frame.
pub fn write_frame<W>(mut writer: W, payload: &[u8]) -> Result<()>
where
    W: io::Write,
{
    let len = u32::try_from(payload.len()).map_err(|_| Error::FrameTooLarge {
        len: payload.len(),
        max: u32::MAX as usize,
    })?;

    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(payload)?;
    writer.flush()?;

    trace!(len, "frame written");

    Ok(())
}

pub(crate) fn read_frame_at<R>(
    mut reader: R,
    config: &Config,
    offset: u64,
) -> Result<Option<Vec<u8>>>
where
    R: io::Read,
{
    let mut prefix = [0u8; 4];
    let got = fill(&mut reader, &mut prefix)?;

    if got == 0 {
        return Ok(None);
    }

    if got < prefix.len() {
        return Err(Error::TruncatedFrame {
            offset,
            expected: prefix.len(),
            got,
        });
    }

    let len = u32::from_le_bytes(prefix) as usize;

    // checked before the allocation so a hostile prefix cannot balloon
    // the process
    if len > config.max_frame_size {
        return Err(Error::FrameTooLarge {
            len,
            max: config.max_frame_size,
        });
    }

    let mut payload = vec![0u8; len];
    let got = fill(&mut reader, &mut payload)?;

    if got < len {
        return Err(Error::TruncatedFrame {
            offset,
            expected: len,
            got,
        });
    }

    trace!(len, offset, "frame read");

    Ok(Some(payload))
}

/// Read until the buffer is full or the stream ends, returning the
/// number of bytes read.
fn fill<R>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize>
where
    R: io::Read,
{
    let mut filled = 0;

    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => (),
            Err(e) => return Err(e),
        }
    }

    Ok(filled)
}

/// Frame source tracking the stream offset for diagnostics.
#[derive(Debug)]
pub struct FrameReader<R> {
    reader: R,
    config: Config,
    offset: u64,
}

impl<R> FrameReader<R>
where
    R: io::Read,
{
    /// Wrap a readable stream.
    pub const fn new(reader: R, config: Config) -> Self {
        Self {
            reader,
            config,
            offset: 0,
        }
    }

    /// Offset of the next unread frame.
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    /// Read the next frame payload; `None` at a clean end of stream.
    pub fn read_frame(&mut self) -> Result<Option<Vec<u8>>> {
        let frame =
            read_frame_at(&mut self.reader, &self.config, self.offset)?;

        if let Some(payload) = &frame {
            self.offset += 4 + payload.len() as u64;
        }

        Ok(frame)
    }

    /// Return the inner stream.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R> Iterator for FrameReader<R>
where
    R: io::Read,
{
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_frame().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn roundtrip_preserves_payload() {
        let mut stream = Vec::new();

        write_frame(&mut stream, b"hello").unwrap();
        write_frame(&mut stream, b"").unwrap();
        write_frame(&mut stream, b"world!").unwrap();

        let mut frames = FrameReader::new(stream.as_slice(), Config::default());

        assert_eq!(frames.read_frame().unwrap().unwrap(), b"hello");
        assert_eq!(frames.read_frame().unwrap().unwrap(), b"");
        assert_eq!(frames.read_frame().unwrap().unwrap(), b"world!");
        assert!(frames.read_frame().unwrap().is_none());
    }

    #[test]
    fn truncated_payload_is_detected() {
        // declares 6 bytes, delivers 2
        let stream = [6u8, 0, 0, 0, 0xaa, 0xbb];

        let err = read_frame(stream.as_slice(), &Config::default()).unwrap_err();

        match err {
            Error::TruncatedFrame {
                offset,
                expected,
                got,
            } => {
                assert_eq!(offset, 0);
                assert_eq!(expected, 6);
                assert_eq!(got, 2);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn truncated_prefix_is_detected() {
        let stream = [6u8, 0];

        let err = read_frame(stream.as_slice(), &Config::default()).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::TruncatedFrame);
    }

    #[test]
    fn hostile_prefix_is_bounded() {
        let config = *Config::default().with_max_frame_size(16);
        let stream = [0xffu8, 0xff, 0xff, 0xff];

        let err = read_frame(stream.as_slice(), &config).unwrap_err();

        match err {
            Error::FrameTooLarge { len, max } => {
                assert_eq!(len, 0xffff_ffff);
                assert_eq!(max, 16);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn offsets_accumulate_across_frames() {
        let mut stream = Vec::new();

        write_frame(&mut stream, b"abc").unwrap();
        write_frame(&mut stream, b"defgh").unwrap();

        let mut frames = FrameReader::new(stream.as_slice(), Config::default());

        assert_eq!(frames.offset(), 0);
        frames.read_frame().unwrap();
        assert_eq!(frames.offset(), 7);
        frames.read_frame().unwrap();
        assert_eq!(frames.offset(), 16);
    }
}
