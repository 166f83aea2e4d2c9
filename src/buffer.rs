use std::fmt::{self, Debug, Formatter};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use bytes::{Bytes, BytesMut};

use crate::error::BoxError;
use crate::field::PartInfo;
use crate::handler::PartHandler;
use crate::headers::PartHeaders;

/// Where the decoded bytes of a part go, chosen once per part by a
/// [`SinkDecider`].
pub enum Sink {
    /// Collect the part in memory.
    Memory,
    /// Create (or truncate) the file at this path and write the part to it.
    File(PathBuf),
    /// Write the part to an arbitrary writer.
    Writer(Box<dyn Write + Send>),
    /// Drop the part's bytes.
    Discard,
}

impl Debug for Sink {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Sink::Memory => f.write_str("Memory"),
            Sink::File(path) => f.debug_tuple("File").field(path).finish(),
            Sink::Writer(_) => f.write_str("Writer(..)"),
            Sink::Discard => f.write_str("Discard"),
        }
    }
}

/// What a [`Sink`] holds once its part has ended.
pub enum PartOutput {
    Memory(Bytes),
    File(PathBuf),
    Writer(Box<dyn Write + Send>),
    Discarded,
}

impl Debug for PartOutput {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            PartOutput::Memory(bytes) => f.debug_tuple("Memory").field(bytes).finish(),
            PartOutput::File(path) => f.debug_tuple("File").field(path).finish(),
            PartOutput::Writer(_) => f.write_str("Writer(..)"),
            PartOutput::Discarded => f.write_str("Discarded"),
        }
    }
}

/// Chooses a [`Sink`] for each part after seeing its first bytes.
///
/// Any closure `FnMut(&PartInfo, &[u8]) -> Result<Sink, BoxError>` is a
/// decider.
pub trait SinkDecider {
    /// Called exactly once per part with up to `threshold` leading bytes of
    /// its decoded content. Fewer bytes are passed only when the part is
    /// shorter than the threshold.
    fn decide(&mut self, part: &PartInfo, lookahead: &[u8]) -> Result<Sink, BoxError>;

    /// Called at the end of every part with the filled sink.
    fn complete(&mut self, part: PartInfo, output: PartOutput) -> Result<(), BoxError> {
        let _ = (part, output);
        Ok(())
    }
}

impl<F> SinkDecider for F
where
    F: FnMut(&PartInfo, &[u8]) -> Result<Sink, BoxError>,
{
    fn decide(&mut self, part: &PartInfo, lookahead: &[u8]) -> Result<Sink, BoxError> {
        self(part, lookahead)
    }
}

enum ActiveSink {
    Memory(BytesMut),
    File { path: PathBuf, file: BufWriter<File> },
    Writer(Box<dyn Write + Send>),
    Discard,
}

impl ActiveSink {
    fn open(sink: Sink) -> crate::Result<ActiveSink> {
        Ok(match sink {
            Sink::Memory => ActiveSink::Memory(BytesMut::new()),
            Sink::File(path) => {
                let file = File::create(&path).map_err(crate::Error::SinkWrite)?;
                ActiveSink::File {
                    path,
                    file: BufWriter::new(file),
                }
            }
            Sink::Writer(writer) => ActiveSink::Writer(writer),
            Sink::Discard => ActiveSink::Discard,
        })
    }

    fn write(&mut self, bytes: &[u8]) -> crate::Result<()> {
        match self {
            ActiveSink::Memory(buf) => {
                buf.extend_from_slice(bytes);
                Ok(())
            }
            ActiveSink::File { file, .. } => file.write_all(bytes).map_err(crate::Error::SinkWrite),
            ActiveSink::Writer(writer) => writer.write_all(bytes).map_err(crate::Error::SinkWrite),
            ActiveSink::Discard => Ok(()),
        }
    }

    fn finish(self) -> crate::Result<PartOutput> {
        Ok(match self {
            ActiveSink::Memory(buf) => PartOutput::Memory(buf.freeze()),
            ActiveSink::File { path, mut file } => {
                file.flush().map_err(crate::Error::SinkWrite)?;
                PartOutput::File(path)
            }
            ActiveSink::Writer(mut writer) => {
                writer.flush().map_err(crate::Error::SinkWrite)?;
                PartOutput::Writer(writer)
            }
            ActiveSink::Discard => PartOutput::Discarded,
        })
    }
}

/// A [`PartHandler`] that holds back the first `threshold` bytes of each
/// part so a [`SinkDecider`] can look at them before choosing where the
/// part goes.
///
/// The decision fires as soon as `threshold` bytes have been seen, or at the
/// end of the part if it is shorter. The held-back bytes are then written to
/// the chosen sink, followed by the rest of the part as it arrives.
pub struct BufferedHandler<D> {
    decider: D,
    threshold: usize,
    lookahead: BytesMut,
    buffering: bool,
    part_bytes: u64,
    sink: Option<ActiveSink>,
    part: Option<PartInfo>,
    next_part_idx: usize,
}

impl<D: SinkDecider> BufferedHandler<D> {
    pub fn new(decider: D, threshold: usize) -> BufferedHandler<D> {
        BufferedHandler {
            decider,
            threshold,
            lookahead: BytesMut::new(),
            buffering: false,
            part_bytes: 0,
            sink: None,
            part: None,
            next_part_idx: 0,
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn decider(&self) -> &D {
        &self.decider
    }

    pub fn decider_mut(&mut self) -> &mut D {
        &mut self.decider
    }

    pub fn into_decider(self) -> D {
        self.decider
    }

    fn decide(&mut self) -> crate::Result<()> {
        let part = self.part.as_ref().ok_or(crate::Error::Malformed {
            reason: "part data outside of a part",
        })?;

        trace!(
            "deciding sink for part {} with {} lookahead bytes",
            part.index(),
            self.lookahead.len()
        );

        let sink = self
            .decider
            .decide(part, &self.lookahead)
            .map_err(crate::Error::Handler)?;
        let mut sink = ActiveSink::open(sink)?;
        sink.write(&self.lookahead)?;

        self.lookahead.clear();
        self.sink = Some(sink);
        self.buffering = false;
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> crate::Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        match self.sink.as_mut() {
            Some(sink) => sink.write(bytes),
            None => Err(crate::Error::Malformed {
                reason: "part data outside of a part",
            }),
        }
    }
}

impl<D: SinkDecider> PartHandler for BufferedHandler<D> {
    fn begin_part(&mut self, headers: &PartHeaders) -> crate::Result<()> {
        let part = PartInfo::from_headers(self.next_part_idx, headers)?;
        self.next_part_idx += 1;

        self.lookahead.clear();
        self.part_bytes = 0;
        self.buffering = true;
        self.sink = None;
        self.part = Some(part);
        Ok(())
    }

    fn data(&mut self, bytes: &[u8]) -> crate::Result<()> {
        if !self.buffering {
            self.part_bytes += bytes.len() as u64;
            return self.write(bytes);
        }

        let room = self.threshold - self.lookahead.len();
        let take = room.min(bytes.len());
        self.lookahead.extend_from_slice(&bytes[..take]);
        self.part_bytes += bytes.len() as u64;

        if self.part_bytes >= self.threshold as u64 {
            self.decide()?;
            self.write(&bytes[take..])?;
        }
        Ok(())
    }

    fn end_part(&mut self) -> crate::Result<()> {
        if self.buffering {
            self.decide()?;
        }

        let output = match self.sink.take() {
            Some(sink) => sink.finish()?,
            None => PartOutput::Discarded,
        };
        let part = self.part.take().ok_or(crate::Error::Malformed {
            reason: "part ended before it began",
        })?;

        self.decider.complete(part, output).map_err(crate::Error::Handler)
    }
}
