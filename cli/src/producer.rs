use coredump::{DumpError, MemoryRegion, SinkWriter, SnapshotProducer, SnapshotSink};
use log::debug;
use std::io::{self, Read};

/// Streams any reader into the volume in place of a memory snapshot
pub struct ReaderProducer<R> {
    reader: R,
}

impl<R: Read> ReaderProducer<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: Read> SnapshotProducer for ReaderProducer<R> {
    fn produce(&mut self, regions: &[MemoryRegion], sink: &mut dyn SnapshotSink) -> coredump::Result<()> {
        debug!("producer: {} regions ignored, streaming reader", regions.len());
        let mut writer = SinkWriter(sink);
        io::copy(&mut self.reader, &mut writer).map_err(|e| {
            // Volume errors come back wrapped; anything else is the reader's
            e.get_ref()
                .and_then(|inner| inner.downcast_ref::<DumpError>())
                .copied()
                .unwrap_or(DumpError::SnapshotFailed)
        })?;
        Ok(())
    }
}
