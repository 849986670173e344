//! Snapshot producers — the metrics source a push target reads from.

use std::io;

/// Renders current metric state in Prometheus text exposition format.
///
/// Called once per tick from the push task, possibly from several push
/// targets at the same time, so implementations must tolerate concurrent
/// readers.
pub trait SnapshotProducer: Send + Sync + 'static {
    /// Append newline-terminated `name{labels} value` / `name value`
    /// lines to `out`.
    fn write_snapshot(&self, out: &mut Vec<u8>) -> io::Result<()>;
}

impl<F> SnapshotProducer for F
where
    F: Fn(&mut Vec<u8>) -> io::Result<()> + Send + Sync + 'static,
{
    fn write_snapshot(&self, out: &mut Vec<u8>) -> io::Result<()> {
        self(out)
    }
}

/// Pin a closure's signature so it can be passed as a producer without
/// annotating its return type.
pub fn from_fn<F>(f: F) -> F
where
    F: Fn(&mut Vec<u8>) -> io::Result<()> + Send + Sync + 'static,
{
    f
}

/// Two producers written back to back.
#[derive(Debug, Clone)]
pub struct Chain<A, B> {
    first: A,
    second: B,
}

impl<A, B> SnapshotProducer for Chain<A, B>
where
    A: SnapshotProducer,
    B: SnapshotProducer,
{
    fn write_snapshot(&self, out: &mut Vec<u8>) -> io::Result<()> {
        self.first.write_snapshot(out)?;
        self.second.write_snapshot(out)
    }
}

pub trait SnapshotProducerExt: SnapshotProducer + Sized {
    /// Append `next`'s output after this producer's.
    fn chain<B: SnapshotProducer>(self, next: B) -> Chain<Self, B> {
        Chain {
            first: self,
            second: next,
        }
    }
}

impl<P: SnapshotProducer> SnapshotProducerExt for P {}
