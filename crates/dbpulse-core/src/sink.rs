//! Sample stream shared by concurrent scrapers.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::mpsc;

use crate::context::ScrapeContext;
use crate::error::{CancelReason, ScrapeError};
use crate::metric::MetricSample;

/// Create a bounded sample stream.
pub fn channel(capacity: usize) -> (MetricSink, mpsc::Receiver<MetricSample>) {
    let (tx, rx) = mpsc::channel(capacity);
    (MetricSink::new(tx), rx)
}

/// Producer half of the sample stream.
///
/// Cloning shares the emitted-sample counter; [`counted`](Self::counted)
/// starts a fresh one.
#[derive(Debug, Clone)]
pub struct MetricSink {
    tx: mpsc::Sender<MetricSample>,
    emitted: Arc<AtomicUsize>,
}

impl MetricSink {
    pub fn new(tx: mpsc::Sender<MetricSample>) -> Self {
        Self {
            tx,
            emitted: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Same stream, own counter.
    pub fn counted(&self) -> Self {
        Self::new(self.tx.clone())
    }

    /// Samples successfully handed to the stream through this counter.
    pub fn emitted(&self) -> usize {
        self.emitted.load(Ordering::Relaxed)
    }

    /// Send one sample, waiting for capacity unless the context ends first.
    pub async fn emit(&self, ctx: &ScrapeContext, sample: MetricSample) -> Result<(), ScrapeError> {
        ctx.run(self.tx.send(sample))
            .await?
            .map_err(|_| ScrapeError::Cancelled(CancelReason::ReceiverDropped))?;
        self.emitted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::{MetricDesc, MetricKind};
    use tokio_util::sync::CancellationToken;

    fn sample(value: f64) -> MetricSample {
        let desc = Arc::new(MetricDesc::new("mysql_test", "test", MetricKind::Gauge, &[]));
        MetricSample::new(&desc, value)
    }

    #[tokio::test]
    async fn emit_preserves_order_and_counts() {
        let ctx = ScrapeContext::new(CancellationToken::new());
        let (sink, mut rx) = channel(4);

        for v in [1.0, 2.0, 3.0] {
            sink.emit(&ctx, sample(v)).await.unwrap();
        }
        assert_eq!(sink.emitted(), 3);

        drop(sink);
        let mut got = Vec::new();
        while let Some(s) = rx.recv().await {
            got.push(s.value());
        }
        assert_eq!(got, vec![1.0, 2.0, 3.0]);
    }

    #[tokio::test]
    async fn counted_sinks_count_separately() {
        let ctx = ScrapeContext::new(CancellationToken::new());
        let (sink, _rx) = channel(4);
        let a = sink.counted();
        let b = sink.counted();

        a.emit(&ctx, sample(1.0)).await.unwrap();
        assert_eq!(a.emitted(), 1);
        assert_eq!(b.emitted(), 0);
    }

    #[tokio::test]
    async fn full_sink_honours_cancellation() {
        let ctx = ScrapeContext::new(CancellationToken::new());
        let (sink, _rx) = channel(1);
        sink.emit(&ctx, sample(1.0)).await.unwrap();

        let canceller = ctx.clone();
        tokio::spawn(async move { canceller.cancel() });

        let err = sink.emit(&ctx, sample(2.0)).await.unwrap_err();
        assert_eq!(err, ScrapeError::Cancelled(CancelReason::Cancelled));
        assert_eq!(sink.emitted(), 1);
    }

    #[tokio::test]
    async fn dropped_receiver_is_reported() {
        let ctx = ScrapeContext::new(CancellationToken::new());
        let (sink, rx) = channel(1);
        drop(rx);

        let err = sink.emit(&ctx, sample(1.0)).await.unwrap_err();
        assert_eq!(err, ScrapeError::Cancelled(CancelReason::ReceiverDropped));
    }
}
