//! Segment writing
//!
//! - [`SegmentWriter`]: validates, splits and streams segments to the cluster
//! - [`WriterConfig`]: payload limit, commit policy and contiguity flags
//! - [`WriterRequest`] / [`WriterResponse`]: the wire protocol

pub mod messages;
pub mod segment_writer;

pub use messages::{WriterCommand, WriterRequest, WriterResponse};
pub use segment_writer::{SegmentWriter, WriterConfig, WriterState};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{Channel, ChannelCache};
    use crate::error::{Error, Result};
    use crate::iterator::{IteratorState, SegmentIterator, AUTO_SPAN};
    use crate::telem::{DataType, Rate, Series, TimeRange, TimeStamp};
    use crate::transport::{Codec, LoopbackCluster, Stream};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    const TEMP: u32 = 1;
    const TIME: u32 = 2;
    const PRESSURE: u32 = 3;

    async fn cluster() -> (LoopbackCluster, ChannelCache) {
        let cluster = LoopbackCluster::new("loopback:writer", Codec::Json);
        for channel in [
            Channel::new(TEMP, "temp", DataType::Float64).rate(Rate::hz(1e9)),
            Channel::index(TIME, "time"),
            Channel::new(PRESSURE, "pressure", DataType::Float32).indexed_by(TIME),
        ] {
            cluster.create_channel(channel).await.unwrap();
        }
        let channels = cluster.channels().await;
        (cluster, channels)
    }

    async fn writer(
        cluster: &LoopbackCluster,
        channels: &ChannelCache,
        config: WriterConfig,
    ) -> SegmentWriter<crate::transport::loopback::WriterStream> {
        let mut writer = SegmentWriter::new(cluster.open_writer_stream().unwrap(), config);
        writer.open(channels, &[TEMP, TIME, PRESSURE]).await.unwrap();
        writer
    }

    #[tokio::test]
    async fn test_write_commit_and_iterate() {
        let (cluster, channels) = cluster().await;
        let mut w = writer(&cluster, &channels, WriterConfig::default()).await;

        w.write(TEMP, Series::new(vec![1.0f64, 2.0, 3.0]), TimeStamp(0))
            .await
            .unwrap();
        w.write(TEMP, Series::new(vec![4.0f64, 5.0]), TimeStamp(3))
            .await
            .unwrap();
        assert_eq!(w.commit().await.unwrap(), TimeStamp(5));
        w.close().await.unwrap();

        let mut iter = SegmentIterator::new(cluster.open_iterator_stream().unwrap());
        assert!(iter.open(&channels, &[TEMP], TimeRange::MAX).await.unwrap());
        iter.seek_first().await.unwrap();
        let mut values = Vec::new();
        while iter.next(AUTO_SPAN).await.unwrap() {
            for segment in iter.value() {
                values.extend(segment.series.values::<f64>().unwrap());
            }
        }
        assert_eq!(values, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        iter.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_large_write_is_split_on_sample_boundaries() {
        let (cluster, channels) = cluster().await;
        let config = WriterConfig {
            max_payload_bytes: 16 + 8 * 10,
            ..WriterConfig::default()
        };
        let mut w = writer(&cluster, &channels, config).await;

        let values: Vec<f64> = (0..95).map(f64::from).collect();
        w.write(TEMP, Series::new(values), TimeStamp(1_000))
            .await
            .unwrap();
        w.commit().await.unwrap();

        let committed = cluster.committed(TEMP).await;
        assert_eq!(committed.len(), 10);
        assert!(committed.iter().all(|s| s.len() <= 10));
        assert!(committed.windows(2).all(|w| w[0].end == w[1].start));
        assert_eq!(committed[0].start, TimeStamp(1_000));
        assert_eq!(committed[9].end, TimeStamp(1_095));
    }

    #[tokio::test]
    async fn test_payload_smaller_than_a_sample_is_rejected() {
        let (cluster, channels) = cluster().await;
        let config = WriterConfig {
            max_payload_bytes: 20,
            ..WriterConfig::default()
        };
        let mut w = writer(&cluster, &channels, config).await;
        let err = w
            .write(TEMP, Series::new(vec![1.0f64]), TimeStamp(0))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(w.state(), WriterState::Open);
    }

    #[tokio::test]
    async fn test_indexed_channels_share_timestamps() {
        let (cluster, channels) = cluster().await;
        let mut w = writer(&cluster, &channels, WriterConfig::default()).await;

        let stamps = vec![TimeStamp(10), TimeStamp(20), TimeStamp(40)];
        let frame = crate::framer::Frame::from_pairs(vec![
            (PRESSURE, Series::new(vec![1.0f32, 1.5, 2.0])),
            (TIME, Series::new(stamps)),
        ])
        .unwrap();
        w.write_frame(frame, TimeStamp(10)).await.unwrap();
        assert_eq!(w.high_water_mark(TIME), Some(TimeStamp(41)));
        assert_eq!(w.high_water_mark(PRESSURE), Some(TimeStamp(41)));

        // data arriving after its index, in a separate write
        w.write(TIME, Series::new(vec![TimeStamp(41), TimeStamp(50)]), TimeStamp(41))
            .await
            .unwrap();
        w.write(PRESSURE, Series::new(vec![3.0f32, 4.0]), TimeStamp(41))
            .await
            .unwrap();
        assert_eq!(w.commit().await.unwrap(), TimeStamp(51));
    }

    #[tokio::test]
    async fn test_indexed_write_without_index_is_rejected() {
        let (cluster, channels) = cluster().await;
        let mut w = writer(&cluster, &channels, WriterConfig::default()).await;
        let err = w
            .write(PRESSURE, Series::new(vec![1.0f32]), TimeStamp(0))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_validation_failures_keep_session_usable() {
        let (cluster, channels) = cluster().await;
        let mut w = writer(&cluster, &channels, WriterConfig::default()).await;

        let wrong_type = w.write(TEMP, Series::new(vec![1i32]), TimeStamp(0)).await;
        assert!(matches!(wrong_type, Err(Error::Validation(_))));

        w.write(TEMP, Series::new(vec![1.0f64; 4]), TimeStamp(0))
            .await
            .unwrap();
        let gap = w.write(TEMP, Series::new(vec![1.0f64]), TimeStamp(10)).await;
        assert!(matches!(gap, Err(Error::Contiguity(_))));
        assert_eq!(w.high_water_mark(TEMP), Some(TimeStamp(4)));

        let unknown = w.write(99, Series::new(vec![1.0f64]), TimeStamp(4)).await;
        assert!(matches!(unknown, Err(Error::Validation(_))));

        assert_eq!(w.state(), WriterState::Open);
        w.write(TEMP, Series::new(vec![1.0f64]), TimeStamp(4))
            .await
            .unwrap();
    }

    /// Acknowledges every request and records what was sent
    #[derive(Clone, Default)]
    struct Recording {
        sent: Arc<Mutex<Vec<WriterCommand>>>,
        pending: Option<WriterCommand>,
    }

    impl Recording {
        fn sent(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Stream<WriterRequest, WriterResponse> for Recording {
        fn address(&self) -> &str {
            "recording:1"
        }

        async fn send(&mut self, request: WriterRequest) -> Result<()> {
            self.sent.lock().unwrap().push(request.command());
            self.pending = Some(request.command());
            Ok(())
        }

        async fn receive(&mut self) -> Result<WriterResponse> {
            Ok(match self.pending.take() {
                Some(WriterCommand::Commit) => WriterResponse::committed(TimeStamp::ZERO),
                Some(command) => WriterResponse::ok(command),
                None => unreachable!("receive without a request"),
            })
        }

        async fn close_send(&mut self) -> Result<()> {
            Ok(())
        }
    }

    async fn recording_writer() -> (SegmentWriter<Recording>, Recording) {
        let (_, channels) = cluster().await;
        let stream = Recording::default();
        let mut w = SegmentWriter::new(stream.clone(), WriterConfig::default());
        w.open(&channels, &[TEMP, TIME, PRESSURE]).await.unwrap();
        (w, stream)
    }

    #[tokio::test]
    async fn test_rejected_writes_send_nothing() {
        let (mut w, stream) = recording_writer().await;
        w.write(TEMP, Series::new(vec![1.0f64; 4]), TimeStamp(0))
            .await
            .unwrap();
        let sent = stream.sent();
        assert_eq!(sent, 2);

        let wrong_type = w.write(TEMP, Series::new(vec![1i32]), TimeStamp(4)).await;
        assert!(matches!(wrong_type, Err(Error::Validation(_))));
        assert_eq!(stream.sent(), sent);

        let matrix = Series::new(vec![1.0f64; 4]).with_shape(vec![2, 2]).unwrap();
        let rank_two = w.write(TEMP, matrix, TimeStamp(4)).await;
        assert!(matches!(rank_two, Err(Error::Validation(_))));
        assert_eq!(stream.sent(), sent);

        let gap = w.write(TEMP, Series::new(vec![1.0f64]), TimeStamp(5)).await;
        assert!(matches!(gap, Err(Error::Contiguity(_))));
        assert_eq!(stream.sent(), sent);

        let overlap = w.write(TEMP, Series::new(vec![1.0f64]), TimeStamp(3)).await;
        assert!(matches!(overlap, Err(Error::Contiguity(_))));
        assert_eq!(stream.sent(), sent);

        assert_eq!(w.high_water_mark(TEMP), Some(TimeStamp(4)));
        assert_eq!(w.state(), WriterState::Open);
    }

    #[tokio::test]
    async fn test_thousand_single_sample_writes_then_overlap() {
        let (mut w, stream) = recording_writer().await;
        for i in 0..1000 {
            w.write(TEMP, Series::new(vec![i as f64]), TimeStamp(i))
                .await
                .unwrap();
        }
        assert_eq!(w.high_water_mark(TEMP), Some(TimeStamp(1000)));
        assert_eq!(stream.sent(), 1001);

        let err = w
            .write(TEMP, Series::new(vec![0.0f64]), TimeStamp(999))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Contiguity(_)));
        assert_eq!(w.high_water_mark(TEMP), Some(TimeStamp(1000)));
        assert_eq!(stream.sent(), 1001);
    }

    #[tokio::test]
    async fn test_valid_query_keeps_iterator_state() {
        let (cluster, channels) = cluster().await;
        let mut w = writer(&cluster, &channels, WriterConfig::default()).await;
        w.write(TEMP, Series::new(vec![1.0f64, 2.0, 3.0]), TimeStamp(0))
            .await
            .unwrap();
        w.commit().await.unwrap();

        let mut iter = SegmentIterator::new(cluster.open_iterator_stream().unwrap());
        assert!(iter.open(&channels, &[TEMP], TimeRange::MAX).await.unwrap());
        assert_eq!(iter.state(), IteratorState::Iterating);
        assert!(!iter.valid().await.unwrap());
        assert_eq!(iter.state(), IteratorState::Iterating);
        assert!(iter.seek_first().await.unwrap());
        assert!(iter.next(AUTO_SPAN).await.unwrap());
        assert!(iter.valid().await.unwrap());
    }

    #[tokio::test]
    async fn test_gap_allowed_when_configured() {
        let (cluster, channels) = cluster().await;
        let config = WriterConfig {
            allow_gap: true,
            ..WriterConfig::default()
        };
        let mut w = writer(&cluster, &channels, config).await;
        w.write(TEMP, Series::new(vec![1.0f64]), TimeStamp(0))
            .await
            .unwrap();
        w.write(TEMP, Series::new(vec![1.0f64]), TimeStamp(100))
            .await
            .unwrap();
        assert_eq!(w.commit().await.unwrap(), TimeStamp(101));
    }

    #[tokio::test]
    async fn test_auto_commit() {
        let (cluster, channels) = cluster().await;
        let config = WriterConfig {
            auto_commit: true,
            ..WriterConfig::default()
        };
        let mut w = writer(&cluster, &channels, config).await;
        w.write(TEMP, Series::new(vec![1.0f64, 2.0]), TimeStamp(0))
            .await
            .unwrap();
        assert_eq!(cluster.committed(TEMP).await.len(), 1);
    }

    #[tokio::test]
    async fn test_uncommitted_writes_discarded_on_close() {
        let (cluster, channels) = cluster().await;
        let mut w = writer(&cluster, &channels, WriterConfig::default()).await;
        w.write(TEMP, Series::new(vec![1.0f64]), TimeStamp(0))
            .await
            .unwrap();
        w.close().await.unwrap();
        w.close().await.unwrap();
        assert_eq!(w.state(), WriterState::Closed);
        assert!(cluster.committed(TEMP).await.is_empty());
    }

    #[tokio::test]
    async fn test_rejected_commit_errors_session() {
        let (cluster, channels) = cluster().await;
        let mut first = writer(&cluster, &channels, WriterConfig::default()).await;
        let mut second = writer(&cluster, &channels, WriterConfig::default()).await;

        first
            .write(TEMP, Series::new(vec![1.0f64; 5]), TimeStamp(0))
            .await
            .unwrap();
        second
            .write(TEMP, Series::new(vec![2.0f64; 5]), TimeStamp(3))
            .await
            .unwrap();
        first.commit().await.unwrap();

        let err = second.commit().await.unwrap_err();
        assert!(matches!(err, Error::Remote(_)));
        assert_eq!(second.state(), WriterState::Errored);
        assert_eq!(second.commit().await.unwrap_err(), err);
    }

    #[tokio::test]
    async fn test_seeded_mark_enforces_contiguity() {
        let (cluster, channels) = cluster().await;
        let config = WriterConfig {
            allow_no_high_water_mark: false,
            ..WriterConfig::default()
        };
        let mut w = writer(&cluster, &channels, config).await;
        let unseeded = w.write(TEMP, Series::new(vec![1.0f64]), TimeStamp(0)).await;
        assert!(matches!(unseeded, Err(Error::Unexpected(_))));

        w.seed(TEMP, TimeStamp(0));
        w.write(TEMP, Series::new(vec![1.0f64]), TimeStamp(0))
            .await
            .unwrap();
    }

    /// Stream whose peer has gone away
    struct Disconnected;

    #[async_trait]
    impl Stream<WriterRequest, WriterResponse> for Disconnected {
        fn address(&self) -> &str {
            "gone:1"
        }

        async fn send(&mut self, _request: WriterRequest) -> Result<()> {
            Err(Error::Unreachable {
                address: "gone:1".to_string(),
                message: "connection refused".to_string(),
            })
        }

        async fn receive(&mut self) -> Result<WriterResponse> {
            unreachable!("send always fails first")
        }

        async fn close_send(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_transport_failure_on_open_errors_session() {
        let (_, channels) = cluster().await;
        let mut w = SegmentWriter::new(Disconnected, WriterConfig::default());
        let err = w.open(&channels, &[TEMP]).await.unwrap_err();
        assert!(err.is_transport());
        assert_eq!(w.state(), WriterState::Errored);
        assert_eq!(
            w.write(TEMP, Series::new(vec![1.0f64]), TimeStamp(0))
                .await
                .unwrap_err(),
            err
        );
        w.close().await.unwrap();
        assert_eq!(w.state(), WriterState::Closed);
    }

    #[tokio::test]
    async fn test_close_unopened_is_local() {
        let mut w = SegmentWriter::new(Disconnected, WriterConfig::default());
        w.close().await.unwrap();
        assert_eq!(w.state(), WriterState::Closed);
        assert!(w.commit().await.is_err());
    }
}
