//! Fixed-size recent history per metric channel, for charting.

use std::collections::{BTreeMap, VecDeque};

use appwatch_types::{CollectorType, Metric, MetricSnapshot, TimeSeriesPoint};
use parking_lot::RwLock;

/// Bounded append-only sequence of points.
///
/// Appending past capacity evicts from the head, so the buffer always holds
/// the most recent `capacity` points in arrival order.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    points: VecDeque<TimeSeriesPoint>,
    capacity: usize,
}

impl RingBuffer {
    /// Create an empty buffer. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a point at the tail, evicting the oldest points if needed.
    pub fn append(&mut self, point: TimeSeriesPoint) {
        self.points.push_back(point);
        while self.points.len() > self.capacity {
            self.points.pop_front();
        }
    }

    /// Copy of the retained points, oldest first.
    pub fn snapshot(&self) -> Vec<TimeSeriesPoint> {
        self.points.iter().copied().collect()
    }

    /// Most recent point.
    pub fn latest(&self) -> Option<&TimeSeriesPoint> {
        self.points.back()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// The ring buffers of every charted channel of one resource.
///
/// All channels are created together for the resource's collector type.
/// A sample is appended to every channel under one write lock, so readers
/// see either none or all of a sample's points.
#[derive(Debug)]
pub struct MetricHistory {
    collector: CollectorType,
    capacity: usize,
    inner: RwLock<HistoryInner>,
}

#[derive(Debug)]
struct HistoryInner {
    buffers: BTreeMap<Metric, RingBuffer>,
    /// Samples appended by `record` (seeding does not count).
    recorded: u64,
}

impl MetricHistory {
    /// Create empty buffers for every channel of `collector`.
    pub fn new(collector: CollectorType, capacity: usize) -> Self {
        let buffers = collector
            .channels()
            .iter()
            .map(|&metric| (metric, RingBuffer::new(capacity)))
            .collect();

        Self {
            collector,
            capacity: capacity.max(1),
            inner: RwLock::new(HistoryInner {
                buffers,
                recorded: 0,
            }),
        }
    }

    pub fn collector_type(&self) -> CollectorType {
        self.collector
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append one point per channel for a received sample.
    ///
    /// Snapshots of another collector type are ignored.
    pub fn record(&self, snapshot: &MetricSnapshot, timestamp_ms: u64) -> bool {
        if snapshot.collector_type() != self.collector {
            return false;
        }

        let mut inner = self.inner.write();
        append_all(&mut inner.buffers, snapshot, timestamp_ms);
        inner.recorded += 1;
        true
    }

    /// Seed the buffers with an initial reading.
    ///
    /// Only applies while nothing has been recorded or seeded yet; returns
    /// whether the seed was used.
    pub fn seed(&self, snapshot: &MetricSnapshot, timestamp_ms: u64) -> bool {
        if snapshot.collector_type() != self.collector {
            return false;
        }

        let mut inner = self.inner.write();
        if inner.recorded > 0 || inner.buffers.values().any(|b| !b.is_empty()) {
            return false;
        }
        append_all(&mut inner.buffers, snapshot, timestamp_ms);
        true
    }

    /// Number of samples recorded from the stream.
    pub fn samples_recorded(&self) -> u64 {
        self.inner.read().recorded
    }

    /// Retained points of one channel, oldest first.
    ///
    /// Empty for channels this collector type does not chart.
    pub fn series(&self, metric: Metric) -> Vec<TimeSeriesPoint> {
        self.inner
            .read()
            .buffers
            .get(&metric)
            .map(RingBuffer::snapshot)
            .unwrap_or_default()
    }

    /// Retained points of every channel, taken under a single read lock.
    pub fn snapshot(&self) -> BTreeMap<Metric, Vec<TimeSeriesPoint>> {
        self.inner
            .read()
            .buffers
            .iter()
            .map(|(&metric, buffer)| (metric, buffer.snapshot()))
            .collect()
    }

    /// Channel values normalized to 0-7 for 8 bar levels.
    ///
    /// Returns an empty Vec if there's not enough history.
    pub fn sparkline(&self, metric: Metric) -> Vec<u8> {
        let values: Vec<f64> = self.series(metric).iter().map(|p| p.value).collect();
        normalize_sparkline(&values)
    }
}

fn append_all(
    buffers: &mut BTreeMap<Metric, RingBuffer>,
    snapshot: &MetricSnapshot,
    timestamp_ms: u64,
) {
    for (metric, value) in snapshot.channel_values() {
        if let Some(buffer) = buffers.get_mut(&metric) {
            buffer.append(TimeSeriesPoint::new(timestamp_ms, value));
        }
    }
}

/// Normalize values to 0-7 range for sparkline display.
fn normalize_sparkline(values: &[f64]) -> Vec<u8> {
    if values.len() < 2 {
        return Vec::new();
    }

    let max = values.iter().copied().fold(f64::MIN, f64::max);
    let min = values.iter().copied().fold(f64::MAX, f64::min);
    let range = max - min;

    values
        .iter()
        .map(|&v| {
            if range <= 0.0 {
                return 0;
            }
            let normalized = ((v - min) / range * 7.0) as u8;
            normalized.min(7)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use appwatch_types::{ComputeInstanceMetrics, ObjectStoreMetrics, ServerlessFunctionMetrics};

    fn point(i: u64) -> TimeSeriesPoint {
        TimeSeriesPoint::new(i, i as f64)
    }

    fn bucket(size: u64, objects: u64) -> MetricSnapshot {
        MetricSnapshot::ObjectStore(ObjectStoreMetrics {
            bucket_size_bytes: size,
            object_count: objects,
        })
    }

    #[test]
    fn ring_buffer_evicts_oldest() {
        let mut buffer = RingBuffer::new(20);
        for i in 1..=25 {
            buffer.append(point(i));
            assert!(buffer.len() <= 20);
        }

        let expected: Vec<TimeSeriesPoint> = (6..=25).map(point).collect();
        assert_eq!(buffer.snapshot(), expected);
        assert_eq!(buffer.latest(), Some(&point(25)));
    }

    #[test]
    fn ring_buffer_keeps_duplicates_in_order() {
        let mut buffer = RingBuffer::new(3);
        buffer.append(point(2));
        buffer.append(point(1));
        buffer.append(point(2));

        assert_eq!(buffer.snapshot(), vec![point(2), point(1), point(2)]);
    }

    #[test]
    fn ring_buffer_zero_capacity_holds_one() {
        let mut buffer = RingBuffer::new(0);
        buffer.append(point(1));
        buffer.append(point(2));
        assert_eq!(buffer.capacity(), 1);
        assert_eq!(buffer.snapshot(), vec![point(2)]);
    }

    #[test]
    fn history_creates_channels_for_collector() {
        let history = MetricHistory::new(CollectorType::ComputeInstance, 20);
        let channels: Vec<Metric> = history.snapshot().into_keys().collect();
        assert_eq!(
            channels,
            vec![Metric::Cpu, Metric::Memory, Metric::Disk, Metric::Network]
        );
        assert!(history.series(Metric::NetworkIn).is_empty());
    }

    #[test]
    fn record_appends_one_point_per_channel() {
        let history = MetricHistory::new(CollectorType::ComputeInstance, 20);
        let snapshot =
            MetricSnapshot::ComputeInstance(ComputeInstanceMetrics::new(45.2, 62.8, 30.0, 100.0, 134.0));

        assert!(history.record(&snapshot, 1_000));

        let all = history.snapshot();
        assert_eq!(all.len(), 4);
        assert!(all.values().all(|points| points.len() == 1));
        assert_eq!(history.series(Metric::Network), vec![TimeSeriesPoint::new(1_000, 234.0)]);
        assert_eq!(history.samples_recorded(), 1);
    }

    #[test]
    fn record_ignores_foreign_collector() {
        let history = MetricHistory::new(CollectorType::ComputeInstance, 20);
        assert!(!history.record(&bucket(1, 1), 1));
        assert!(history.snapshot().values().all(Vec::is_empty));
    }

    #[test]
    fn history_caps_every_channel() {
        let history = MetricHistory::new(CollectorType::ObjectStore, 20);
        for i in 1..=25 {
            history.record(&bucket(i, i * 2), i);
        }

        let sizes = history.series(Metric::BucketSizeBytes);
        assert_eq!(sizes.len(), 20);
        assert_eq!(sizes.first().map(|p| p.timestamp_ms), Some(6));
        assert_eq!(sizes.last().map(|p| p.value), Some(25.0));
        assert_eq!(history.series(Metric::ObjectCount).len(), 20);
    }

    #[test]
    fn seed_only_applies_to_empty_history() {
        let history = MetricHistory::new(CollectorType::ObjectStore, 20);
        assert!(history.seed(&bucket(10, 1), 1));
        assert!(!history.seed(&bucket(20, 2), 2));
        assert_eq!(history.samples_recorded(), 0);

        let other = MetricHistory::new(CollectorType::ObjectStore, 20);
        other.record(&bucket(30, 3), 3);
        assert!(!other.seed(&bucket(10, 1), 1));
        assert_eq!(other.series(Metric::BucketSizeBytes).len(), 1);
    }

    #[test]
    fn concurrent_readers_never_see_a_partial_sample() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;
        use std::thread;

        let history = Arc::new(MetricHistory::new(CollectorType::ServerlessFunction, 8));
        let done = Arc::new(AtomicBool::new(false));

        let writer = {
            let history = history.clone();
            let done = done.clone();
            thread::spawn(move || {
                for i in 1..=20_000u64 {
                    let snapshot = MetricSnapshot::ServerlessFunction(ServerlessFunctionMetrics {
                        invocations: i,
                        errors: i,
                        throttles: i,
                        concurrent_executions: i,
                        duration_avg: i as f64,
                        duration_max: i as f64,
                    });
                    history.record(&snapshot, i);
                }
                done.store(true, Ordering::SeqCst);
            })
        };

        let mut reads = 0;
        while !done.load(Ordering::SeqCst) || reads == 0 {
            let all = history.snapshot();
            assert_eq!(all.len(), 6);

            let lengths: Vec<usize> = all.values().map(Vec::len).collect();
            assert!(lengths.windows(2).all(|w| w[0] == w[1]), "lengths {:?}", lengths);

            let tails: Vec<Option<u64>> = all
                .values()
                .map(|points| points.last().map(|p| p.timestamp_ms))
                .collect();
            assert!(tails.windows(2).all(|w| w[0] == w[1]), "tails {:?}", tails);
            reads += 1;
        }

        writer.join().unwrap();
        assert_eq!(history.samples_recorded(), 20_000);
        assert!(history.snapshot().values().all(|points| points.len() == 8));
    }

    #[test]
    fn sparkline_empty_with_single_reading() {
        let history = MetricHistory::new(CollectorType::ObjectStore, 20);
        history.record(&bucket(100, 1), 1);
        assert!(history.sparkline(Metric::BucketSizeBytes).is_empty());
    }

    #[test]
    fn sparkline_spans_full_range() {
        let history = MetricHistory::new(CollectorType::ObjectStore, 20);
        for (i, size) in [0, 50, 100].into_iter().enumerate() {
            history.record(&bucket(size, 1), i as u64);
        }

        assert_eq!(history.sparkline(Metric::BucketSizeBytes), vec![0, 3, 7]);
        // Flat series stays at the floor
        assert_eq!(history.sparkline(Metric::ObjectCount), vec![0, 0, 0]);
    }
}
