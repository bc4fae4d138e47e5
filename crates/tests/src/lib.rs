//! # Integration Tests
//!
//! Cross-crate and end-to-end tests.
//!
//! - Settings and attach bookkeeping across many channels
//! - Broadcast completeness under contention and held sink locks
//! - Configuration driven topologies

#[cfg(test)]
mod contract_tests {
    use contracts::{ChannelId, ContractError, SettingsSnapshot, MAX_CHANNELS};

    #[test]
    fn test_channel_id_bounds() {
        assert!(ChannelId::new(MAX_CHANNELS - 1).is_ok());
        assert!(matches!(
            ChannelId::new(MAX_CHANNELS),
            Err(ContractError::ChannelIdOutOfRange { .. })
        ));
    }

    #[test]
    fn test_default_settings() {
        let defaults = SettingsSnapshot::default();
        assert!(defaults.enabled);
        assert_eq!(defaults.priority, contracts::PRIORITY_DEFAULT);
        assert_eq!(defaults.filter, contracts::FILTER_DEFAULT);
    }
}

#[cfg(test)]
mod bookkeeping_tests {
    use std::sync::Arc;

    use broadcast::backends::MemoryBackend;
    use broadcast::{BroadcastContext, Channel, Sink};
    use contracts::{ChannelId, ContextConfig, ContractError, SettingsTarget};

    fn memory_sink(ctx: &Arc<BroadcastContext>, name: &str) -> Sink {
        Sink::new(ctx, name, Box::new(MemoryBackend::new(name)))
    }

    #[test]
    fn test_settings_refcount_tracks_live_channels() {
        let ctx = BroadcastContext::with_defaults();
        let id = ChannelId::from_const(17);
        let sink = memory_sink(&ctx, "shared");

        let mut channels: Vec<Channel> = (0..6)
            .map(|_| Channel::builder(&ctx, id).sink(&sink).build().unwrap())
            .collect();
        assert_eq!(ctx.settings().refcount(id), 6);
        assert_eq!(sink.refcount(), 6);

        channels.truncate(2);
        assert_eq!(ctx.settings().refcount(id), 2);
        assert_eq!(sink.refcount(), 2);
        assert!(sink.is_broadcast_target());

        channels.clear();
        assert_eq!(ctx.settings().refcount(id), 0);
        assert!(!sink.is_broadcast_target());
        assert!(ctx.teardown().is_ok());
    }

    #[test]
    fn test_target_flag_matches_refcount() {
        let ctx = BroadcastContext::with_defaults();
        let sinks: Vec<Sink> = (0..4)
            .map(|i| memory_sink(&ctx, &format!("s{i}")))
            .collect();

        let first = Channel::builder(&ctx, ChannelId::from_const(0))
            .sinks(&sinks[..2])
            .build()
            .unwrap();
        let second = Channel::builder(&ctx, ChannelId::from_const(1))
            .sinks(&sinks[1..3])
            .build()
            .unwrap();

        let check = |sinks: &[Sink]| {
            for sink in sinks {
                assert_eq!(sink.is_broadcast_target(), sink.refcount() > 0, "{sink:?}");
            }
        };

        check(&sinks);
        assert_eq!(sinks[1].refcount(), 2);
        assert_eq!(sinks[3].refcount(), 0);

        drop(first);
        check(&sinks);
        drop(second);
        check(&sinks);
        assert!(ctx.sinks().is_empty());
    }

    #[test]
    fn test_tombstones_keep_lookups_working() {
        let ctx = BroadcastContext::new(ContextConfig {
            sink_table_capacity: 5,
            ..ContextConfig::default()
        })
        .unwrap();
        let sinks: Vec<Sink> = (0..4)
            .map(|i| memory_sink(&ctx, &format!("s{i}")))
            .collect();

        let mut channels: Vec<Channel> = sinks
            .iter()
            .enumerate()
            .map(|(i, sink)| {
                Channel::builder(&ctx, ChannelId::new(i).unwrap())
                    .sink(sink)
                    .build()
                    .unwrap()
            })
            .collect();

        // Free slots in the middle of probe chains, then re-attach.
        channels.remove(1);
        channels.remove(0);
        assert_eq!(ctx.sinks().len(), 2);
        for sink in &sinks[2..] {
            assert_eq!(sink.refcount(), 1);
        }

        let all = Channel::builder(&ctx, ChannelId::from_const(9))
            .sinks(&sinks)
            .build()
            .unwrap();
        channels.push(all);
        assert_eq!(ctx.sinks().len(), 4);
        assert_eq!(sinks[0].refcount(), 1);
        assert_eq!(sinks[3].refcount(), 2);
    }

    #[test]
    fn test_full_table_leaves_no_trace() {
        let ctx = BroadcastContext::new(ContextConfig {
            sink_table_capacity: 2,
            ..ContextConfig::default()
        })
        .unwrap();
        let sinks: Vec<Sink> = (0..3)
            .map(|i| memory_sink(&ctx, &format!("s{i}")))
            .collect();
        let id = ChannelId::from_const(4);

        let err = Channel::builder(&ctx, id).sinks(&sinks).build().unwrap_err();
        assert!(matches!(err, ContractError::SinkTableFull { capacity: 2 }));
        assert_eq!(ctx.settings().refcount(id), 0);
        assert!(ctx.sinks().is_empty());
        assert!(sinks.iter().all(|s| !s.is_broadcast_target()));
    }

    #[test]
    fn test_can_be_output_boundary() {
        let ctx = BroadcastContext::with_defaults();
        let channel = Channel::builder(&ctx, ChannelId::from_const(30)).build().unwrap();

        channel.set_filter(5).set_priority(5);
        assert!(channel.can_be_output());
        channel.set_priority(6);
        assert!(!channel.can_be_output());

        channel.set_filter(0).set_priority(0);
        assert!(channel.can_be_output());
        channel.set_priority(1);
        assert!(!channel.can_be_output());

        channel.set_filter(255).set_priority(255);
        assert!(channel.can_be_output());
        channel.enable(false);
        assert!(!channel.can_be_output());
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;

    use broadcast::backends::{MemoryBackend, MemoryBuffer};
    use broadcast::stamps::{LineStamp, SystemTimeStamp, TextStamp};
    use broadcast::{BroadcastContext, BroadcastMode, Channel, Sink};
    use contracts::{ChannelId, SettingsSnapshot, SettingsTarget, Stamp};
    use observability::BroadcastStatsAggregator;

    fn memory_sink(ctx: &Arc<BroadcastContext>, name: &str) -> (Sink, MemoryBuffer) {
        let backend = MemoryBackend::new(name);
        let buffer = backend.buffer();
        (Sink::new(ctx, name, Box::new(backend)), buffer)
    }

    #[test]
    fn test_two_sinks_receive_stamped_message() {
        let ctx = BroadcastContext::with_defaults();
        let (a, buf_a) = memory_sink(&ctx, "a");
        let (b, buf_b) = memory_sink(&ctx, "b");

        let mut channel = Channel::new(
            &ctx,
            ChannelId::from_const(0),
            [&a, &b],
            BroadcastMode::SingleThreaded,
            Arc::new(SystemTimeStamp::new()),
            SettingsSnapshot::default(),
        )
        .unwrap();

        channel.write(b"abc");
        let report = channel.flush();
        assert_eq!(report.written, 2);

        for buffer in [&buf_a, &buf_b] {
            let text = buffer.to_string_lossy();
            assert_eq!(text.len(), 24 + 3, "{text:?}");
            assert!(text.ends_with(" abc"));
            assert_eq!(&text[4..5], "-");
        }
    }

    #[test]
    fn test_filter_then_unfilter() {
        let ctx = BroadcastContext::with_defaults();
        let (a, buf_a) = memory_sink(&ctx, "a");
        let mut channel = Channel::builder(&ctx, ChannelId::from_const(0))
            .sink(&a)
            .mode(BroadcastMode::SingleThreaded)
            .build()
            .unwrap();

        channel.set_filter(0);
        channel.write(b"x");
        channel.flush();
        assert!(buf_a.is_empty());

        channel.set_filter(255);
        channel.write(b"y");
        channel.flush();
        assert_eq!(buf_a.contents(), b"y");
    }

    #[test]
    fn test_empty_flush_sends_exactly_the_stamp() {
        let ctx = BroadcastContext::with_defaults();
        let backend = MemoryBackend::new("a");
        let buffer = backend.buffer();
        let a = Sink::new(&ctx, "a", Box::new(backend));

        let stamp = Arc::new(TextStamp::new("<s> "));
        let mut channel = Channel::builder(&ctx, ChannelId::from_const(2))
            .sink(&a)
            .stamp(stamp.clone())
            .build()
            .unwrap();

        channel.flush();
        channel.flush();
        assert_eq!(buffer.contents(), b"<s> <s> ");
        assert_eq!(a.metrics().write_count(), 2);
        assert_eq!(stamp.len(), 4);
    }

    #[test]
    fn test_priority_restored_after_every_flush() {
        let ctx = BroadcastContext::with_defaults();
        let (a, _) = memory_sink(&ctx, "a");
        let mut channel = Channel::builder(&ctx, ChannelId::from_const(3))
            .sink(&a)
            .build()
            .unwrap();

        for (default, priority, filter) in [(1, 0, 255), (2, 9, 3), (0, 200, 0), (5, 5, 5)] {
            channel
                .set_default_priority(default)
                .set_priority(priority)
                .set_filter(filter);
            channel.write(b"m");
            channel.flush();
            assert_eq!(channel.get_priority(), channel.get_default_priority());
        }
    }

    #[test]
    fn test_line_stamps_shared_between_channels() {
        let ctx = BroadcastContext::with_defaults();
        let (a, buf_a) = memory_sink(&ctx, "a");
        let stamp = Arc::new(LineStamp::new());

        let mut first = Channel::builder(&ctx, ChannelId::from_const(5))
            .sink(&a)
            .stamp(stamp.clone())
            .build()
            .unwrap();
        let mut second = Channel::builder(&ctx, ChannelId::from_const(5))
            .sink(&a)
            .stamp(stamp)
            .build()
            .unwrap();

        first.write(b"a\n");
        first.flush();
        second.write(b"b\n");
        second.flush();
        first.write(b"c\n");
        first.flush();

        assert_eq!(buf_a.to_string_lossy(), "1 a\n2 b\n3 c\n");
    }

    #[test]
    fn test_standalone_and_broadcast_use() {
        let ctx = BroadcastContext::with_defaults();
        let backend = MemoryBackend::new("shared");
        let buffer = backend.buffer();
        let sink = Sink::builder(&ctx, "shared", Box::new(backend))
            .stamp(Arc::new(TextStamp::new("[sink] ")))
            .build();

        sink.write(b"alone\n");
        sink.flush().unwrap();

        {
            let mut channel = Channel::builder(&ctx, ChannelId::from_const(6))
                .sink(&sink)
                .stamp(Arc::new(TextStamp::new("[chan] ")))
                .build()
                .unwrap();
            channel.write(b"fanned\n");
            channel.flush();

            sink.write(b"direct\n");
            sink.flush().unwrap();
        }

        sink.write(b"alone again\n");
        sink.flush().unwrap();

        assert_eq!(
            buffer.to_string_lossy(),
            "[sink] alone\n[chan] fanned\ndirect\n[sink] alone again\n"
        );
    }

    #[test]
    fn test_aggregator_over_reports() {
        let ctx = BroadcastContext::with_defaults();
        let (a, _) = memory_sink(&ctx, "a");
        let (b, _) = memory_sink(&ctx, "b");
        let mut channel = Channel::builder(&ctx, ChannelId::from_const(7))
            .sinks([&a, &b])
            .build()
            .unwrap();

        b.enable(false);
        let mut stats = BroadcastStatsAggregator::new();
        for _ in 0..4 {
            channel.write(b"abc");
            stats.update(&channel.flush());
        }
        channel.set_filter(0);
        stats.update(&channel.flush());

        assert_eq!(stats.total_flushes, 5);
        assert_eq!(stats.filtered_flushes, 1);
        assert_eq!(stats.total_writes, 4);
        assert_eq!(stats.sink_filtered, 4);
        assert_eq!(b.metrics().filtered_count(), 4);
        assert!(stats.summary().to_string().contains("Total flushes: 5"));
    }
}

#[cfg(test)]
mod concurrency_tests {
    use std::collections::HashSet;
    use std::sync::{mpsc, Arc, Barrier};
    use std::thread;
    use std::time::{Duration, Instant};

    use broadcast::backends::{MemoryBackend, MemoryBuffer};
    use broadcast::stamps::TextStamp;
    use broadcast::{BroadcastContext, Channel, Sink};
    use contracts::{BackoffPolicy, ChannelId, ContextConfig, RetryPolicy, SettingsTarget};

    fn memory_sink(ctx: &Arc<BroadcastContext>, name: &str) -> (Sink, MemoryBuffer) {
        let backend = MemoryBackend::new(name);
        let buffer = backend.buffer();
        (Sink::new(ctx, name, Box::new(backend)), buffer)
    }

    fn fast_context() -> Arc<BroadcastContext> {
        BroadcastContext::new(ContextConfig {
            retry: RetryPolicy {
                spin_rounds: 4,
                blocking_after_rounds: 32,
                lock_wait_ms: 2,
                backoff: BackoffPolicy {
                    first_backoff_us: 5,
                    max_backoff_us: 200,
                    factor: 2.0,
                },
            },
            ..ContextConfig::default()
        })
        .unwrap()
    }

    fn wait_until(deadline: Duration, mut condition: impl FnMut() -> bool) -> bool {
        let started = Instant::now();
        while started.elapsed() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        condition()
    }

    #[test]
    fn test_held_sink_does_not_block_the_others() {
        let ctx = fast_context();
        let (a, buf_a) = memory_sink(&ctx, "a");
        let (b, buf_b) = memory_sink(&ctx, "b");

        let hold = a.hold();

        let (sink_a, sink_b) = (a.clone(), b.clone());
        let flusher_ctx = Arc::clone(&ctx);
        let flusher = thread::spawn(move || {
            let mut channel = Channel::builder(&flusher_ctx, ChannelId::from_const(0))
                .sinks([&sink_a, &sink_b])
                .build()
                .unwrap();
            channel.write(b"payload");
            channel.flush()
        });

        assert!(
            wait_until(Duration::from_secs(5), || !buf_b.is_empty()),
            "unlocked sink was not written while another sink was held"
        );
        assert!(buf_a.is_empty());
        assert!(!flusher.is_finished());

        drop(hold);
        let report = flusher.join().unwrap();

        assert_eq!(report.written, 2);
        assert!(report.retries > 0);
        assert_eq!(buf_a.contents(), b"payload");
        assert_eq!(buf_b.contents(), b"payload");
    }

    #[test]
    fn test_opposite_sink_orders_never_deadlock() {
        const THREADS: usize = 8;
        const MESSAGES: usize = 200;

        let ctx = fast_context();
        let sinks: Vec<(Sink, MemoryBuffer)> = (0..3)
            .map(|i| memory_sink(&ctx, &format!("s{i}")))
            .collect();
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let ctx = Arc::clone(&ctx);
                let barrier = Arc::clone(&barrier);
                let mut order: Vec<Sink> = sinks.iter().map(|(s, _)| s.clone()).collect();
                if t % 2 == 1 {
                    order.reverse();
                }
                thread::spawn(move || {
                    let mut channel = Channel::builder(&ctx, ChannelId::from_const(1))
                        .sinks(&order)
                        .stamp(Arc::new(TextStamp::new(format!("[t{t}] "))))
                        .build()
                        .unwrap();
                    barrier.wait();
                    for i in 0..MESSAGES {
                        channel.write(format!("m{i}\n").as_bytes());
                        channel.flush();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        for (sink, buffer) in &sinks {
            let text = buffer.to_string_lossy();
            let lines: Vec<&str> = text.lines().collect();
            assert_eq!(lines.len(), THREADS * MESSAGES, "sink {}", sink.name());

            // Every message arrives whole and exactly once.
            let unique: HashSet<&str> = lines.iter().copied().collect();
            assert_eq!(unique.len(), lines.len());
            for line in &lines {
                assert!(line.starts_with("[t") && line.contains("] m"), "{line:?}");
            }
            assert_eq!(sink.metrics().write_count(), (THREADS * MESSAGES) as u64);
        }
        assert!(ctx.teardown().is_ok());
    }

    #[test]
    fn test_sink_dropped_while_channels_broadcast() {
        let ctx = fast_context();
        let (keep, buf_keep) = memory_sink(&ctx, "keep");
        let (doomed, _) = memory_sink(&ctx, "doomed");

        let (ready_tx, ready_rx) = mpsc::channel();
        let (go_tx, go_rx) = mpsc::channel::<()>();
        let (k, d) = (keep.clone(), doomed.clone());
        let worker_ctx = Arc::clone(&ctx);
        let worker = thread::spawn(move || {
            let mut channel = Channel::builder(&worker_ctx, ChannelId::from_const(2))
                .sinks([&k, &d])
                .build()
                .unwrap();
            drop(d);
            ready_tx.send(()).unwrap();
            go_rx.recv().unwrap();
            channel.write(b"after");
            channel.flush()
        });

        ready_rx.recv().unwrap();
        drop(doomed);
        assert_eq!(ctx.sinks().len(), 1);
        go_tx.send(()).unwrap();

        let report = worker.join().unwrap();
        assert_eq!(report.vanished, 1);
        assert_eq!(report.written, 1);
        assert_eq!(buf_keep.contents(), b"after");

        drop(keep);
        assert!(ctx.teardown().is_ok());
    }

    #[test]
    fn test_settings_shared_across_threads() {
        let ctx = fast_context();
        let (a, buf_a) = memory_sink(&ctx, "a");
        let id = ChannelId::from_const(40);

        let control = Channel::builder(&ctx, id).sink(&a).build().unwrap();
        control.set_filter(0);

        let worker_ctx = Arc::clone(&ctx);
        let sink = a.clone();
        let report = thread::spawn(move || {
            let mut channel = Channel::builder(&worker_ctx, id).sink(&sink).build().unwrap();
            channel.write(b"hidden");
            channel.flush()
        })
        .join()
        .unwrap();

        assert!(report.is_filtered());
        assert!(buf_a.is_empty());
        assert_eq!(ctx.settings().refcount(id), 1);
    }
}

#[cfg(test)]
mod config_tests {
    use broadcast::{build_topology, BroadcastContext};
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::SettingsTarget;

    #[test]
    fn test_topology_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("trace.log");

        let content = format!(
            r#"
[context]
sink_table_capacity = 7

[[sinks]]
name = "capture"
backend = "memory"

[[sinks]]
name = "file"
backend = "file"
stamp = {{ text = "F " }}
params = {{ path = "{}" }}

[[channels]]
name = "main"
id = 0
sinks = ["capture", "file"]
stamp = {{ text = "[main] " }}
mode = "single_threaded"

[[channels]]
name = "quiet"
id = 1
sinks = ["capture"]
settings = {{ filter = 0 }}
"#,
            log_path.display()
        );

        let config = ConfigLoader::load_from_str(&content, ConfigFormat::Toml).unwrap();
        let ctx = BroadcastContext::new(config.context.clone()).unwrap();
        let topology = build_topology(&ctx, &config).unwrap();

        let mut main = topology.channel("main").unwrap();
        let mut quiet = topology.channel("quiet").unwrap();

        main.write(b"hello\n");
        main.flush();
        quiet.write(b"muted\n");
        assert!(quiet.flush().is_filtered());

        // Standalone writes to the attached file sink skip its own stamp.
        let file = topology.sink("file").unwrap();
        file.write(b"raw\n");
        file.flush().unwrap();

        drop(main);
        file.write(b"own\n");
        file.flush().unwrap();

        let capture = topology.memory_buffer("capture").unwrap();
        assert_eq!(capture.to_string_lossy(), "[main] hello\n");
        assert_eq!(
            std::fs::read_to_string(&log_path).unwrap(),
            "[main] hello\nraw\nF own\n"
        );

        quiet.set_filter(255);
        quiet.write(b"loud\n");
        quiet.flush();
        assert_eq!(capture.to_string_lossy(), "[main] hello\nloud\n");
    }
}
