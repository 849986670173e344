//! metricpush-process — process-level metrics as a snapshot producer.
//!
//! `ProcessMetrics` renders the usual `process_*` series (CPU time, page
//! faults, memory, threads, file descriptors, start time) in exposition
//! format. It can be pushed on its own or appended to another producer.
//!
//! Only Linux is supported; elsewhere the producer writes nothing.

#[cfg(target_os = "linux")]
mod linux;

use std::io;

use metricpush_scheduler::{
    schedule, PushConfig, PushHandle, PushResult, SnapshotProducer, SnapshotProducerExt,
};

/// Writes `process_*` metrics for the current process.
#[derive(Debug, Clone)]
pub struct ProcessMetrics {
    #[cfg(target_os = "linux")]
    sys: linux::SysInfo,
}

impl ProcessMetrics {
    pub fn new() -> Self {
        Self {
            #[cfg(target_os = "linux")]
            sys: linux::SysInfo::detect(),
        }
    }
}

impl Default for ProcessMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotProducer for ProcessMetrics {
    #[cfg(target_os = "linux")]
    fn write_snapshot(&self, out: &mut Vec<u8>) -> io::Result<()> {
        linux::write_process_metrics(&self.sys, out)
    }

    #[cfg(not(target_os = "linux"))]
    fn write_snapshot(&self, _out: &mut Vec<u8>) -> io::Result<()> {
        Ok(())
    }
}

/// Push only process metrics to `config.push_url`.
pub fn schedule_process_metrics(config: PushConfig) -> PushResult<PushHandle> {
    schedule(config, ProcessMetrics::new())
}

/// Push `producer`'s metrics followed by process metrics.
pub fn schedule_with_process_metrics<P>(config: PushConfig, producer: P) -> PushResult<PushHandle>
where
    P: SnapshotProducer,
{
    schedule(config, producer.chain(ProcessMetrics::new()))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use metricpush_scheduler::{from_fn, PushError};

    use super::*;

    #[test]
    fn lines_are_valid_exposition() {
        let mut out = Vec::new();
        ProcessMetrics::new().write_snapshot(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        for line in text.lines() {
            let (name, value) = line.rsplit_once(' ').expect("name value");
            assert!(name.starts_with("process_"), "{line}");
            assert!(value.parse::<f64>().is_ok(), "{line}");
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn linux_reports_core_series() {
        let mut out = Vec::new();
        ProcessMetrics::new().write_snapshot(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        for name in [
            "process_cpu_seconds_total",
            "process_num_threads",
            "process_resident_memory_bytes",
            "process_open_fds",
        ] {
            assert!(
                text.lines().any(|l| l.starts_with(&format!("{name} "))),
                "missing {name} in:\n{text}"
            );
        }
    }

    #[tokio::test]
    async fn schedule_helpers_validate_config() {
        let err = schedule_process_metrics(PushConfig::new("http://localhost/", Duration::ZERO))
            .unwrap_err();
        assert!(matches!(err, PushError::InvalidInterval(_)));

        let handle = schedule_with_process_metrics(
            PushConfig::new("http://127.0.0.1:9/", Duration::from_secs(60)),
            from_fn(|out| {
                out.extend_from_slice(b"app_up 1\n");
                Ok(())
            }),
        )
        .unwrap();
        handle.shutdown().await;
    }
}
