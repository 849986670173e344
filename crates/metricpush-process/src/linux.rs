//! `/proc`-backed process metrics.

use std::fmt::Display;
use std::fs;
use std::io::{self, Write};

use tracing::debug;

/// Per-host constants, read once.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SysInfo {
    clock_ticks: f64,
    page_size: u64,
    boot_time: Option<u64>,
}

impl SysInfo {
    pub(crate) fn detect() -> Self {
        // SAFETY: sysconf only reads static system configuration.
        let ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
        // SAFETY: as above.
        let page = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };

        Self {
            clock_ticks: if ticks > 0 { ticks as f64 } else { 100.0 },
            page_size: if page > 0 { page as u64 } else { 4096 },
            boot_time: fs::read_to_string("/proc/stat")
                .ok()
                .and_then(|s| parse_boot_time(&s)),
        }
    }
}

/// The subset of `/proc/self/stat` we export.
#[derive(Debug, PartialEq, Eq)]
struct ProcStat {
    minflt: u64,
    majflt: u64,
    utime: u64,
    stime: u64,
    num_threads: u64,
    starttime: u64,
    vsize: u64,
    rss: u64,
}

pub(crate) fn write_process_metrics(sys: &SysInfo, out: &mut Vec<u8>) -> io::Result<()> {
    match read_proc_stat() {
        Some(stat) => {
            let user = stat.utime as f64 / sys.clock_ticks;
            let system = stat.stime as f64 / sys.clock_ticks;
            write_metric(out, "process_cpu_seconds_system_total", system)?;
            write_metric(out, "process_cpu_seconds_total", user + system)?;
            write_metric(out, "process_cpu_seconds_user_total", user)?;
            write_metric(out, "process_major_pagefaults_total", stat.majflt)?;
            write_metric(out, "process_minor_pagefaults_total", stat.minflt)?;
            write_metric(out, "process_num_threads", stat.num_threads)?;
            write_metric(out, "process_resident_memory_bytes", stat.rss * sys.page_size)?;
            if let Some(boot) = sys.boot_time {
                let started = boot + (stat.starttime as f64 / sys.clock_ticks) as u64;
                write_metric(out, "process_start_time_seconds", started)?;
            }
            write_metric(out, "process_virtual_memory_bytes", stat.vsize)?;
        }
        None => debug!("cannot read /proc/self/stat; skipping process cpu and memory metrics"),
    }

    match fs::read_dir("/proc/self/fd") {
        Ok(entries) => write_metric(out, "process_open_fds", entries.count())?,
        Err(e) => debug!(error = %e, "cannot list /proc/self/fd"),
    }

    if let Some(max) = fs::read_to_string("/proc/self/limits")
        .ok()
        .and_then(|s| parse_max_fds(&s))
    {
        write_metric(out, "process_max_fds", max)?;
    }
    Ok(())
}

fn write_metric(out: &mut Vec<u8>, name: &str, value: impl Display) -> io::Result<()> {
    writeln!(out, "{name} {value}")
}

fn read_proc_stat() -> Option<ProcStat> {
    let raw = fs::read_to_string("/proc/self/stat").ok()?;
    parse_proc_stat(&raw)
}

fn parse_proc_stat(raw: &str) -> Option<ProcStat> {
    // The command name may contain spaces and parens; fields resume
    // after the last `)`, starting at field 3 (state).
    let rest = &raw[raw.rfind(')')? + 1..];
    let fields: Vec<&str> = rest.split_whitespace().collect();
    let field = |n: usize| -> Option<u64> { fields.get(n - 3)?.parse().ok() };

    Some(ProcStat {
        minflt: field(10)?,
        majflt: field(12)?,
        utime: field(14)?,
        stime: field(15)?,
        num_threads: field(20)?,
        starttime: field(22)?,
        vsize: field(23)?,
        rss: field(24)?,
    })
}

fn parse_boot_time(proc_stat: &str) -> Option<u64> {
    proc_stat
        .lines()
        .find_map(|line| line.strip_prefix("btime "))
        .and_then(|v| v.trim().parse().ok())
}

/// Soft limit from the `Max open files` row; `None` if unlimited.
fn parse_max_fds(limits: &str) -> Option<u64> {
    limits
        .lines()
        .find_map(|line| line.strip_prefix("Max open files"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|soft| soft.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    const STAT: &str = "1234 (my (weird) proc) S 1 1234 1234 0 -1 4194560 500 0 3 0 150 25 0 0 20 0 7 0 98765 123456789 2048 18446744073709551615 1 1 0 0 0 0 0 0 0 0 0 0 17 3 0 0 0 0 0\n";

    #[test]
    fn parses_stat_with_parens_in_comm() {
        assert_eq!(
            parse_proc_stat(STAT),
            Some(ProcStat {
                minflt: 500,
                majflt: 3,
                utime: 150,
                stime: 25,
                num_threads: 7,
                starttime: 98765,
                vsize: 123456789,
                rss: 2048,
            })
        );
    }

    #[test]
    fn truncated_stat_is_rejected() {
        assert_eq!(parse_proc_stat("1234 (x) S 1 2 3"), None);
        assert_eq!(parse_proc_stat("garbage"), None);
    }

    #[test]
    fn parses_boot_time() {
        let proc_stat = "cpu  1 2 3 4\nintr 5\nbtime 1700000000\nprocesses 42\n";
        assert_eq!(parse_boot_time(proc_stat), Some(1_700_000_000));
        assert_eq!(parse_boot_time("cpu 1 2 3\n"), None);
    }

    #[test]
    fn parses_max_fds() {
        let limits = "\
Limit                     Soft Limit           Hard Limit           Units
Max cpu time              unlimited            unlimited            seconds
Max open files            1024                 1048576              files
";
        assert_eq!(parse_max_fds(limits), Some(1024));

        let unlimited = "Max open files            unlimited            unlimited            files\n";
        assert_eq!(parse_max_fds(unlimited), None);
    }

    #[test]
    fn writes_scaled_values() {
        let sys = SysInfo {
            clock_ticks: 100.0,
            page_size: 4096,
            boot_time: Some(1_700_000_000),
        };
        let mut out = Vec::new();
        write_process_metrics(&sys, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("process_start_time_seconds 17"));
        assert!(text.lines().all(|l| l.starts_with("process_")));
    }
}
