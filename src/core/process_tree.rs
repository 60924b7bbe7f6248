//! Process tree resolution
//!
//! This module discovers the set of PIDs that belong to a run so that metrics
//! and termination cover the real work, not only the process we spawned.
//!
//! Platform strategy:
//! - POSIX: bash runs the script directly, the launcher PID is the whole tree
//! - Windows: the terminal emulator is a launcher that starts the real shell,
//!   so descendants are walked through a process table snapshot (sysinfo),
//!   falling back to external helpers (PowerShell CIM query, then WMIC)

use crate::core::handle::ProcessHandle;
use crate::error::ProbeError;
use crate::logging::debug;
use crate::platform::run_helper;
use std::collections::HashSet;
use std::process::Command;
use std::time::Duration;

// Guards against pathological trees and PID reuse cycles
const MAX_TREE_DEPTH: usize = 32;

/// Strategy for expanding a launcher PID into the PIDs to track.
pub trait TreeResolver {
    /// Returns `[root_pid, descendants...]`; never empty
    fn resolve(&self, root_pid: u32) -> Vec<u32>;
}

/// Source of direct-children lookups.
pub trait ChildEnumerator {
    fn name(&self) -> &str;
    fn children(&self, pid: u32) -> Result<Vec<u32>, ProbeError>;

    /// An empty answer ends the lookup instead of asking the next enumerator
    fn trusts_empty(&self) -> bool {
        false
    }
}

/// Used where the spawned process already is the work.
#[derive(Debug, Default, Clone, Copy)]
pub struct LauncherOnly;

impl TreeResolver for LauncherOnly {
    fn resolve(&self, root_pid: u32) -> Vec<u32> {
        vec![root_pid]
    }
}

/// Recursive depth-first walk over a chain of child enumerators.
///
/// Enumerators are tried in order for every lookup; the first one that yields
/// children wins. A lookup where every enumerator fails or times out counts as
/// "no children", so the result degrades towards `[root_pid]`.
pub struct DescendantWalker {
    enumerators: Vec<Box<dyn ChildEnumerator>>,
}

impl DescendantWalker {
    pub fn new(enumerators: Vec<Box<dyn ChildEnumerator>>) -> Self {
        Self { enumerators }
    }

    /// In-process snapshot first, then PowerShell, then WMIC
    #[cfg(windows)]
    pub fn windows_helpers() -> Self {
        use crate::config::ENUMERATION_TIMEOUT;

        Self::new(vec![
            Box::new(SysinfoEnumerator),
            Box::new(PowerShellEnumerator::new(ENUMERATION_TIMEOUT)),
            Box::new(WmicEnumerator::new(ENUMERATION_TIMEOUT)),
        ])
    }

    fn direct_children(&self, pid: u32) -> Vec<u32> {
        for enumerator in &self.enumerators {
            match enumerator.children(pid) {
                Ok(children) if !children.is_empty() || enumerator.trusts_empty() => {
                    return children
                }
                Ok(_) => {}
                Err(err) => debug(format!(
                    "child lookup for pid={} via {} failed: {}",
                    pid,
                    enumerator.name(),
                    err
                )),
            }
        }
        Vec::new()
    }

    fn walk(&self, pid: u32, depth: usize, seen: &mut HashSet<u32>, out: &mut Vec<u32>) {
        if depth >= MAX_TREE_DEPTH {
            return;
        }
        for child in self.direct_children(pid) {
            if !seen.insert(child) {
                continue;
            }
            out.push(child);
            self.walk(child, depth + 1, seen, out);
        }
    }
}

impl TreeResolver for DescendantWalker {
    fn resolve(&self, root_pid: u32) -> Vec<u32> {
        let mut out = vec![root_pid];
        let mut seen = HashSet::from([root_pid]);
        self.walk(root_pid, 0, &mut seen, &mut out);
        out
    }
}

/// Parent links from a fresh sysinfo process table refresh
#[cfg(windows)]
pub struct SysinfoEnumerator;

#[cfg(windows)]
impl ChildEnumerator for SysinfoEnumerator {
    fn name(&self) -> &str {
        "sysinfo"
    }

    fn children(&self, pid: u32) -> Result<Vec<u32>, ProbeError> {
        use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

        let mut system = System::new();
        system.refresh_processes_specifics(ProcessesToUpdate::All, true, ProcessRefreshKind::new());
        if system.process(Pid::from_u32(pid)).is_none() {
            return Err(ProbeError::ProcessLookup(pid));
        }
        Ok(children_in_table(
            pid,
            system
                .processes()
                .iter()
                .map(|(child, process)| (child.as_u32(), process.parent().map(Pid::as_u32))),
        ))
    }

    fn trusts_empty(&self) -> bool {
        true
    }
}

/// Direct children of `pid` in a `(pid, parent)` table, lowest PID first
pub fn children_in_table(pid: u32, table: impl IntoIterator<Item = (u32, Option<u32>)>) -> Vec<u32> {
    let mut children: Vec<u32> = table
        .into_iter()
        .filter(|(child, parent)| *parent == Some(pid) && *child != pid)
        .map(|(child, _)| child)
        .collect();
    children.sort_unstable();
    children
}

/// `Get-CimInstance Win32_Process -Filter "ParentProcessId=<pid>"`
pub struct PowerShellEnumerator {
    timeout: Duration,
}

impl PowerShellEnumerator {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn command(pid: u32) -> Command {
        let query = format!(
            "Get-CimInstance Win32_Process -Filter \"ParentProcessId={}\" | Select-Object -ExpandProperty ProcessId",
            pid
        );
        let mut cmd = Command::new("powershell");
        cmd.args(["-NoProfile", "-Command", &query]);
        cmd
    }
}

impl ChildEnumerator for PowerShellEnumerator {
    fn name(&self) -> &str {
        "powershell"
    }

    fn children(&self, pid: u32) -> Result<Vec<u32>, ProbeError> {
        run_helper(Self::command(pid), self.timeout).map(|out| parse_pid_lines(&out))
    }
}

/// `wmic process where (ParentProcessId=<pid>) get ProcessId`
pub struct WmicEnumerator {
    timeout: Duration,
}

impl WmicEnumerator {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn command(pid: u32) -> Command {
        let mut cmd = Command::new("wmic");
        cmd.args([
            "process",
            "where",
            &format!("(ParentProcessId={})", pid),
            "get",
            "ProcessId",
        ]);
        cmd
    }
}

impl ChildEnumerator for WmicEnumerator {
    fn name(&self) -> &str {
        "wmic"
    }

    fn children(&self, pid: u32) -> Result<Vec<u32>, ProbeError> {
        run_helper(Self::command(pid), self.timeout).map(|out| parse_pid_lines(&out))
    }
}

/// Extract one PID per line, ignoring headers and blank lines
pub fn parse_pid_lines(output: &str) -> Vec<u32> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && line.bytes().all(|b| b.is_ascii_digit()))
        .filter_map(|line| line.parse().ok())
        .collect()
}

/// Resolver for the platform this binary runs on
#[cfg(windows)]
pub fn platform_resolver() -> Box<dyn TreeResolver> {
    Box::new(DescendantWalker::windows_helpers())
}

/// Resolver for the platform this binary runs on
#[cfg(not(windows))]
pub fn platform_resolver() -> Box<dyn TreeResolver> {
    Box::new(LauncherOnly)
}

/// Capture the PIDs of a freshly launched run.
///
/// Returns an empty list when the launcher has already exited: there is
/// nothing left to track beyond what liveness polling reports.
pub fn resolve_tree(handle: &mut ProcessHandle) -> Vec<u32> {
    resolve_tree_with(handle, platform_resolver().as_ref())
}

pub fn resolve_tree_with(handle: &mut ProcessHandle, resolver: &dyn TreeResolver) -> Vec<u32> {
    if handle.has_exited() {
        debug(format!(
            "launcher pid={} exited before tree capture",
            handle.pid()
        ));
        return Vec::new();
    }
    let pids = resolver.resolve(handle.pid());
    debug(format!("captured tree for pid={}: {:?}", handle.pid(), pids));
    pids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ENUMERATION_TIMEOUT;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::collections::HashMap;

    struct MapEnumerator {
        children: HashMap<u32, Vec<u32>>,
        calls: RefCell<Vec<u32>>,
    }

    impl MapEnumerator {
        fn new(edges: &[(u32, &[u32])]) -> Self {
            Self {
                children: edges.iter().map(|(p, c)| (*p, c.to_vec())).collect(),
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl ChildEnumerator for MapEnumerator {
        fn name(&self) -> &str {
            "map"
        }

        fn children(&self, pid: u32) -> Result<Vec<u32>, ProbeError> {
            self.calls.borrow_mut().push(pid);
            Ok(self.children.get(&pid).cloned().unwrap_or_default())
        }
    }

    /// Whole-table answer: a known PID with no children is final
    struct Snapshot(HashMap<u32, Vec<u32>>);

    impl ChildEnumerator for Snapshot {
        fn name(&self) -> &str {
            "snapshot"
        }

        fn children(&self, pid: u32) -> Result<Vec<u32>, ProbeError> {
            self.0.get(&pid).cloned().ok_or(ProbeError::ProcessLookup(pid))
        }

        fn trusts_empty(&self) -> bool {
            true
        }
    }

    struct TimingOut;

    impl ChildEnumerator for TimingOut {
        fn name(&self) -> &str {
            "slow"
        }

        fn children(&self, _pid: u32) -> Result<Vec<u32>, ProbeError> {
            Err(ProbeError::EnumerationTimeout {
                helper: "slow".into(),
                timeout: ENUMERATION_TIMEOUT,
            })
        }
    }

    #[test]
    fn test_walk_is_depth_first_in_enumeration_order() {
        let walker = DescendantWalker::new(vec![Box::new(MapEnumerator::new(&[
            (100, &[200, 300]),
            (200, &[210, 220]),
            (220, &[221]),
            (300, &[310]),
        ]))]);
        assert_eq!(walker.resolve(100), vec![100, 200, 210, 220, 221, 300, 310]);
    }

    #[test]
    fn test_fallback_enumerator_used_after_failure() {
        let walker = DescendantWalker::new(vec![
            Box::new(TimingOut),
            Box::new(MapEnumerator::new(&[(1, &[2]), (2, &[3])])),
        ]);
        assert_eq!(walker.resolve(1), vec![1, 2, 3]);
    }

    #[test]
    fn test_trusted_empty_answer_skips_slower_helpers() {
        let snapshot = Snapshot(HashMap::from([(1, vec![2]), (2, vec![])]));
        let helper = std::rc::Rc::new(MapEnumerator::new(&[(2, &[99])]));

        struct Shared(std::rc::Rc<MapEnumerator>);
        impl ChildEnumerator for Shared {
            fn name(&self) -> &str {
                self.0.name()
            }
            fn children(&self, pid: u32) -> Result<Vec<u32>, ProbeError> {
                self.0.children(pid)
            }
        }

        let walker = DescendantWalker::new(vec![Box::new(snapshot), Box::new(Shared(helper.clone()))]);
        assert_eq!(walker.resolve(1), vec![1, 2]);
        assert!(helper.calls.borrow().is_empty());
    }

    #[test]
    fn test_snapshot_miss_falls_back_to_helpers() {
        let walker = DescendantWalker::new(vec![
            Box::new(Snapshot(HashMap::new())),
            Box::new(MapEnumerator::new(&[(7, &[8])])),
        ]);
        assert_eq!(walker.resolve(7), vec![7, 8]);
    }

    #[test]
    fn test_children_in_table() {
        let table = [(10, Some(1)), (4, Some(1)), (5, Some(4)), (1, Some(1)), (0, None)];
        assert_eq!(children_in_table(1, table), vec![4, 10]);
        assert_eq!(children_in_table(4, table), vec![5]);
        assert!(children_in_table(5, table).is_empty());
    }

    #[cfg(windows)]
    #[test]
    fn test_sysinfo_enumerator_sees_spawned_child() {
        let child = Command::new("cmd").args(["/C", "ping -n 5 127.0.0.1 >NUL"]).spawn().unwrap();
        let mut handle = ProcessHandle::new(child);
        let children = SysinfoEnumerator.children(std::process::id()).unwrap();
        assert!(children.contains(&handle.pid()));
        handle.kill().unwrap();
        handle.wait_timeout(Duration::from_secs(5));
    }

    #[test]
    fn test_total_failure_degrades_to_launcher_pid() {
        let walker = DescendantWalker::new(vec![Box::new(TimingOut), Box::new(TimingOut)]);
        assert_eq!(walker.resolve(42), vec![42]);
    }

    #[test]
    fn test_cycles_are_not_followed() {
        let walker =
            DescendantWalker::new(vec![Box::new(MapEnumerator::new(&[(1, &[2]), (2, &[1, 3])]))]);
        assert_eq!(walker.resolve(1), vec![1, 2, 3]);
    }

    #[test]
    fn test_launcher_only_resolver() {
        assert_eq!(LauncherOnly.resolve(77), vec![77]);
    }

    #[test]
    fn test_parse_pid_lines_handles_powershell_and_wmic_output() {
        assert_eq!(parse_pid_lines("1234\r\n5678\r\n"), vec![1234, 5678]);
        assert_eq!(
            parse_pid_lines("ProcessId  \r\n4321       \r\n\r\n8765       \r\n"),
            vec![4321, 8765]
        );
        assert_eq!(parse_pid_lines("No Instance(s) Available.\r\n"), Vec::<u32>::new());
    }

    #[test]
    fn test_helper_commands_target_the_parent() {
        let ps = PowerShellEnumerator::command(55);
        let args: Vec<_> = ps.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert!(args[2].contains("ParentProcessId=55"));

        let wmic = WmicEnumerator::command(55);
        let args: Vec<_> = wmic.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(args, vec!["process", "where", "(ParentProcessId=55)", "get", "ProcessId"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_tree_skips_exited_launcher() {
        let child = Command::new("true").spawn().unwrap();
        let mut handle = ProcessHandle::new(child);
        assert!(handle.wait_timeout(Duration::from_secs(5)));
        assert!(resolve_tree(&mut handle).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_tree_on_posix_is_the_launcher() {
        let child = Command::new("sleep").arg("5").spawn().unwrap();
        let mut handle = ProcessHandle::new(child);
        assert_eq!(resolve_tree(&mut handle), vec![handle.pid()]);
        handle.kill().unwrap();
        handle.wait_timeout(Duration::from_secs(5));
    }
}
