use crate::types::{EntryEvent, ExitEvent, Task, TraceEvent};

/// Function column prefix of a kill() entry line
pub const ENTRY_SYMBOL: &str = "sys_kill(";

const EXIT_ARROW: &str = "->";

/// Work out whether the trace carries the extra `||||` flags column.
///
/// Two header layouts exist (newest first):
///   `#           TASK-PID   CPU#  ||||    TIMESTAMP  FUNCTION`
///   `#           TASK-PID    CPU#    TIMESTAMP  FUNCTION`
/// The first line whose second field mentions TASK decides: six fields
/// starting with `#` means one extra column.
pub fn detect_column_offset(header_text: &str) -> usize {
    for line in header_text.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.get(1).is_some_and(|f| f.contains("TASK")) {
            return usize::from(fields.len() == 6 && fields[0] == "#");
        }
    }
    0
}

/// Split `<comm>-<tid>`; comm may itself contain dashes.
pub fn split_task(token: &str) -> Option<Task<'_>> {
    let (comm, tid) = token.rsplit_once('-')?;
    if tid.is_empty() || !tid.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(Task {
        comm,
        tid: tid.parse().ok()?,
    })
}

/// Decode a register value the kernel renders as hex text (`4d2`, `000004d2`,
/// `0x4d2`). Full-width values wrap to signed, so `ffffffffffffffff` is -1.
pub fn parse_hex(text: &str) -> Option<i64> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    if digits.is_empty() {
        return None;
    }
    u64::from_str_radix(digits, 16).ok().map(|v| v as i64)
}

/// Parse the value after the exit arrow: `0x0`, `0xfffffffffffffffd` or `-3`.
pub fn parse_return_value(text: &str) -> Option<i64> {
    if text.starts_with("0x") || text.starts_with("0X") {
        parse_hex(text)
    } else {
        text.parse::<i64>().ok()
    }
}

/// `LOST ... EVENTS`, as in `CPU:1 [LOST 42 EVENTS]`
pub fn is_lost_events(line: &str) -> bool {
    line.find("LOST")
        .is_some_and(|pos| line[pos..].contains("EVENTS"))
}

/// Pull target pid and signal out of `sys_kill(pid: 4d2, sig: 9)`.
fn parse_kill_args(call: &str) -> Option<(i64, i64)> {
    let open = call.find('(')?;
    let inner = &call[open + 1..];
    let inner = &inner[..inner.rfind(')').unwrap_or(inner.len())];

    let mut args = inner.split(',').map(|arg| {
        let arg = arg.trim();
        arg.split_once(':').map_or(arg, |(_, value)| value.trim())
    });
    let target_pid = parse_hex(args.next()?)?;
    let signal = parse_hex(args.next()?)?;
    Some((target_pid, signal))
}

/// Classify one raw trace line. `offset` is the run's column offset from
/// [`detect_column_offset`]; it is applied here and nowhere else.
pub fn classify(line: &str, offset: usize) -> TraceEvent<'_> {
    let fields: Vec<&str> = line.split_whitespace().collect();

    let Some(&first) = fields.first() else {
        return TraceEvent::Unrecognized;
    };

    if first == "#" {
        return if is_lost_events(line) {
            TraceEvent::LostEvents(line)
        } else {
            TraceEvent::Comment
        };
    }

    let unrecognized = || {
        if is_lost_events(line) {
            TraceEvent::LostEvents(line)
        } else {
            TraceEvent::Unrecognized
        }
    };

    let Some(task) = split_task(first) else {
        return unrecognized();
    };

    let timestamp = fields.get(2 + offset).copied().unwrap_or_default();
    let function = fields.get(3 + offset).copied().unwrap_or_default();
    let after_function = fields.get(4 + offset).copied().unwrap_or_default();

    if after_function.contains(EXIT_ARROW) {
        // Exit value is always the last field
        let return_value = fields.last().copied().unwrap_or_default();
        return TraceEvent::Exit(ExitEvent {
            task,
            timestamp,
            return_value,
        });
    }

    if function.contains(ENTRY_SYMBOL) {
        let call = fields[3 + offset..].join(" ");
        if let Some((target_pid, signal)) = parse_kill_args(&call) {
            return TraceEvent::Entry(EntryEvent {
                task,
                timestamp,
                target_pid,
                signal,
            });
        }
    }

    unrecognized()
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER_WITH_FLAGS: &str = "# tracer: nop
#
# entries-in-buffer/entries-written: 0/0   #P:4
#
#                              _-----=> irqs-off
#                             / _----=> need-resched
#                            | / _---=> hardirq/softirq
#                            || / _--=> preempt-depth
#                            ||| /     delay
#           TASK-PID   CPU#  ||||    TIMESTAMP  FUNCTION
#              | |       |   ||||       |         |
";

    const HEADER_PLAIN: &str = "# tracer: nop
#
#           TASK-PID    CPU#    TIMESTAMP  FUNCTION
#              | |       |          |         |
";

    #[test]
    fn test_detect_offset_with_flags_column() {
        assert_eq!(detect_column_offset(HEADER_WITH_FLAGS), 1);
    }

    #[test]
    fn test_detect_offset_plain_header() {
        assert_eq!(detect_column_offset(HEADER_PLAIN), 0);
    }

    #[test]
    fn test_detect_offset_without_header() {
        assert_eq!(detect_column_offset(""), 0);
        assert_eq!(detect_column_offset("# tracer: nop\n"), 0);
    }

    #[test]
    fn test_split_task_with_dashes_in_comm() {
        let task = split_task("gnome-shell-2231").expect("Should split task");
        assert_eq!(task.comm, "gnome-shell");
        assert_eq!(task.tid, 2231);

        let idle = split_task("<idle>-0").expect("Should split idle task");
        assert_eq!(idle.comm, "<idle>");
        assert_eq!(idle.tid, 0);
    }

    #[test]
    fn test_split_task_rejects_non_numeric_suffix() {
        assert_eq!(split_task("CPU:1"), None);
        assert_eq!(split_task("foo-bar"), None);
        assert_eq!(split_task("bash-"), None);
    }

    #[test]
    fn test_parse_hex_variants() {
        assert_eq!(parse_hex("4d2"), Some(1234));
        assert_eq!(parse_hex("000004d2"), Some(1234));
        assert_eq!(parse_hex("0x4d2"), Some(1234));
        assert_eq!(parse_hex("f"), Some(15));
        assert_eq!(parse_hex("ffffffffffffffff"), Some(-1));
        assert_eq!(parse_hex(""), None);
        assert_eq!(parse_hex("zz"), None);
    }

    #[test]
    fn test_parse_return_value() {
        assert_eq!(parse_return_value("0x0"), Some(0));
        assert_eq!(parse_return_value("0"), Some(0));
        assert_eq!(parse_return_value("-3"), Some(-3));
        assert_eq!(parse_return_value("0xfffffffffffffffd"), Some(-3));
        assert_eq!(parse_return_value("?"), None);
    }

    #[test]
    fn test_classify_entry_plain_layout() {
        let line = "            bash-2150  [000]   362.474651: sys_kill(pid: 4d2, sig: 9)";
        match classify(line, 0) {
            TraceEvent::Entry(entry) => {
                assert_eq!(entry.task.comm, "bash");
                assert_eq!(entry.task.tid, 2150);
                assert_eq!(entry.timestamp, "362.474651:");
                assert_eq!(entry.target_pid, 1234);
                assert_eq!(entry.signal, 9);
            }
            other => panic!("Expected entry, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_entry_flags_layout() {
        let line = "            bash-2150  [000] .... 362.474651: sys_kill(pid: 000004d2, sig: 0000000f)";
        match classify(line, 1) {
            TraceEvent::Entry(entry) => {
                assert_eq!(entry.task.tid, 2150);
                assert_eq!(entry.timestamp, "362.474651:");
                assert_eq!(entry.target_pid, 1234);
                assert_eq!(entry.signal, 15);
            }
            other => panic!("Expected entry, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_exit() {
        let line = "            bash-2150  [000] .... 362.474700: sys_kill -> 0x0";
        match classify(line, 1) {
            TraceEvent::Exit(exit) => {
                assert_eq!(exit.task.comm, "bash");
                assert_eq!(exit.timestamp, "362.474700:");
                assert_eq!(exit.return_value, "0x0");
                assert_eq!(exit.return_code(), 0);
            }
            other => panic!("Expected exit, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_exit_failure_collapses_errno() {
        let line = "            bash-2150  [000] .... 362.474700: sys_kill -> 0xfffffffffffffffd";
        match classify(line, 1) {
            TraceEvent::Exit(exit) => assert_eq!(exit.return_code(), -1),
            other => panic!("Expected exit, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_wrong_offset_misses_entry() {
        let line = "            bash-2150  [000] .... 362.474651: sys_kill(pid: 4d2, sig: 9)";
        assert_eq!(classify(line, 0), TraceEvent::Unrecognized);
    }

    #[test]
    fn test_classify_comment_and_lost_events() {
        assert_eq!(classify("# tracer: nop", 0), TraceEvent::Comment);

        let lost = "# CPU:2 [LOST 311 EVENTS]";
        assert_eq!(classify(lost, 0), TraceEvent::LostEvents(lost));

        let bare = "CPU:2 [LOST 311 EVENTS]";
        assert_eq!(classify(bare, 1), TraceEvent::LostEvents(bare));
    }

    #[test]
    fn test_classify_other_syscall_is_unrecognized() {
        let line = "            bash-2150  [000] .... 362.474651: sys_tgkill(tgid: 4d2, pid: 4d2, sig: 9)";
        assert_eq!(classify(line, 1), TraceEvent::Unrecognized);
        assert_eq!(classify("", 0), TraceEvent::Unrecognized);
    }
}
