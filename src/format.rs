use crate::signals::render_signal;
use crate::types::CompletedCall;

/// Renders the fixed-width table: `[TIME] COMM PID TPID SIGNAL RETURN`
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordFormatter {
    pub show_time: bool,
    pub symbolic: bool,
}

impl RecordFormatter {
    pub fn new(show_time: bool, symbolic: bool) -> Self {
        Self {
            show_time,
            symbolic,
        }
    }

    pub fn header(&self) -> String {
        self.render("TIME", "COMM", "PID", "TPID", "SIGNAL", "RETURN")
    }

    pub fn row(&self, call: &CompletedCall) -> String {
        self.render(
            call.time.trim_end_matches(':'),
            &call.comm,
            &call.caller_pid.to_string(),
            &call.target_pid.to_string(),
            &render_signal(call.signal, self.symbolic),
            &call.return_code.to_string(),
        )
    }

    fn render(
        &self,
        time: &str,
        comm: &str,
        pid: &str,
        tpid: &str,
        signal: &str,
        ret: &str,
    ) -> String {
        let line = format!(
            "{:<16.16} {:<6} {:<8} {:<10} {:<4}",
            comm, pid, tpid, signal, ret
        );
        if self.show_time {
            format!("{:<16} {}", time, line)
        } else {
            line
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CompletedCall {
        CompletedCall {
            time: "362.474700:".to_string(),
            comm: "bash".to_string(),
            caller_pid: 2150,
            target_pid: 1234,
            signal: 9,
            return_code: 0,
        }
    }

    #[test]
    fn test_header_without_time() {
        let formatter = RecordFormatter::new(false, false);
        assert_eq!(
            formatter.header(),
            "COMM             PID    TPID     SIGNAL     RETURN"
        );
    }

    #[test]
    fn test_header_with_time() {
        let formatter = RecordFormatter::new(true, false);
        assert!(formatter.header().starts_with("TIME             COMM "));
    }

    #[test]
    fn test_row_numeric_signal() {
        let formatter = RecordFormatter::new(false, false);
        assert_eq!(
            formatter.row(&sample()),
            "bash             2150   1234     9          0   "
        );
    }

    #[test]
    fn test_row_symbolic_signal_and_time() {
        let formatter = RecordFormatter::new(true, true);
        assert_eq!(
            formatter.row(&sample()),
            "362.474700       bash             2150   1234     SIGKILL    0   "
        );
    }

    #[test]
    fn test_row_truncates_long_comm() {
        let mut call = sample();
        call.comm = "a-very-long-command-name".to_string();
        call.return_code = -1;
        let row = RecordFormatter::new(false, false).row(&call);
        assert!(row.starts_with("a-very-long-comm 2150 "));
        assert!(row.ends_with("-1  "));
    }
}
