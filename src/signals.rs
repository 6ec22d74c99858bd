use std::borrow::Cow;

/// Symbolic name for the common Linux signals; `None` for anything else.
pub fn signal_name(signal: i64) -> Option<&'static str> {
    let name = match signal {
        1 => "SIGHUP",
        2 => "SIGINT",
        3 => "SIGQUIT",
        4 => "SIGILL",
        6 => "SIGABRT",
        8 => "SIGFPE",
        9 => "SIGKILL",
        10 => "SIGUSR1",
        11 => "SIGSEGV",
        12 => "SIGUSR2",
        13 => "SIGPIPE",
        14 => "SIGALRM",
        15 => "SIGTERM",
        17 => "SIGCHLD",
        18 => "SIGCONT",
        19 => "SIGSTOP",
        20 => "SIGTSTP",
        21 => "SIGTTIN",
        22 => "SIGTTOU",
        _ => return None,
    };
    Some(name)
}

pub fn render_signal(signal: i64, symbolic: bool) -> Cow<'static, str> {
    match signal_name(signal) {
        Some(name) if symbolic => Cow::Borrowed(name),
        _ => Cow::Owned(signal.to_string()),
    }
}
