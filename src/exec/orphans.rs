/// Start-up scan for compiler processes orphaned by a previous instance
/// Best effort: every failure is logged and the scan reports what it managed to kill.
use log::{debug, info, warn};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::path::Path;
use std::process::{Command, Stdio};

/// Backslash-escape the POSIX ERE metacharacters `pgrep` interprets
pub fn escape_ere(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '.' | '[' | ']' | '(' | ')' | '*' | '+' | '?' | '{' | '}' | '|' | '^' | '$' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// `pgrep -f` pattern matching AST-dump invocations of `compiler_path`
pub fn orphan_pattern(compiler_path: &Path, ast_flags: &[String]) -> String {
    let program = compiler_path
        .file_name()
        .unwrap_or(compiler_path.as_os_str())
        .to_string_lossy();
    let flag = ast_flags.first().map(String::as_str).unwrap_or("-ast");
    format!("{}.*{}", escape_ere(&program), escape_ere(flag))
}

/// Parse pgrep output, one pid per line. Our own pid is never returned.
pub fn parse_pid_list(output: &str) -> Vec<i32> {
    let own = std::process::id() as i32;
    output
        .lines()
        .filter_map(|line| line.trim().parse::<i32>().ok())
        .filter(|pid| *pid > 0 && *pid != own)
        .collect()
}

/// Find processes matching `pattern` and SIGKILL them. Returns the number killed.
pub fn kill_orphans(pattern: &str) -> usize {
    let output = match Command::new("pgrep")
        .arg("-f")
        .arg(pattern)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
    {
        Ok(output) => output,
        Err(e) => {
            warn!("Orphan scan unavailable (pgrep): {}", e);
            return 0;
        }
    };

    // pgrep exits 1 when nothing matched
    if !output.status.success() {
        debug!("Orphan scan found no processes matching {:?}", pattern);
        return 0;
    }

    let mut killed = 0;
    for pid in parse_pid_list(&String::from_utf8_lossy(&output.stdout)) {
        match signal::kill(Pid::from_raw(pid), Signal::SIGKILL) {
            Ok(()) => {
                info!("Killed orphaned compiler process {}", pid);
                killed += 1;
            }
            Err(e) => warn!("Failed to kill orphaned process {}: {}", pid, e),
        }
    }
    killed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orphan_pattern_uses_file_name_and_flag() {
        let flags = vec!["-ast".to_string(), "2".to_string()];
        assert_eq!(orphan_pattern(Path::new("/app/compiler/v0.79/trivil"), &flags), "trivil.*-ast");
    }

    #[test]
    fn test_orphan_pattern_escapes_regex_chars() {
        let pattern = orphan_pattern(Path::new("/opt/tri.vil"), &[]);
        assert_eq!(pattern, "tri\\.vil.*-ast");
    }

    #[test]
    fn test_parse_pid_list_skips_garbage_and_self() {
        let own = std::process::id();
        let text = format!("123\n  456 \nabc\n\n{}\n-5\n", own);
        assert_eq!(parse_pid_list(&text), vec![123, 456]);
    }

    #[test]
    fn test_escape_ere_leaves_dashes() {
        assert_eq!(escape_ere("a-b"), "a-b");
        assert_eq!(escape_ere("x(1)+[y]|$^{}*?\\"), "x\\(1\\)\\+\\[y\\]\\|\\$\\^\\{\\}\\*\\?\\\\");
    }

    #[cfg(unix)]
    #[test]
    fn test_kill_orphans_kills_matching_process() {
        use std::os::unix::process::ExitStatusExt;

        let flag = format!("--tribox-orphan-{}-{}", std::process::id(), uuid::Uuid::new_v4().simple());
        let compiler = Path::new("/opt/tribox-test/trivil");
        let pattern = orphan_pattern(compiler, &[flag.clone()]);

        // `& wait` keeps the shell itself alive with the marker in its argv
        let mut child = Command::new("/bin/sh")
            .args(["-c", "sleep 30 & wait", "sh"])
            .arg(compiler)
            .arg(&flag)
            .arg("main.tri")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .unwrap();

        let killed = kill_orphans(&pattern);
        assert!(killed >= 1, "pattern {} matched nothing", pattern);

        let status = child.wait().unwrap();
        assert_eq!(status.signal(), Some(libc::SIGKILL));
        assert_eq!(kill_orphans(&pattern), 0);
    }

    #[test]
    fn test_kill_orphans_with_no_match() {
        assert_eq!(kill_orphans("tribox-no-such-process-[0-9]{12}"), 0);
    }
}
