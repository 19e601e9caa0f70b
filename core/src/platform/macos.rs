use std::io::Write;
use std::process::{Command, Stdio};

use log::debug;

use super::{FrontmostWindow, Keystroke, OsAutomation, ScreenSize, WindowBounds, WindowRef};
use crate::error::AgentError;

const FRONTMOST_SCRIPT: &str = r#"
tell application "System Events"
    set frontApp to first application process whose frontmost is true
    set appName to name of frontApp
    set winTitle to ""
    try
        set winTitle to name of front window of frontApp
    end try
    if winTitle is missing value then set winTitle to ""
end tell
return appName & tab & winTitle
"#;

const LIST_WINDOWS_SCRIPT: &str = r#"
set output to ""
tell application "System Events"
    repeat with proc in (application processes whose visible is true)
        set appName to name of proc
        set winIndex to 0
        repeat with win in windows of proc
            set winIndex to winIndex + 1
            set winTitle to ""
            try
                set winTitle to name of win
            end try
            if winTitle is missing value then set winTitle to ""
            set output to output & appName & tab & winIndex & tab & winTitle & linefeed
        end repeat
    end repeat
end tell
return output
"#;

const GET_BOUNDS_SCRIPT: &str = r#"
on run argv
    set appName to item 1 of argv
    set winIndex to (item 2 of argv) as integer
    tell application "System Events" to tell application process appName
        set {x, y} to position of window winIndex
        set {w, h} to size of window winIndex
    end tell
    return (x as text) & "," & (y as text) & "," & (w as text) & "," & (h as text)
end run
"#;

const SET_BOUNDS_SCRIPT: &str = r#"
on run argv
    set appName to item 1 of argv
    set winIndex to (item 2 of argv) as integer
    set newX to (item 3 of argv) as integer
    set newY to (item 4 of argv) as integer
    set newW to (item 5 of argv) as integer
    set newH to (item 6 of argv) as integer
    tell application "System Events" to tell application process appName
        set position of window winIndex to {newX, newY}
        set size of window winIndex to {newW, newH}
    end tell
    return "ok"
end run
"#;

const FULLSCREEN_SCRIPT: &str = r#"
on run argv
    set appName to item 1 of argv
    set winIndex to (item 2 of argv) as integer
    tell application "System Events" to tell application process appName
        return (value of attribute "AXFullScreen" of window winIndex) as text
    end tell
end run
"#;

const SCREEN_SIZE_SCRIPT: &str = r#"
tell application "Finder" to get bounds of window of desktop
"#;

const PASTE_SCRIPT: &str = r#"tell application "System Events" to keystroke "v" using command down"#;

const TAB_SCRIPT: &str = r#"tell application "System Events" to key code 48"#;

const CHAR_SCRIPT: &str = r#"
on run argv
    tell application "System Events" to keystroke (item 1 of argv)
end run
"#;

/// Apple event / accessibility error codes that mean the user has not
/// granted the agent automation rights.
const PERMISSION_MARKERS: [&str; 4] = [
    "-1743",
    "-25211",
    "not allowed assistive access",
    "not authorized to send apple events",
];

/// `osascript` + `pbcopy`/`pbpaste` backend.
#[derive(Debug, Default, Clone)]
pub struct MacOsAutomation;

impl MacOsAutomation {
    pub fn new() -> Self {
        Self
    }
}

impl OsAutomation for MacOsAutomation {
    fn query_frontmost(&self) -> Result<Option<FrontmostWindow>, AgentError> {
        let output = run_osascript(FRONTMOST_SCRIPT, &[])?;
        Ok(parse_frontmost(&output))
    }

    fn list_visible_windows(&self) -> Result<Vec<WindowRef>, AgentError> {
        let output = run_osascript(LIST_WINDOWS_SCRIPT, &[])?;
        Ok(parse_window_list(&output))
    }

    fn window_bounds(&self, window: &WindowRef) -> Result<WindowBounds, AgentError> {
        let output = run_osascript(GET_BOUNDS_SCRIPT, &window_args(window))?;
        parse_bounds(&output).ok_or_else(|| {
            AgentError::NoMatchingWindow(format!(
                "unreadable bounds for {} window {}: {output:?}",
                window.app_name,
                window.window_index()
            ))
        })
    }

    fn set_window_bounds(&self, window: &WindowRef, bounds: &WindowBounds) -> Result<(), AgentError> {
        let mut args = window_args(window);
        args.extend([
            bounds.x.to_string(),
            bounds.y.to_string(),
            bounds.width.to_string(),
            bounds.height.to_string(),
        ]);
        run_osascript(SET_BOUNDS_SCRIPT, &args).map(|_| ())
    }

    fn is_fullscreen(&self, window: &WindowRef) -> Result<bool, AgentError> {
        let output = run_osascript(FULLSCREEN_SCRIPT, &window_args(window))?;
        Ok(output.trim().eq_ignore_ascii_case("true"))
    }

    fn screen_size(&self) -> Result<ScreenSize, AgentError> {
        let output = run_osascript(SCREEN_SIZE_SCRIPT, &[])?;
        parse_screen_bounds(&output)
            .ok_or_else(|| AgentError::ExternalService(format!("unreadable desktop bounds: {output:?}")))
    }

    fn send_keystroke(&self, keystroke: Keystroke) -> Result<(), AgentError> {
        match keystroke {
            Keystroke::Paste => run_osascript(PASTE_SCRIPT, &[]),
            Keystroke::Tab => run_osascript(TAB_SCRIPT, &[]),
            Keystroke::Char(ch) => run_osascript(CHAR_SCRIPT, &[ch.to_string()]),
        }
        .map(|_| ())
    }

    fn read_clipboard(&self) -> Result<String, AgentError> {
        let output = Command::new("pbpaste")
            .env("LANG", "en_US.UTF-8")
            .output()
            .map_err(|err| AgentError::ExternalService(format!("spawn pbpaste: {err}")))?;
        if !output.status.success() {
            return Err(AgentError::ExternalService(format!(
                "pbpaste failed ({})",
                output.status
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn write_clipboard(&self, text: &str) -> Result<(), AgentError> {
        let mut child = Command::new("pbcopy")
            .env("LANG", "en_US.UTF-8")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| AgentError::ExternalService(format!("spawn pbcopy: {err}")))?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .map_err(|err| AgentError::ExternalService(format!("write pbcopy stdin: {err}")))?;
        }
        let output = child
            .wait_with_output()
            .map_err(|err| AgentError::ExternalService(format!("wait pbcopy: {err}")))?;
        if !output.status.success() {
            return Err(AgentError::ExternalService(format!(
                "pbcopy failed ({}): {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

fn window_args(window: &WindowRef) -> Vec<String> {
    vec![window.app_name.clone(), window.window_index().to_string()]
}

fn run_osascript(script: &str, args: &[String]) -> Result<String, AgentError> {
    let mut cmd = Command::new("osascript");
    cmd.arg("-e").arg(script);
    if !args.is_empty() {
        cmd.arg("--").args(args);
    }
    let output = cmd
        .stdin(Stdio::null())
        .output()
        .map_err(|err| AgentError::ExternalService(format!("spawn osascript: {err}")))?;

    let stdout = String::from_utf8_lossy(&output.stdout).trim_end_matches('\n').to_string();
    if output.status.success() {
        return Ok(stdout);
    }

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    debug!("osascript failed ({}): {stderr}", output.status);
    Err(classify_osascript_failure(&stderr))
}

fn classify_osascript_failure(stderr: &str) -> AgentError {
    let lowered = stderr.to_lowercase();
    if PERMISSION_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        return AgentError::PermissionDenied(stderr.to_string());
    }
    // -1728: "Can't get window N" / process not running.
    if lowered.contains("-1728") || lowered.contains("can't get") {
        return AgentError::NoMatchingWindow(stderr.to_string());
    }
    AgentError::ExternalService(format!("osascript: {stderr}"))
}

fn parse_frontmost(output: &str) -> Option<FrontmostWindow> {
    let line = output.lines().next()?.trim_end();
    let (app_name, window_title) = line.split_once('\t').unwrap_or((line, ""));
    if app_name.trim().is_empty() {
        return None;
    }
    Some(FrontmostWindow {
        app_name: app_name.trim().to_string(),
        window_title: window_title.trim().to_string(),
    })
}

fn parse_window_list(output: &str) -> Vec<WindowRef> {
    output
        .lines()
        .filter_map(|line| {
            let mut parts = line.splitn(3, '\t');
            let app_name = parts.next()?.trim();
            let index = parts.next()?.trim().parse::<u32>().ok()?;
            let title = parts.next().unwrap_or("").trim();
            if app_name.is_empty() {
                return None;
            }
            Some(WindowRef::new(app_name, title, Some(index)))
        })
        .collect()
}

fn parse_numbers(output: &str) -> Vec<i32> {
    output
        .split(',')
        .filter_map(|part| part.trim().parse::<f64>().ok())
        .map(|value| value.round() as i32)
        .collect()
}

fn parse_bounds(output: &str) -> Option<WindowBounds> {
    match parse_numbers(output).as_slice() {
        &[x, y, width, height] => Some(WindowBounds { x, y, width, height }),
        _ => None,
    }
}

/// Finder reports the desktop as `left, top, right, bottom`.
fn parse_screen_bounds(output: &str) -> Option<ScreenSize> {
    match parse_numbers(output).as_slice() {
        &[left, top, right, bottom] if right > left && bottom > top => Some(ScreenSize {
            width: right - left,
            height: bottom - top,
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frontmost_parses_app_and_title() {
        let parsed = parse_frontmost("Heidi\tConsult note - J. Smith\n").expect("frontmost");
        assert_eq!(parsed.app_name, "Heidi");
        assert_eq!(parsed.window_title, "Consult note - J. Smith");
    }

    #[test]
    fn frontmost_without_window_keeps_empty_title() {
        let parsed = parse_frontmost("Finder\t").expect("frontmost");
        assert_eq!(parsed.app_name, "Finder");
        assert!(parsed.window_title.is_empty());
        assert!(parse_frontmost("").is_none());
    }

    #[test]
    fn window_list_skips_malformed_lines() {
        let output = "Safari\t1\tInbox\nSafari\t2\t\ngarbage\nChart App\tx\tBad index\n";
        let windows = parse_window_list(output);
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0], WindowRef::new("Safari", "Inbox", Some(1)));
        assert_eq!(windows[1].window_index(), 2);
        assert!(windows[1].window_title.is_empty());
    }

    #[test]
    fn bounds_accept_fractional_values() {
        let bounds = parse_bounds("12, 25.0, 1200, 800").expect("bounds");
        assert_eq!(bounds, WindowBounds { x: 12, y: 25, width: 1200, height: 800 });
        assert!(parse_bounds("1,2,3").is_none());
    }

    #[test]
    fn screen_bounds_convert_to_size() {
        let size = parse_screen_bounds("0, 0, 1512, 982").expect("screen");
        assert_eq!(size, ScreenSize { width: 1512, height: 982 });
        assert!(parse_screen_bounds("0, 0, 0, 0").is_none());
    }

    #[test]
    fn osascript_failures_are_classified() {
        assert!(matches!(
            classify_osascript_failure("execution error: Not authorized to send Apple events to System Events. (-1743)"),
            AgentError::PermissionDenied(_)
        ));
        assert!(matches!(
            classify_osascript_failure("osascript is not allowed assistive access. (-1719)"),
            AgentError::PermissionDenied(_)
        ));
        assert!(matches!(
            classify_osascript_failure("System Events got an error: Can't get window 3. (-1728)"),
            AgentError::NoMatchingWindow(_)
        ));
        assert!(matches!(
            classify_osascript_failure("syntax error"),
            AgentError::ExternalService(_)
        ));
    }
}
