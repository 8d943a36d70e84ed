//! Focused application and running process lookup

/// Get the name of the currently focused application on macOS
#[cfg(target_os = "macos")]
pub async fn get_focused_app() -> Option<String> {
    run(
        "osascript",
        &[
            "-e",
            "tell application \"System Events\" to get name of first process whose frontmost is true",
        ],
    )
    .await
}

/// Get the title of the focused X11 window
#[cfg(target_os = "linux")]
pub async fn get_focused_app() -> Option<String> {
    run("xdotool", &["getactivewindow", "getwindowname"]).await
}

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
pub async fn get_focused_app() -> Option<String> {
    None
}

/// Names of the running processes
#[cfg(unix)]
pub async fn running_processes() -> Vec<String> {
    run("ps", &["-A", "-o", "comm="])
        .await
        .map(|output| process_names(&output))
        .unwrap_or_default()
}

#[cfg(not(unix))]
pub async fn running_processes() -> Vec<String> {
    Vec::new()
}

#[cfg(unix)]
async fn run(program: &str, args: &[&str]) -> Option<String> {
    use tokio::process::Command;
    use tracing::{debug, warn};

    let output = match Command::new(program).args(args).output().await {
        Ok(output) => output,
        Err(e) => {
            warn!("{} command failed: {}", program, e);
            return None;
        }
    };

    if output.status.success() {
        let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Some(name)
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        debug!("{} failed: {} - {}", program, output.status, stderr.trim());
        None
    }
}

/// Application name a profile is matched against
///
/// Window titles like `"scene.blend - Blender 3.6"` are reduced to the
/// part after the last `" - "` with any version number removed.
pub fn app_name_from_title(title: &str) -> String {
    let name = title.rsplit(" - ").next().unwrap_or(title).trim();
    let name = match name.rsplit_once(' ') {
        Some((head, tail)) if tail.chars().next().is_some_and(|c| c.is_ascii_digit()) => head,
        _ => name,
    };
    name.to_string()
}

/// Executable names from `ps` output, one process per line
#[cfg(any(unix, test))]
fn process_names(output: &str) -> Vec<String> {
    let mut names: Vec<String> = output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| line.rsplit('/').next().unwrap_or(line).to_string())
        .collect();
    names.sort();
    names.dedup();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_name_from_title() {
        assert_eq!(app_name_from_title("scene.blend - Blender 3.6"), "Blender");
        assert_eq!(app_name_from_title("Blender"), "Blender");
        assert_eq!(app_name_from_title("notes.txt - GNU Emacs"), "GNU Emacs");
        assert_eq!(app_name_from_title("  Firefox  "), "Firefox");
        assert_eq!(app_name_from_title(""), "");
    }

    #[test]
    fn test_process_names() {
        let output = "  bash\n/Applications/OBS.app/Contents/MacOS/obs\nbash\n\nsystemd\n";
        assert_eq!(process_names(output), vec!["bash", "obs", "systemd"]);
    }
}
