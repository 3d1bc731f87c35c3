//! Launch-at-login registration
//!
//! Providers only create or remove a login item file; whether autostart is
//! enabled is simply whether that file exists.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// Login item label used when none is configured
pub const DEFAULT_LABEL: &str = "com.click-debounce.agent";

/// Arguments the login item passes to the binary
const RUN_ARGS: &[&str] = &["run"];

/// Registers the filter to launch at login.
pub trait AutostartProvider: Send + Sync {
    fn is_enabled(&self) -> crate::Result<bool>;

    /// Enable or disable, then report the resulting state.
    fn set_enabled(&self, enabled: bool) -> crate::Result<bool>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// macOS LaunchAgent plist in `~/Library/LaunchAgents`
#[derive(Debug, Clone)]
pub struct LaunchAgentAutostart {
    label: String,
    program: PathBuf,
    agents_dir: PathBuf,
}

impl LaunchAgentAutostart {
    /// Provider writing to the current user's LaunchAgents directory
    pub fn new(label: &str, program: PathBuf) -> crate::Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| crate::Error::Autostart("cannot determine home directory".into()))?;
        Ok(Self::with_dir(label, program, home.join("Library").join("LaunchAgents")))
    }

    pub fn with_dir(label: &str, program: PathBuf, agents_dir: PathBuf) -> Self {
        Self {
            label: label.to_string(),
            program,
            agents_dir,
        }
    }

    pub fn plist_path(&self) -> PathBuf {
        self.agents_dir.join(format!("{}.plist", self.label))
    }

    fn render(&self) -> String {
        let mut args = format!(
            "        <string>{}</string>\n",
            xml_escape(&self.program.to_string_lossy())
        );
        for arg in RUN_ARGS {
            args.push_str(&format!("        <string>{}</string>\n", xml_escape(arg)));
        }

        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>Label</key>
    <string>{label}</string>
    <key>ProgramArguments</key>
    <array>
{args}    </array>
    <key>RunAtLoad</key>
    <true/>
</dict>
</plist>
"#,
            label = xml_escape(&self.label),
            args = args,
        )
    }
}

impl AutostartProvider for LaunchAgentAutostart {
    fn is_enabled(&self) -> crate::Result<bool> {
        Ok(self.plist_path().exists())
    }

    fn set_enabled(&self, enabled: bool) -> crate::Result<bool> {
        let path = self.plist_path();
        if enabled {
            write_entry(&path, &self.render())?;
        } else {
            remove_entry(&path)?;
        }
        self.is_enabled()
    }

    fn name(&self) -> &'static str {
        "launch-agent"
    }
}

/// XDG desktop entry in `~/.config/autostart`
#[derive(Debug, Clone)]
pub struct XdgAutostart {
    label: String,
    program: PathBuf,
    autostart_dir: PathBuf,
}

impl XdgAutostart {
    /// Provider writing to the current user's XDG autostart directory
    pub fn new(label: &str, program: PathBuf) -> crate::Result<Self> {
        let config = dirs::config_dir()
            .ok_or_else(|| crate::Error::Autostart("cannot determine config directory".into()))?;
        Ok(Self::with_dir(label, program, config.join("autostart")))
    }

    pub fn with_dir(label: &str, program: PathBuf, autostart_dir: PathBuf) -> Self {
        Self {
            label: label.to_string(),
            program,
            autostart_dir,
        }
    }

    pub fn entry_path(&self) -> PathBuf {
        self.autostart_dir.join(format!("{}.desktop", self.label))
    }

    fn render(&self) -> String {
        let mut exec = quote_exec_arg(&self.program.to_string_lossy());
        for arg in RUN_ARGS {
            exec.push(' ');
            exec.push_str(&quote_exec_arg(arg));
        }

        format!(
            "[Desktop Entry]\n\
             Type=Application\n\
             Name=Click Debounce\n\
             Comment=Suppress accidental double clicks\n\
             Exec={}\n\
             Terminal=false\n\
             X-GNOME-Autostart-enabled=true\n",
            exec
        )
    }
}

impl AutostartProvider for XdgAutostart {
    fn is_enabled(&self) -> crate::Result<bool> {
        Ok(self.entry_path().exists())
    }

    fn set_enabled(&self, enabled: bool) -> crate::Result<bool> {
        let path = self.entry_path();
        if enabled {
            write_entry(&path, &self.render())?;
        } else {
            remove_entry(&path)?;
        }
        self.is_enabled()
    }

    fn name(&self) -> &'static str {
        "xdg"
    }
}

/// In-memory flag, for embedders that manage login items themselves
#[derive(Debug, Default)]
pub struct MemoryAutostart {
    enabled: AtomicBool,
}

impl MemoryAutostart {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
        }
    }
}

impl AutostartProvider for MemoryAutostart {
    fn is_enabled(&self) -> crate::Result<bool> {
        Ok(self.enabled.load(Ordering::SeqCst))
    }

    fn set_enabled(&self, enabled: bool) -> crate::Result<bool> {
        self.enabled.store(enabled, Ordering::SeqCst);
        self.is_enabled()
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Provider for platforms without a known login item mechanism
#[derive(Debug, Default)]
pub struct UnsupportedAutostart;

impl AutostartProvider for UnsupportedAutostart {
    fn is_enabled(&self) -> crate::Result<bool> {
        Ok(false)
    }

    fn set_enabled(&self, _enabled: bool) -> crate::Result<bool> {
        Err(crate::Error::Unsupported(format!(
            "autostart is not supported on '{}'",
            std::env::consts::OS
        )))
    }

    fn name(&self) -> &'static str {
        "unsupported"
    }
}

/// The login item provider for the current platform.
pub fn platform_autostart(label: &str, program: PathBuf) -> Box<dyn AutostartProvider> {
    let provider: crate::Result<Box<dyn AutostartProvider>> = if cfg!(target_os = "macos") {
        LaunchAgentAutostart::new(label, program).map(|p| Box::new(p) as Box<dyn AutostartProvider>)
    } else if cfg!(any(target_os = "linux", target_os = "freebsd", target_os = "openbsd")) {
        XdgAutostart::new(label, program).map(|p| Box::new(p) as Box<dyn AutostartProvider>)
    } else {
        Ok(Box::new(UnsupportedAutostart))
    };

    provider.unwrap_or_else(|e| {
        debug!("Falling back to unsupported autostart: {}", e);
        Box::new(UnsupportedAutostart)
    })
}

fn write_entry(path: &Path, content: &str) -> crate::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    info!("Autostart enabled: {}", path.display());
    Ok(())
}

fn remove_entry(path: &Path) -> crate::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            info!("Autostart disabled: {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(crate::Error::Autostart(format!(
            "failed to remove {}: {}",
            path.display(),
            e
        ))),
    }
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Quote an argument for a desktop entry `Exec` key
fn quote_exec_arg(arg: &str) -> String {
    if arg.chars().any(|c| c.is_whitespace() || "\"'\\$`".contains(c)) {
        let escaped = arg
            .replace('\\', "\\\\")
            .replace('"', "\\\"")
            .replace('$', "\\$")
            .replace('`', "\\`");
        format!("\"{}\"", escaped)
    } else {
        arg.to_string()
    }
}
