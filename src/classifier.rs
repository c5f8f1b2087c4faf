//! Protected-process policy.
//!
//! Decides which processes are never captured or terminated. Matching is a
//! lowercase substring test against a fixed set, so `nvidia-share` or
//! `explorer.exe` are caught by `nvidia` and `explorer`. Over-protecting is
//! harmless; killing the shell the assistant runs in is not.

/// Names that are always protected.
///
/// Covers OS services and shells on Windows and Linux desktops, GPU vendor
/// helpers, and the tooling the assistant itself usually runs under.
pub const PROTECTED_NAMES: &[&str] = &[
    // Windows core services
    "svchost",
    "csrss",
    "lsass",
    "services",
    "wininit",
    "winlogon",
    "dwm",
    "system",
    "explorer",
    "searchindexer",
    "wmiprvse",
    // Linux session plumbing
    "init",
    "dbus",
    "xorg",
    "xwayland",
    "gnome-shell",
    "plasmashell",
    "kwin",
    "pipewire",
    "pulseaudio",
    "sshd",
    "gnome-session",
    "ksmserver",
    "gdm",
    "sddm",
    "lightdm",
    "polkit",
    "login",
    "sudo",
    // GPU vendor helpers
    "nvidia",
    "amd",
    "intel",
    // Runtime and shell tooling
    "python",
    "code",
    "cmd",
    "powershell",
    "pwsh",
    "conhost",
    "windowsterminal",
    "bash",
    "zsh",
    "fish",
    "tmux",
    "terminal",
    "konsole",
    "alacritty",
    "kitty",
    "xterm",
    "wezterm",
    "foot",
    "cargo",
];

/// Names too short to match as substrings; compared whole.
pub const PROTECTED_EXACT: &[&str] = &["sh", "dash", "ksh", "su"];

#[derive(Debug, Clone)]
pub struct ProcessClassifier {
    protected: Vec<String>,
    own_pid: u32,
    // Our parent chain: the shell and terminal we run in, whatever their names.
    ancestors: Vec<u32>,
}

impl ProcessClassifier {
    /// Classifier for the current process: default set, our own executable
    /// name and our own pid.
    pub fn for_current_process() -> Self {
        let mut classifier = Self::new(std::process::id());
        if let Some(own_name) = std::env::current_exe()
            .ok()
            .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
        {
            classifier.protect(&own_name);
        }
        classifier
    }

    pub fn new(own_pid: u32) -> Self {
        Self {
            protected: PROTECTED_NAMES.iter().map(|s| s.to_string()).collect(),
            own_pid,
            ancestors: Vec::new(),
        }
    }

    pub fn with_ancestors(mut self, pids: impl IntoIterator<Item = u32>) -> Self {
        for pid in pids {
            if pid != self.own_pid && !self.ancestors.contains(&pid) {
                self.ancestors.push(pid);
            }
        }
        self
    }

    pub fn with_extra<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            self.protect(name.as_ref());
        }
        self
    }

    fn protect(&mut self, name: &str) {
        let name = name.trim().to_lowercase();
        if !name.is_empty() && !self.protected.contains(&name) {
            self.protected.push(name);
        }
    }

    /// Name-only check. An empty name never matches.
    pub fn is_protected(&self, process_name: &str) -> bool {
        let name = process_name.trim().to_lowercase();
        if name.is_empty() {
            return false;
        }
        PROTECTED_EXACT.contains(&name.as_str())
            || self.protected.iter().any(|p| name.contains(p.as_str()))
    }

    /// Our own pid or one of our ancestors.
    pub fn is_protected_pid(&self, pid: u32) -> bool {
        pid == self.own_pid || self.ancestors.contains(&pid)
    }

    /// Name check plus unconditional protection of our own process tree.
    pub fn is_protected_process(&self, pid: u32, process_name: &str) -> bool {
        self.is_protected_pid(pid) || self.is_protected(process_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_default_name_is_protected() {
        let c = ProcessClassifier::new(1);
        for name in PROTECTED_NAMES {
            assert!(c.is_protected(name), "{name} should be protected");
        }
    }

    #[test]
    fn substring_and_case_variants_are_protected() {
        let c = ProcessClassifier::new(1);
        assert!(c.is_protected("Explorer.EXE"));
        assert!(c.is_protected("nvidia-share"));
        assert!(c.is_protected("python3.12"));
        assert!(c.is_protected("svchost.exe"));
    }

    #[test]
    fn unrelated_name_is_not_protected() {
        let c = ProcessClassifier::new(1);
        assert!(!c.is_protected("notepad"));
        assert!(!c.is_protected("firefox"));
    }

    #[test]
    fn empty_name_is_not_protected() {
        let c = ProcessClassifier::new(1);
        assert!(!c.is_protected(""));
        assert!(!c.is_protected("   "));
    }

    #[test]
    fn own_pid_is_protected_regardless_of_name() {
        let c = ProcessClassifier::new(4242);
        assert!(c.is_protected_process(4242, "notepad"));
        assert!(c.is_protected_process(4242, ""));
        assert!(!c.is_protected_process(4243, "notepad"));
    }

    #[test]
    fn terminal_hosts_and_session_processes_are_protected() {
        let c = ProcessClassifier::new(1);
        // Linux truncates process names to 15 bytes.
        for name in [
            "konsole",
            "alacritty",
            "kitty",
            "xterm",
            "wezterm-gui",
            "foot",
            "gnome-session-b",
            "ksmserver",
            "sh",
            "dash",
            "sudo",
            "gdm-session-wor",
            "polkitd",
            "login",
        ] {
            assert!(c.is_protected(name), "{name} should be protected");
        }
    }

    #[test]
    fn short_shell_names_match_whole_names_only() {
        let c = ProcessClassifier::new(1);
        assert!(c.is_protected("SH"));
        assert!(!c.is_protected("shotwell"));
        assert!(!c.is_protected("dashboard-app"));
    }

    #[test]
    fn ancestors_are_protected_by_pid() {
        let c = ProcessClassifier::new(10).with_ancestors([9, 3, 1]);
        assert!(c.is_protected_process(9, "my-custom-term"));
        assert!(c.is_protected_process(3, ""));
        assert!(c.is_protected_pid(10));
        assert!(!c.is_protected_process(11, "my-custom-term"));
    }

    #[test]
    fn extra_names_are_lowercased() {
        let c = ProcessClassifier::new(1).with_extra(["KeePassXC", ""]);
        assert!(c.is_protected("keepassxc"));
        assert!(!c.is_protected("notepad"));
    }
}
