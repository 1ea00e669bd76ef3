/// Static directory of the parallel cohorts ("stages"). The key doubles as
/// the partition name in the record store; the label is what the UI shows.
/// Credentials gate the stage view in the UI shell only, they are not a
/// security boundary.
pub struct StageEntry {
    pub key: &'static str,
    pub label: &'static str,
    pub has_activity: bool,
    pub username: &'static str,
    pub password: &'static str,
}

pub const STAGES: &[StageEntry] = &[
    StageEntry {
        key: "angels",
        label: "ملايكة",
        has_activity: false,
        username: "ملايكاوي",
        password: "12345",
    },
    StageEntry {
        key: "grade1",
        label: "سنة أولى",
        has_activity: false,
        username: "grade1",
        password: "2222",
    },
    StageEntry {
        key: "grade2",
        label: "سنة تانية",
        has_activity: false,
        username: "grade2",
        password: "3333",
    },
    StageEntry {
        key: "grade3",
        label: "سنة تالتة",
        has_activity: true,
        username: "grade3",
        password: "4444",
    },
    StageEntry {
        key: "grade4",
        label: "سنة رابعة",
        has_activity: true,
        username: "grade4",
        password: "5555",
    },
    StageEntry {
        key: "grade5",
        label: "سنة خامسة",
        has_activity: true,
        username: "grade5",
        password: "6666",
    },
    StageEntry {
        key: "grade6",
        label: "سنة سادسة",
        has_activity: true,
        username: "grade6",
        password: "7777",
    },
];

pub fn lookup(key: &str) -> Option<&'static StageEntry> {
    STAGES.iter().find(|s| s.key == key)
}

/// Unknown stages fall back to echoing the raw key.
pub fn label_for<'a>(key: &'a str) -> &'a str {
    match lookup(key) {
        Some(s) => s.label,
        None => key,
    }
}

pub fn has_activity(key: &str) -> bool {
    lookup(key).map(|s| s.has_activity).unwrap_or(false)
}

pub fn check_login(key: &str, username: &str, password: &str) -> bool {
    let Some(entry) = lookup(key) else {
        return false;
    };
    username.trim() == entry.username && password.trim() == entry.password
}
