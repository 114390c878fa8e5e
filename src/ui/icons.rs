pub struct Icons;

impl Icons {
    pub const TAG: &str = "🏷️";
    pub const CHECK: &str = "✅";
    pub const CROSS: &str = "❌";
    pub const WARN: &str = "⚠️";
    pub const INFO: &str = "ℹ️";
    pub const STATS: &str = "📊";
    pub const LINK: &str = "🔗";
    pub const ANCHOR: &str = "⚓";
    pub const DEL: &str = "🗑️";
    pub const IMPORT: &str = "📥";
    pub const EMPTY: &str = "∅";
}
