pub mod icons;
pub mod output;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{anchor_line, error, header, info, muted, relation_line, section, success, warn};
pub use table::{anchors_table, relations_table, stats_table};
pub use theme::theme;
