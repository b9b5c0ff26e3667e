pub mod icons;
pub mod output;
pub mod progress;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{
    error, header, info, muted, section, state_label, status, success, summary_row, sync_summary,
    warn, workflow_details,
};
pub use progress::Spinner;
pub use table::{mask_token, repository_table, stats_table, workflow_table};
pub use theme::{theme, Theme};
