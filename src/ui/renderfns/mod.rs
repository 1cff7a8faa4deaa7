pub mod banner;
pub mod footer;
pub mod header;
pub mod tab_bar;
pub mod utils;

pub use banner::draw_banner;
pub use footer::draw_footer;
pub use header::draw_header;
pub use tab_bar::draw_tab_bar;
pub use utils::{status_color, truncate};
