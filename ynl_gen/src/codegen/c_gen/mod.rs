pub mod attr;
pub mod kernel;
pub mod render_info;
pub mod uapi;
pub mod user;
pub mod writer;

// Re-export main public functions
pub use kernel::{render_kernel_header, render_kernel_source};
pub use render_info::{Direction, RenderInfo, Space};
pub use uapi::render_uapi;
pub use user::{render_user_family, render_user_header, render_user_source};
pub use writer::{CodeWriter, DefineValue};
