mod commands;
mod handlers;

pub use commands::{Cli, Commands};
pub use handlers::{
    handle_delete, handle_init, handle_instantiate, handle_move, handle_settings, handle_tree,
    handle_variables,
};
