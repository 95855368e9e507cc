// Terminal front end for the palavra session orchestrator.
//
// The console owns nothing but the last snapshot it printed. All quiz state
// lives in `palavra_app::session`, reached through the command and UI
// channels.

pub mod console;
pub mod input;
pub mod render;
