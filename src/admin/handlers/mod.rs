pub mod chapter_progress;
pub mod chapter_states;
pub mod server;
