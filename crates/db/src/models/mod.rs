pub mod access;
pub mod board;
pub mod board_column;
pub mod event_outbox;
pub mod ids;
pub mod project;
pub mod task;
pub mod user;
pub mod workspace;
