pub mod board;
pub mod board_column;
pub mod event_outbox;
pub mod project;
pub mod project_member;
pub mod task;
pub mod user;
pub mod workspace;
