pub mod auth;
pub mod boards;
pub mod columns;
pub mod events;
pub mod health;
pub mod projects;
pub mod tasks;
pub mod workspaces;
