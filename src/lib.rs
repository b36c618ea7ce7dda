pub mod admin;
pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod forms;
pub mod home;
pub mod pages;
pub mod profiles;
pub mod state;
pub mod storage;
