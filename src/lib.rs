pub mod catalog;
pub mod config;
pub mod streaming;
pub mod thumbnails;
pub mod web;
