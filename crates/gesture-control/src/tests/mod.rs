mod bind_executor;
mod config;
mod connection;
mod pattern_camera;
