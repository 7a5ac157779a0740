pub mod authorization;
pub mod capture_stream;
pub mod observer;
pub mod track_writer;
