pub mod checksum;
pub mod coordinator;
pub mod file_factory;
pub mod frame_writer;
pub mod manifest_io;
pub mod wav_writer;
