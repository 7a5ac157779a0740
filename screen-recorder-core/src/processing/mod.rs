pub mod audio_convert;
pub mod ingest;
pub mod levels;
pub mod timestamp_history;
pub mod wav_format;
