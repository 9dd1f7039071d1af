mod file;
mod ram;

pub use file::FileBackend;
pub use ram::RamBackend;
