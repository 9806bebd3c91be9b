pub mod browser;
pub mod doc;
pub mod init;
pub mod item;
pub mod migrate;
pub mod repos;
pub mod serve;
